use std::fmt;
use std::time::Duration;

use crate::session::state::HandshakeState;

/// Periodic health observation once the streams are running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub uptime: Duration,
    /// Keep-alive round trip, when the transport has measured one.
    pub latency: Option<Duration>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "running for {}s", self.uptime.as_secs())?;
        match self.latency {
            Some(latency) => write!(f, ", roundtrip latency {}ms", latency.as_millis()),
            None => write!(f, ", roundtrip latency unknown"),
        }
    }
}

/// Observations published by the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    StateChanged(HandshakeState),
    Status(StatusReport),
}
