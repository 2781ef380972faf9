//! Login, re-authentication and stream activation sequencing.
//!
//! After the device accepts the login, three follow-up frames go out one
//! step apart: reauth phase 1, reauth phase 2 and the stream request. Each
//! step is timed from the moment the previous one actually fired. The
//! schedule is a plain value; the control loop owns it and polls its next
//! deadline alongside its other timers.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ControlError;
use crate::frame::{AuthReply, AuthSubtype, AuthToken};

pub mod transport;

pub use transport::{ChannelTransport, ControlTransport, DeviceEnd, LatencyGauge, UdpTransport};

/// The two re-authentication flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReauthPhase {
    First,
    Second,
}

impl ReauthPhase {
    pub fn subtype(self) -> AuthSubtype {
        match self {
            ReauthPhase::First => AuthSubtype::FirstReauth,
            ReauthPhase::Second => AuthSubtype::SecondReauth,
        }
    }
}

impl fmt::Display for ReauthPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReauthPhase::First => write!(f, "1/2"),
            ReauthPhase::Second => write!(f, "2/2"),
        }
    }
}

/// Follow-up actions after login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    Reauth(ReauthPhase),
    RequestStreams,
}

/// Ordered (delay, step) list driven by a single deadline.
#[derive(Debug, Clone)]
pub struct HandshakeSchedule {
    steps: VecDeque<(Duration, HandshakeStep)>,
    next_deadline: Option<Instant>,
}

impl HandshakeSchedule {
    pub fn new(steps: impl IntoIterator<Item = (Duration, HandshakeStep)>, origin: Instant) -> Self {
        let steps: VecDeque<_> = steps.into_iter().collect();
        let next_deadline = steps.front().map(|(delay, _)| origin + *delay);
        Self {
            steps,
            next_deadline,
        }
    }

    /// Reauth 1/2, reauth 2/2, stream request, each `step` after the last.
    pub fn after_login(step: Duration, origin: Instant) -> Self {
        Self::new(
            [
                (step, HandshakeStep::Reauth(ReauthPhase::First)),
                (step, HandshakeStep::Reauth(ReauthPhase::Second)),
                (step, HandshakeStep::RequestStreams),
            ],
            origin,
        )
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_deadline
    }

    /// Pops the due step if `now` has reached its deadline. The following
    /// step is then scheduled relative to `now`.
    pub fn fire(&mut self, now: Instant) -> Option<HandshakeStep> {
        if now < self.next_deadline? {
            return None;
        }
        let (_, step) = self.steps.pop_front()?;
        self.next_deadline = self.steps.front().map(|(delay, _)| now + *delay);
        Some(step)
    }
}

/// Turns an auth reply into the session token, or a credential failure.
pub fn accept_auth_reply(reply: &AuthReply) -> Result<AuthToken, ControlError> {
    if reply.rejected {
        return Err(ControlError::InvalidCredentials);
    }
    Ok(reply.token)
}
