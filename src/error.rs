use std::time::Duration;

use thiserror::Error;

use crate::frame::text::TextCodecError;
use crate::session::state::SessionStateError;

/// Terminal errors raised by the control channel.
///
/// Every variant ends the connection: the engine stops all protocol activity
/// and hands the error to the caller, who decides whether to exit, log, or
/// open a fresh connection. Nothing here is retried internally.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The device rejected the configured username/password.
    #[error("invalid user/password")]
    InvalidCredentials,
    /// The device rejected a later re-authentication.
    #[error("reauth failed, try again after about {}s", retry_after.as_secs())]
    ReauthFailed { retry_after: Duration },
    /// No stream activation acknowledgment arrived in time.
    #[error("serial and audio stream request timed out after {0:?}")]
    StreamActivationTimeout(Duration),
    /// No auth reply arrived in time.
    #[error("no auth reply within {0:?}")]
    AuthReplyTimeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("text field encoding: {0}")]
    Text(#[from] TextCodecError),
    #[error("session state: {0}")]
    Session(#[from] SessionStateError),
    #[error("config error: {0}")]
    Config(String),
}

impl ControlError {
    /// Cooldown the device asked for before a new login attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ControlError::ReauthFailed { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ControlError {
    fn from(err: std::io::Error) -> Self {
        ControlError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ControlError {
    fn from(err: serde_json::Error) -> Self {
        ControlError::Config(err.to_string())
    }
}
