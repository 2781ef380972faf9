use std::fmt;

use thiserror::Error;

/// Progress of the control channel through login and stream activation.
///
/// The happy path is strictly linear. `Failed` and `Closed` are terminal and
/// reachable from every non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    Init,
    AuthSent,
    Authenticated,
    FirstReauthSent,
    SecondReauthSent,
    StreamRequested,
    StreamActive,
    Failed(String),
    Closed,
}

impl HandshakeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, HandshakeState::Failed(_) | HandshakeState::Closed)
    }

    /// Validates and performs a transition.
    pub fn transition(self, next: HandshakeState) -> Result<HandshakeState, SessionStateError> {
        use HandshakeState::*;
        let allowed = match (&self, &next) {
            (Failed(_) | Closed, _) => false,
            (_, Failed(_) | Closed) => true,
            (Init, AuthSent)
            | (AuthSent, Authenticated)
            | (Authenticated, FirstReauthSent)
            | (FirstReauthSent, SecondReauthSent)
            | (SecondReauthSent, StreamRequested)
            | (StreamRequested, StreamActive) => true,
            _ => false,
        };
        if allowed {
            Ok(next)
        } else {
            Err(SessionStateError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeState::Init => write!(f, "init"),
            HandshakeState::AuthSent => write!(f, "auth sent"),
            HandshakeState::Authenticated => write!(f, "authenticated"),
            HandshakeState::FirstReauthSent => write!(f, "reauth 1/2 sent"),
            HandshakeState::SecondReauthSent => write!(f, "reauth 2/2 sent"),
            HandshakeState::StreamRequested => write!(f, "stream requested"),
            HandshakeState::StreamActive => write!(f, "stream active"),
            HandshakeState::Failed(reason) => write!(f, "failed: {}", reason),
            HandshakeState::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionStateError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("auth token already set to a different value")]
    TokenMismatch,
    #[error("a stream activation deadline is already armed")]
    DeadlineArmed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_linear() {
        let mut state = HandshakeState::Init;
        for next in [
            HandshakeState::AuthSent,
            HandshakeState::Authenticated,
            HandshakeState::FirstReauthSent,
            HandshakeState::SecondReauthSent,
            HandshakeState::StreamRequested,
            HandshakeState::StreamActive,
        ] {
            state = state.transition(next).unwrap();
        }
        assert_eq!(state, HandshakeState::StreamActive);
    }

    #[test]
    fn no_skipping_or_backtracking() {
        assert!(HandshakeState::Init
            .transition(HandshakeState::Authenticated)
            .is_err());
        assert!(HandshakeState::StreamActive
            .transition(HandshakeState::StreamRequested)
            .is_err());
    }

    #[test]
    fn terminal_states_are_final() {
        let failed = HandshakeState::AuthSent
            .transition(HandshakeState::Failed("invalid user/password".into()))
            .unwrap();
        assert!(failed.is_terminal());
        assert!(failed.clone().transition(HandshakeState::Closed).is_err());
        assert!(HandshakeState::Closed
            .transition(HandshakeState::AuthSent)
            .is_err());
    }
}
