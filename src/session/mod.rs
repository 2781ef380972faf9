//! Per-connection control session state.
//!
//! `ControlSession` is a plain state holder owned by the control channel task.
//! It hands out sequence numbers, keeps the auth token and tracks stream
//! activation; it performs no I/O.

use tokio::time::Instant;

use crate::frame::{AuthHeader, AuthSubtype, AuthToken, BaseHeader, FrameType};

pub mod state;
use state::{HandshakeState, SessionStateError};

/// Session identifiers negotiated by the transport bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionIds {
    pub local: u32,
    pub remote: u32,
}

impl SessionIds {
    pub fn new(local: u32, remote: u32) -> Self {
        Self { local, remote }
    }
}

#[derive(Debug)]
pub struct ControlSession {
    ids: SessionIds,
    outer_seq: u16,
    inner_seq: u16,
    auth_token: Option<AuthToken>,
    stream_activated: bool,
    activation_deadline: Option<Instant>,
    state: HandshakeState,
}

impl ControlSession {
    /// Both sequence counters start at 1.
    pub fn new(ids: SessionIds) -> Self {
        Self {
            ids,
            outer_seq: 1,
            inner_seq: 1,
            auth_token: None,
            stream_activated: false,
            activation_deadline: None,
            state: HandshakeState::Init,
        }
    }

    pub fn local_session_id(&self) -> u32 {
        self.ids.local
    }

    pub fn remote_session_id(&self) -> u32 {
        self.ids.remote
    }

    pub fn ids(&self) -> SessionIds {
        self.ids
    }

    /// Returns the current outer sequence number and advances it.
    pub fn next_outer_seq(&mut self) -> u16 {
        let seq = self.outer_seq;
        self.outer_seq = seq.wrapping_add(1);
        seq
    }

    /// Returns the current inner sequence number and advances it.
    pub fn next_inner_seq(&mut self) -> u16 {
        let seq = self.inner_seq;
        self.inner_seq = seq.wrapping_add(1);
        seq
    }

    /// Outer sequence number the next frame will carry.
    pub fn peek_outer_seq(&self) -> u16 {
        self.outer_seq
    }

    pub fn peek_inner_seq(&self) -> u16 {
        self.inner_seq
    }

    /// Stores the token from the auth reply. A token can be set once; setting
    /// the same value again is accepted.
    pub fn set_auth_token(&mut self, token: AuthToken) -> Result<(), SessionStateError> {
        match self.auth_token {
            Some(existing) if existing != token => Err(SessionStateError::TokenMismatch),
            _ => {
                self.auth_token = Some(token);
                Ok(())
            }
        }
    }

    pub fn auth_token(&self) -> Option<AuthToken> {
        self.auth_token
    }

    /// Header for a fresh outbound frame; consumes one outer sequence number.
    pub fn header(&mut self, frame_type: FrameType) -> BaseHeader {
        let seq = self.next_outer_seq();
        BaseHeader::new(frame_type, seq, self.ids.local, self.ids.remote)
    }

    /// Header echoing a sequence number chosen by the peer.
    pub fn echo_header(&self, frame_type: FrameType, seq: u16) -> BaseHeader {
        BaseHeader::new(frame_type, seq, self.ids.local, self.ids.remote)
    }

    /// Auth-layer header; consumes one inner sequence number and embeds the
    /// token (zero before login completes).
    pub fn auth_header(&mut self, frame_type: FrameType, subtype: AuthSubtype) -> AuthHeader {
        let inner_seq = self.next_inner_seq();
        AuthHeader::request(
            frame_type,
            subtype,
            inner_seq,
            self.auth_token.unwrap_or(AuthToken::ZERO),
        )
    }

    pub fn arm_activation_deadline(&mut self, at: Instant) -> Result<(), SessionStateError> {
        if self.activation_deadline.is_some() {
            return Err(SessionStateError::DeadlineArmed);
        }
        self.activation_deadline = Some(at);
        Ok(())
    }

    pub fn clear_activation_deadline(&mut self) {
        self.activation_deadline = None;
    }

    pub fn activation_deadline(&self) -> Option<Instant> {
        self.activation_deadline
    }

    /// Marks the streams as activated. Returns `false` when they already were.
    pub fn mark_stream_activated(&mut self) -> bool {
        if self.stream_activated {
            return false;
        }
        self.stream_activated = true;
        true
    }

    pub fn stream_activated(&self) -> bool {
        self.stream_activated
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    pub fn transition(&mut self, next: HandshakeState) -> Result<(), SessionStateError> {
        self.state = self.state.clone().transition(next)?;
        Ok(())
    }
}
