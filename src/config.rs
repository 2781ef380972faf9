use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ControlError;
use crate::frame::StreamParameters;

/// What the login frame carries in the token slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthNonce {
    /// All six token bytes zero.
    #[default]
    Zero,
    /// Two random bytes at the start of the slot; devices echo them in the
    /// first two bytes of the issued token.
    Random,
}

/// Timer periods, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub sync_interval_ms: u64,
    pub reauth_interval_ms: u64,
    pub status_interval_ms: u64,
    pub handshake_step_ms: u64,
    pub activation_timeout_ms: u64,
    pub auth_reply_timeout_ms: u64,
    pub reauth_cooldown_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: 100,
            reauth_interval_ms: 60_000,
            status_interval_ms: 3_000,
            handshake_step_ms: 1_000,
            activation_timeout_ms: 3_000,
            auth_reply_timeout_ms: 1_000,
            reauth_cooldown_ms: 60_000,
        }
    }
}

impl TimingConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub fn reauth_interval(&self) -> Duration {
        Duration::from_millis(self.reauth_interval_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn handshake_step(&self) -> Duration {
        Duration::from_millis(self.handshake_step_ms)
    }

    pub fn activation_timeout(&self) -> Duration {
        Duration::from_millis(self.activation_timeout_ms)
    }

    pub fn auth_reply_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_reply_timeout_ms)
    }

    /// Advisory wait before logging in again after a refused reauth.
    pub fn reauth_cooldown(&self) -> Duration {
        Duration::from_millis(self.reauth_cooldown_ms)
    }
}

/// Everything the control channel needs besides the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub username: String,
    pub password: String,
    /// Sent in plain text in the login frame.
    pub client_name: String,
    /// Sent in plain text in the stream request.
    pub device_model: String,
    pub auth_nonce: AuthNonce,
    pub streams: StreamParameters,
    pub timing: TimingConfig,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            username: "beer".into(),
            password: "beerbeer".into(),
            client_name: "icom-pc".into(),
            device_model: "IC-705".into(),
            auth_nonce: AuthNonce::Zero,
            streams: StreamParameters::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl ControlConfig {
    /// Parses a JSON document; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ControlError> {
        let config: ControlConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ControlError> {
        let timing = &self.timing;
        let periods = [
            ("sync_interval_ms", timing.sync_interval_ms),
            ("reauth_interval_ms", timing.reauth_interval_ms),
            ("status_interval_ms", timing.status_interval_ms),
            ("handshake_step_ms", timing.handshake_step_ms),
            ("activation_timeout_ms", timing.activation_timeout_ms),
            ("auth_reply_timeout_ms", timing.auth_reply_timeout_ms),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, ms)| *ms == 0) {
            return Err(ControlError::Config(format!("{} must be non-zero", name)));
        }
        if self.username.is_empty() {
            return Err(ControlError::Config("username must not be empty".into()));
        }
        Ok(())
    }
}
