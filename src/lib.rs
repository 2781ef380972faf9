//! Radio-over-IP control channel client (rolink).
//!
//! Logs into a networked transceiver over an already established datagram
//! transport, renews the session token, asks the device to open its serial
//! and audio streams and then keeps the session alive. Frames are fixed
//! length binary datagrams, see [`frame`].

pub mod config;
pub mod control;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod session;
pub mod status;
pub mod stream;

pub use config::{AuthNonce, ControlConfig, TimingConfig};
pub use control::ControlChannel;
pub use error::ControlError;
pub use frame::text::{LiteralCredentials, PlainText, TextCodec, TextCodecError};
pub use frame::{AuthToken, FrameType, InboundFrame, StreamParameters};
pub use handshake::{ChannelTransport, ControlTransport, DeviceEnd, LatencyGauge, UdpTransport};
pub use session::state::{HandshakeState, SessionStateError};
pub use session::{ControlSession, SessionIds};
pub use status::{ControlEvent, StatusReport};
pub use stream::{IdleWorker, StreamWorker, StreamWorkers};
