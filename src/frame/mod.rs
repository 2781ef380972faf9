//! Control channel frame codec.
//!
//! Every frame starts with a 16-byte base header. Authenticated-layer frames
//! (login, reauth, stream request and their replies) continue with a second
//! header at bytes 16..32 that carries the inner sequence number and the auth
//! token, followed by a fixed-offset payload. Frame lengths are fixed per
//! type, see [`FRAME_LAYOUTS`].
//!
//! Byte order: the outer and inner sequence numbers are little-endian, the
//! session identifiers and the stream request parameters are big-endian.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

pub mod text;

/// Frame type tag stored in byte 0.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Sync = 0x10,
    Reauth = 0x40,
    ReauthFailedNotice = 0x50,
    AuthReply = 0x60,
    Auth = 0x80,
    StreamRequest = 0x90,
}

impl FrameType {
    pub fn from_u8(tag: u8) -> Option<Self> {
        FRAME_LAYOUTS
            .iter()
            .map(|layout| layout.frame_type)
            .find(|ty| *ty as u8 == tag)
    }

    pub fn layout(self) -> &'static FrameLayout {
        let row = match self {
            FrameType::Sync => 0,
            FrameType::Reauth => 1,
            FrameType::ReauthFailedNotice => 2,
            FrameType::AuthReply => 3,
            FrameType::Auth => 4,
            FrameType::StreamRequest => 5,
        };
        &FRAME_LAYOUTS[row]
    }
}

/// Which side of the connection emits a frame type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
    Both,
}

/// Fixed shape of one frame type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub frame_type: FrameType,
    pub direction: Direction,
    /// Exact datagram length.
    pub len: usize,
    /// Byte 19 of outbound authenticated-layer frames.
    pub body_tag: Option<u8>,
}

impl FrameLayout {
    /// Whether the device may send this frame type to us.
    pub fn accepts_inbound(&self) -> bool {
        self.direction != Direction::Outbound
    }
}

pub static FRAME_LAYOUTS: [FrameLayout; 6] = [
    FrameLayout {
        frame_type: FrameType::Sync,
        direction: Direction::Both,
        len: 16,
        body_tag: None,
    },
    FrameLayout {
        frame_type: FrameType::Reauth,
        direction: Direction::Outbound,
        len: 64,
        body_tag: Some(0x30),
    },
    FrameLayout {
        frame_type: FrameType::ReauthFailedNotice,
        direction: Direction::Inbound,
        len: 80,
        body_tag: None,
    },
    FrameLayout {
        frame_type: FrameType::AuthReply,
        direction: Direction::Inbound,
        len: 96,
        body_tag: None,
    },
    FrameLayout {
        frame_type: FrameType::Auth,
        direction: Direction::Outbound,
        len: 128,
        body_tag: Some(0x70),
    },
    FrameLayout {
        frame_type: FrameType::StreamRequest,
        direction: Direction::Both,
        len: 144,
        body_tag: Some(0x80),
    },
];

const AUTH_HEADER: Range<usize> = 16..32;
const TOKEN: Range<usize> = 26..32;

const LOGIN_USERNAME: Range<usize> = 64..80;
const LOGIN_PASSWORD: Range<usize> = 80..96;
const LOGIN_CLIENT_NAME: Range<usize> = 96..112;

const STREAM_RADIO_IDENTITY: Range<usize> = 32..48;
const STREAM_DEVICE_MODEL: Range<usize> = 64..96;
const STREAM_USERNAME: Range<usize> = 96..112;
const STREAM_RX_ENABLE: usize = 112;
const STREAM_TX_ENABLE: usize = 113;
const STREAM_RX_CODEC: usize = 114;
const STREAM_TX_CODEC: usize = 115;
const STREAM_RX_SAMPLE_RATE: Range<usize> = 116..120;
const STREAM_TX_SAMPLE_RATE: Range<usize> = 120..124;
const STREAM_SERIAL_PORT: Range<usize> = 124..128;
const STREAM_AUDIO_PORT: Range<usize> = 128..132;
const STREAM_TX_BUFFER: Range<usize> = 132..136;
const STREAM_CONVERT: usize = 136;

const AUTH_REPLY_VERDICT: Range<usize> = 48..52;
const AUTH_REPLY_CONNECTION: Range<usize> = 64..80;
const AUTH_REJECTED: [u8; 4] = [0xff, 0xff, 0xff, 0xfe];
const REAUTH_FAILED_MARKER: Range<usize> = 48..51;
const STREAM_ACK_RESULT: usize = 96;
const STREAM_ACK_MODEL: Range<usize> = 64..96;

/// Field widths of the text slots.
pub const CREDENTIAL_WIDTH: usize = 16;
pub const CLIENT_NAME_WIDTH: usize = 16;
pub const DEVICE_MODEL_WIDTH: usize = 32;

/// Header bytes that an auth reply to our first login must start with.
pub const AUTH_REPLY_PREFIX: [u8; 8] = [0x60, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00];

/// Opaque 6-byte token issued by the device on login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AuthToken(pub [u8; 6]);

impl AuthToken {
    pub const ZERO: AuthToken = AuthToken([0; 6]);

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; 6] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Base header present on every frame.
///
/// Outbound frames carry this endpoint's session id as `sender_id` and the
/// peer's as `receiver_id`; frames from the device carry them the other way
/// round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseHeader {
    pub frame_type: FrameType,
    pub seq: u16,
    pub sender_id: u32,
    pub receiver_id: u32,
}

impl BaseHeader {
    pub const LEN: usize = 16;

    pub fn new(frame_type: FrameType, seq: u16, sender_id: u32, receiver_id: u32) -> Self {
        Self {
            frame_type,
            seq,
            sender_id,
            receiver_id,
        }
    }

    pub fn encode_into(&self, buf: &mut [u8]) {
        buf[0] = self.frame_type as u8;
        buf[1..6].fill(0);
        buf[6..8].copy_from_slice(&self.seq.to_le_bytes());
        buf[8..12].copy_from_slice(&self.sender_id.to_be_bytes());
        buf[12..16].copy_from_slice(&self.receiver_id.to_be_bytes());
    }

    /// Parses the header, rejecting unknown types and non-zero reserved bytes.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::LEN || bytes[1..6] != [0; 5] {
            return None;
        }
        Some(Self {
            frame_type: FrameType::from_u8(bytes[0])?,
            seq: u16::from_le_bytes([bytes[6], bytes[7]]),
            sender_id: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            receiver_id: u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        })
    }
}

/// Authenticated-layer subtype, byte 21.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthSubtype {
    Login = 0x00,
    FirstReauth = 0x02,
    StreamRequest = 0x03,
    SecondReauth = 0x05,
}

impl AuthSubtype {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(AuthSubtype::Login),
            0x02 => Some(AuthSubtype::FirstReauth),
            0x03 => Some(AuthSubtype::StreamRequest),
            0x05 => Some(AuthSubtype::SecondReauth),
            _ => None,
        }
    }
}

/// Second header at bytes 16..32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthHeader {
    pub body_tag: u8,
    /// 0x01 on requests, 0x02 on device replies.
    pub direction: u8,
    pub subtype: AuthSubtype,
    pub inner_seq: u16,
    pub token: AuthToken,
}

impl AuthHeader {
    pub const REQUEST: u8 = 0x01;

    /// Request header for an outbound frame type; the body tag comes from the
    /// layout table.
    pub fn request(
        frame_type: FrameType,
        subtype: AuthSubtype,
        inner_seq: u16,
        token: AuthToken,
    ) -> Self {
        Self {
            body_tag: frame_type.layout().body_tag.unwrap_or(0),
            direction: Self::REQUEST,
            subtype,
            inner_seq,
            token,
        }
    }

    pub fn encode_into(&self, buf: &mut [u8]) {
        let header = &mut buf[AUTH_HEADER];
        header.fill(0);
        header[3] = self.body_tag;
        header[4] = self.direction;
        header[5] = self.subtype as u8;
        header[7..9].copy_from_slice(&self.inner_seq.to_le_bytes());
        header[10..16].copy_from_slice(&self.token.0);
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < AUTH_HEADER.end {
            return None;
        }
        let header = &bytes[AUTH_HEADER];
        Some(Self {
            body_tag: header[3],
            direction: header[4],
            subtype: AuthSubtype::from_u8(header[5])?,
            inner_seq: u16::from_le_bytes([header[7], header[8]]),
            token: AuthToken::from_slice(&header[10..16])?,
        })
    }
}

/// Pre-encoded text slots of the login frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginFields {
    pub username: [u8; CREDENTIAL_WIDTH],
    pub password: [u8; CREDENTIAL_WIDTH],
    pub client_name: [u8; CLIENT_NAME_WIDTH],
}

/// Numeric stream parameters requested from the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamParameters {
    /// Device block echoed at bytes 32..48; devices report it in their own
    /// stream replies.
    pub radio_identity: [u8; 16],
    pub rx_enabled: bool,
    pub tx_enabled: bool,
    pub rx_codec: u8,
    pub tx_codec: u8,
    pub rx_sample_rate: u32,
    pub tx_sample_rate: u32,
    pub serial_port: u16,
    pub audio_port: u16,
    pub tx_buffer_ms: u32,
    pub convert: bool,
}

impl Default for StreamParameters {
    fn default() -> Self {
        Self {
            radio_identity: [
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x80, 0x00, 0x00, 0x90, 0xc7,
                0x0e, 0x86, 0x01,
            ],
            rx_enabled: true,
            tx_enabled: true,
            rx_codec: 0x04,
            tx_codec: 0x04,
            rx_sample_rate: 48_000,
            tx_sample_rate: 48_000,
            serial_port: 50_002,
            audio_port: 50_003,
            tx_buffer_ms: 160,
            convert: true,
        }
    }
}

/// Pre-encoded slots of the stream request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequestFields {
    pub device_model: [u8; DEVICE_MODEL_WIDTH],
    pub username: [u8; CREDENTIAL_WIDTH],
    pub params: StreamParameters,
}

fn frame_buffer(header: &BaseHeader, auth: Option<&AuthHeader>) -> Vec<u8> {
    let mut buf = vec![0u8; header.frame_type.layout().len];
    header.encode_into(&mut buf);
    if let Some(auth) = auth {
        auth.encode_into(&mut buf);
    }
    buf
}

pub fn encode_sync(header: &BaseHeader) -> Vec<u8> {
    debug_assert_eq!(header.frame_type, FrameType::Sync);
    frame_buffer(header, None)
}

pub fn encode_login(header: &BaseHeader, auth: &AuthHeader, fields: &LoginFields) -> Vec<u8> {
    debug_assert_eq!(header.frame_type, FrameType::Auth);
    let mut buf = frame_buffer(header, Some(auth));
    buf[LOGIN_USERNAME].copy_from_slice(&fields.username);
    buf[LOGIN_PASSWORD].copy_from_slice(&fields.password);
    buf[LOGIN_CLIENT_NAME].copy_from_slice(&fields.client_name);
    buf
}

pub fn encode_reauth(header: &BaseHeader, auth: &AuthHeader) -> Vec<u8> {
    debug_assert_eq!(header.frame_type, FrameType::Reauth);
    frame_buffer(header, Some(auth))
}

pub fn encode_stream_request(
    header: &BaseHeader,
    auth: &AuthHeader,
    fields: &StreamRequestFields,
) -> Vec<u8> {
    debug_assert_eq!(header.frame_type, FrameType::StreamRequest);
    let params = &fields.params;
    let mut buf = frame_buffer(header, Some(auth));
    buf[STREAM_RADIO_IDENTITY].copy_from_slice(&params.radio_identity);
    buf[STREAM_DEVICE_MODEL].copy_from_slice(&fields.device_model);
    buf[STREAM_USERNAME].copy_from_slice(&fields.username);
    buf[STREAM_RX_ENABLE] = params.rx_enabled as u8;
    buf[STREAM_TX_ENABLE] = params.tx_enabled as u8;
    buf[STREAM_RX_CODEC] = params.rx_codec;
    buf[STREAM_TX_CODEC] = params.tx_codec;
    buf[STREAM_RX_SAMPLE_RATE].copy_from_slice(&params.rx_sample_rate.to_be_bytes());
    buf[STREAM_TX_SAMPLE_RATE].copy_from_slice(&params.tx_sample_rate.to_be_bytes());
    buf[STREAM_SERIAL_PORT].copy_from_slice(&u32::from(params.serial_port).to_be_bytes());
    buf[STREAM_AUDIO_PORT].copy_from_slice(&u32::from(params.audio_port).to_be_bytes());
    buf[STREAM_TX_BUFFER].copy_from_slice(&params.tx_buffer_ms.to_be_bytes());
    buf[STREAM_CONVERT] = params.convert as u8;
    buf
}

/// Headers recovered from a well-formed frame of any known type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedHeaders {
    pub base: BaseHeader,
    pub auth: Option<AuthHeader>,
}

/// Decodes the headers of a frame whose length matches its type's layout.
pub fn decode_headers(bytes: &[u8]) -> Option<DecodedHeaders> {
    let base = BaseHeader::decode(bytes)?;
    if bytes.len() != base.frame_type.layout().len {
        return None;
    }
    let auth = match base.frame_type {
        FrameType::Sync => None,
        _ => AuthHeader::decode(bytes),
    };
    Some(DecodedHeaders { base, auth })
}

/// Device reply to the login frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthReply {
    pub seq: u16,
    pub token: AuthToken,
    pub rejected: bool,
    /// Connection label reported by the device (e.g. `FTTH`).
    pub connection: String,
}

impl AuthReply {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if !inbound(bytes, FrameType::AuthReply) {
            return None;
        }
        Some(Self {
            seq: u16::from_le_bytes([bytes[6], bytes[7]]),
            token: AuthToken::from_slice(&bytes[TOKEN])?,
            rejected: bytes[AUTH_REPLY_VERDICT] == AUTH_REJECTED,
            connection: read_text(&bytes[AUTH_REPLY_CONNECTION]),
        })
    }
}

/// Positive acknowledgment of a stream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAck {
    pub seq: u16,
    pub device_model: String,
}

/// Inbound frames the control channel reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Keep-alive probe from the device; must be echoed.
    SyncProbe { seq: u16 },
    AuthReply(AuthReply),
    /// The device refused a re-authentication.
    ReauthRejected,
    StreamAccepted(StreamAck),
}

/// Classifies an inbound datagram. Anything unrecognized (wrong length,
/// wrong prefix, missing marker) yields `None` and is meant to be dropped.
pub fn classify(bytes: &[u8]) -> Option<InboundFrame> {
    match bytes.len() {
        16 if inbound(bytes, FrameType::Sync) => Some(InboundFrame::SyncProbe {
            seq: u16::from_le_bytes([bytes[6], bytes[7]]),
        }),
        80 if inbound(bytes, FrameType::ReauthFailedNotice)
            && bytes[REAUTH_FAILED_MARKER] == [0xff; 3] =>
        {
            Some(InboundFrame::ReauthRejected)
        }
        96 => AuthReply::parse(bytes).map(InboundFrame::AuthReply),
        144 if inbound(bytes, FrameType::StreamRequest)
            && bytes[STREAM_ACK_RESULT] == 1 =>
        {
            Some(InboundFrame::StreamAccepted(StreamAck {
                seq: u16::from_le_bytes([bytes[6], bytes[7]]),
                device_model: read_text(&bytes[STREAM_ACK_MODEL]),
            }))
        }
        _ => None,
    }
}

fn inbound(bytes: &[u8], frame_type: FrameType) -> bool {
    frame_type.layout().accepts_inbound() && matches_layout(bytes, frame_type)
}

fn matches_layout(bytes: &[u8], frame_type: FrameType) -> bool {
    bytes.len() == frame_type.layout().len
        && bytes[0] == frame_type as u8
        && bytes[1..6] == [0; 5]
}

fn read_text(field: &[u8]) -> String {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: u32 = 0xbb41_3f2b;
    const REMOTE: u32 = 0xe6b2_7b7b;
    const TOKEN_BYTES: [u8; 6] = [0x5d, 0x37, 0x12, 0x82, 0x3b, 0xde];

    fn field<const N: usize>(bytes: &[u8]) -> [u8; N] {
        let mut out = [0u8; N];
        out[..bytes.len()].copy_from_slice(bytes);
        out
    }

    fn default_login_fields() -> LoginFields {
        LoginFields {
            username: field(&[0x2b, 0x3f, 0x55, 0x5c]),
            password: field(&[0x2b, 0x3f, 0x55, 0x5c, 0x3f, 0x25, 0x77, 0x58]),
            client_name: field(b"icom-pc"),
        }
    }

    #[rustfmt::skip]
    const CAPTURED_REAUTH: [u8; 64] = [
        0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0d, 0x00,
        0xbb, 0x41, 0x3f, 0x2b, 0xe6, 0xb2, 0x7b, 0x7b,
        0x00, 0x00, 0x00, 0x30, 0x01, 0x05, 0x00, 0x02,
        0x00, 0x00, 0x5d, 0x37, 0x12, 0x82, 0x3b, 0xde,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    #[rustfmt::skip]
    const CAPTURED_AUTH_REPLY: [u8; 96] = [
        0x60, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00,
        0xe6, 0xb2, 0x7b, 0x7b, 0xbb, 0x41, 0x3f, 0x2b,
        0x00, 0x00, 0x00, 0x50, 0x02, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x5d, 0x37, 0x12, 0x82, 0x3b, 0xde,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x46, 0x54, 0x54, 0x48, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    #[rustfmt::skip]
    const CAPTURED_REAUTH_FAILED: [u8; 80] = [
        0x50, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00,
        0x86, 0x1f, 0x2f, 0xcc, 0x03, 0x03, 0x89, 0x29,
        0x00, 0x00, 0x00, 0x40, 0x02, 0x03, 0x00, 0x52,
        0x00, 0x00, 0xf8, 0xad, 0x06, 0x8d, 0xda, 0x7b,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10,
        0x80, 0x00, 0x00, 0x90, 0xc7, 0x0e, 0x86, 0x01,
        0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    #[rustfmt::skip]
    const CAPTURED_STREAM_ACK: [u8; 144] = [
        0x90, 0x00, 0x00, 0x00, 0x00, 0x00, 0x19, 0x00,
        0xc6, 0x5f, 0x6f, 0x0c, 0x5f, 0x8b, 0x1e, 0x89,
        0x00, 0x00, 0x00, 0x80, 0x03, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x31, 0x30, 0x31, 0x47, 0x39, 0x07,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10,
        0x80, 0x00, 0x00, 0x90, 0xc7, 0x0e, 0x86, 0x01,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x49, 0x43, 0x2d, 0x37, 0x30, 0x35, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x01, 0x00, 0x00, 0x00, 0x69, 0x63, 0x6f, 0x6d,
        0x2d, 0x70, 0x63, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0xc0, 0xa8, 0x03, 0x03,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn layout_table_covers_every_type() {
        for layout in FRAME_LAYOUTS {
            assert_eq!(layout.frame_type.layout(), &layout);
            assert_eq!(FrameType::from_u8(layout.frame_type as u8), Some(layout.frame_type));
        }
        assert_eq!(FrameType::from_u8(0x20), None);
    }

    #[test]
    fn sync_echo_matches_capture() {
        // device probe 10 00 00 00 00 00 13 00 e4 35 dd 72 be d9 f2 63
        let header = BaseHeader::new(FrameType::Sync, 0x13, 0xbed9_f263, 0xe435_dd72);
        assert_eq!(
            encode_sync(&header),
            vec![
                0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x13, 0x00, 0xbe, 0xd9, 0xf2, 0x63, 0xe4,
                0x35, 0xdd, 0x72
            ]
        );
    }

    #[test]
    fn reauth_matches_capture() {
        let header = BaseHeader::new(FrameType::Reauth, 0x0d, LOCAL, REMOTE);
        let auth = AuthHeader::request(
            FrameType::Reauth,
            AuthSubtype::SecondReauth,
            2,
            AuthToken(TOKEN_BYTES),
        );
        assert_eq!(encode_reauth(&header, &auth), CAPTURED_REAUTH.to_vec());
    }

    #[test]
    #[rustfmt::skip]
    fn default_login_is_bit_exact() {
        let header = BaseHeader::new(FrameType::Auth, 1, LOCAL, REMOTE);
        let auth = AuthHeader::request(FrameType::Auth, AuthSubtype::Login, 1, AuthToken::ZERO);
        let frame = encode_login(&header, &auth, &default_login_fields());

        let mut expected = vec![0u8; 128];
        expected[..32].copy_from_slice(&[
            0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00,
            0xbb, 0x41, 0x3f, 0x2b, 0xe6, 0xb2, 0x7b, 0x7b,
            0x00, 0x00, 0x00, 0x70, 0x01, 0x00, 0x00, 0x01,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]);
        expected[64..72].copy_from_slice(&[0x2b, 0x3f, 0x55, 0x5c, 0x00, 0x00, 0x00, 0x00]);
        expected[80..88].copy_from_slice(&[0x2b, 0x3f, 0x55, 0x5c, 0x3f, 0x25, 0x77, 0x58]);
        expected[96..104].copy_from_slice(&[0x69, 0x63, 0x6f, 0x6d, 0x2d, 0x70, 0x63, 0x00]);
        assert_eq!(frame, expected);
    }

    #[test]
    #[rustfmt::skip]
    fn default_stream_request_is_bit_exact() {
        let header = BaseHeader::new(FrameType::StreamRequest, 4, LOCAL, REMOTE);
        let auth = AuthHeader::request(
            FrameType::StreamRequest,
            AuthSubtype::StreamRequest,
            4,
            AuthToken(TOKEN_BYTES),
        );
        let fields = StreamRequestFields {
            device_model: field(b"IC-705"),
            username: field(&[0x2b, 0x3f, 0x55, 0x5c]),
            params: StreamParameters::default(),
        };
        let expected: [u8; 144] = [
            0x90, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00,
            0xbb, 0x41, 0x3f, 0x2b, 0xe6, 0xb2, 0x7b, 0x7b,
            0x00, 0x00, 0x00, 0x80, 0x01, 0x03, 0x00, 0x04,
            0x00, 0x00, 0x5d, 0x37, 0x12, 0x82, 0x3b, 0xde,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10,
            0x80, 0x00, 0x00, 0x90, 0xc7, 0x0e, 0x86, 0x01,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x49, 0x43, 0x2d, 0x37, 0x30, 0x35, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x2b, 0x3f, 0x55, 0x5c, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x01, 0x01, 0x04, 0x04, 0x00, 0x00, 0xbb, 0x80,
            0x00, 0x00, 0xbb, 0x80, 0x00, 0x00, 0xc3, 0x52,
            0x00, 0x00, 0xc3, 0x53, 0x00, 0x00, 0x00, 0xa0,
            0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        assert_eq!(encode_stream_request(&header, &auth, &fields), expected.to_vec());
    }

    #[test]
    fn headers_survive_encoding() {
        let token = AuthToken(TOKEN_BYTES);
        let cases = [
            (FrameType::Reauth, AuthSubtype::FirstReauth, 0xfffe_u16, 0x0102_u16),
            (FrameType::Auth, AuthSubtype::Login, 1, 1),
            (FrameType::StreamRequest, AuthSubtype::StreamRequest, 0x8000, 0x00ff),
        ];
        for (frame_type, subtype, seq, inner_seq) in cases {
            let header = BaseHeader::new(frame_type, seq, 0x0a0b_0c0d, 0x1122_3344);
            let auth = AuthHeader::request(frame_type, subtype, inner_seq, token);
            let bytes = match frame_type {
                FrameType::Reauth => encode_reauth(&header, &auth),
                FrameType::Auth => encode_login(&header, &auth, &default_login_fields()),
                _ => encode_stream_request(
                    &header,
                    &auth,
                    &StreamRequestFields {
                        device_model: [0; DEVICE_MODEL_WIDTH],
                        username: [0; CREDENTIAL_WIDTH],
                        params: StreamParameters::default(),
                    },
                ),
            };
            let decoded = decode_headers(&bytes).expect("known frame");
            assert_eq!(decoded.base, header);
            assert_eq!(decoded.auth, Some(auth));
        }

        let sync = BaseHeader::new(FrameType::Sync, 7, 1, 2);
        let decoded = decode_headers(&encode_sync(&sync)).unwrap();
        assert_eq!(decoded.base, sync);
        assert_eq!(decoded.auth, None);
    }

    #[test]
    fn decode_rejects_bad_length_and_reserved_bytes() {
        let mut bytes = CAPTURED_REAUTH.to_vec();
        bytes.push(0);
        assert!(decode_headers(&bytes).is_none());

        let mut bytes = CAPTURED_REAUTH.to_vec();
        bytes[3] = 1;
        assert!(decode_headers(&bytes).is_none());
    }

    #[test]
    fn classifies_captured_auth_reply() {
        let Some(InboundFrame::AuthReply(reply)) = classify(&CAPTURED_AUTH_REPLY) else {
            panic!("auth reply not recognized");
        };
        assert_eq!(reply.seq, 1);
        assert_eq!(reply.token, AuthToken(TOKEN_BYTES));
        assert!(!reply.rejected);
        assert_eq!(reply.connection, "FTTH");
    }

    #[test]
    fn rejection_marker_is_detected() {
        let mut bytes = CAPTURED_AUTH_REPLY;
        bytes[48..52].copy_from_slice(&[0xff, 0xff, 0xff, 0xfe]);
        let reply = AuthReply::parse(&bytes).unwrap();
        assert!(reply.rejected);
    }

    #[test]
    fn classifies_reauth_failure_notice() {
        assert_eq!(
            classify(&CAPTURED_REAUTH_FAILED),
            Some(InboundFrame::ReauthRejected)
        );
        let mut without_marker = CAPTURED_REAUTH_FAILED;
        without_marker[49] = 0;
        assert_eq!(classify(&without_marker), None);
    }

    #[test]
    fn classifies_stream_ack() {
        assert_eq!(
            classify(&CAPTURED_STREAM_ACK),
            Some(InboundFrame::StreamAccepted(StreamAck {
                seq: 0x19,
                device_model: "IC-705".into(),
            }))
        );
        let mut refused = CAPTURED_STREAM_ACK;
        refused[96] = 0;
        assert_eq!(classify(&refused), None);
    }

    #[test]
    fn unrecognized_frames_are_ignored() {
        assert_eq!(classify(&[]), None);
        assert_eq!(classify(&CAPTURED_STREAM_ACK[..143]), None);
        assert_eq!(classify(&CAPTURED_REAUTH), None);
        let mut probe = [0u8; 16];
        probe[0] = 0x10;
        probe[2] = 1;
        assert_eq!(classify(&probe), None);
        probe[2] = 0;
        probe[6] = 0x34;
        probe[7] = 0x12;
        assert_eq!(classify(&probe), Some(InboundFrame::SyncProbe { seq: 0x1234 }));
    }

    #[test]
    fn only_device_frame_types_are_accepted_inbound() {
        let inbound: Vec<FrameType> = FRAME_LAYOUTS
            .iter()
            .filter(|layout| layout.accepts_inbound())
            .map(|layout| layout.frame_type)
            .collect();
        assert_eq!(
            inbound,
            vec![
                FrameType::Sync,
                FrameType::ReauthFailedNotice,
                FrameType::AuthReply,
                FrameType::StreamRequest,
            ]
        );
        assert!(!FrameType::Auth.layout().accepts_inbound());
        assert!(!FrameType::Reauth.layout().accepts_inbound());
    }
}
