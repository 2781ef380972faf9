//! Fixed-width text fields carried inside control frames.
//!
//! Usernames and passwords travel through a character obfuscation that has
//! only been observed for a handful of captured strings, so the credential
//! codec is a lookup table of known pairs rather than a general transform.
//! Client names and device models travel as plain ASCII.

use std::collections::HashMap;

use thiserror::Error;

/// Errors produced while encoding a text field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextCodecError {
    #[error("no captured obfuscation for {0:?}; register the device bytes for it")]
    Unknown(String),
    #[error("{text:?} needs {needed} bytes but the field holds {width}")]
    TooLong {
        text: String,
        needed: usize,
        width: usize,
    },
    #[error("{0:?} is not plain ASCII")]
    NotAscii(String),
}

/// Encodes a text value into a zero-padded field of `width` bytes.
pub trait TextCodec: Send + Sync {
    fn encode(&self, text: &str, width: usize) -> Result<Vec<u8>, TextCodecError>;
}

fn pad(text: &str, bytes: &[u8], width: usize) -> Result<Vec<u8>, TextCodecError> {
    if bytes.len() > width {
        return Err(TextCodecError::TooLong {
            text: text.to_string(),
            needed: bytes.len(),
            width,
        });
    }
    let mut field = vec![0u8; width];
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(field)
}

/// Plain ASCII, zero padded.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainText;

impl TextCodec for PlainText {
    fn encode(&self, text: &str, width: usize) -> Result<Vec<u8>, TextCodecError> {
        if !text.is_ascii() {
            return Err(TextCodecError::NotAscii(text.to_string()));
        }
        pad(text, text.as_bytes(), width)
    }
}

/// Credential obfuscation backed by captured (plain, wire) pairs.
#[derive(Debug, Clone)]
pub struct LiteralCredentials {
    known: HashMap<String, Vec<u8>>,
}

impl LiteralCredentials {
    /// Table without any entries.
    pub fn empty() -> Self {
        Self {
            known: HashMap::new(),
        }
    }

    /// Registers the wire bytes a device expects for `plain`.
    pub fn with(mut self, plain: impl Into<String>, wire: impl Into<Vec<u8>>) -> Self {
        self.known.insert(plain.into(), wire.into());
        self
    }
}

impl Default for LiteralCredentials {
    /// The factory default username and password.
    fn default() -> Self {
        Self::empty()
            .with("beer", [0x2b, 0x3f, 0x55, 0x5c])
            .with("beerbeer", [0x2b, 0x3f, 0x55, 0x5c, 0x3f, 0x25, 0x77, 0x58])
    }
}

impl TextCodec for LiteralCredentials {
    fn encode(&self, text: &str, width: usize) -> Result<Vec<u8>, TextCodecError> {
        let wire = self
            .known
            .get(text)
            .ok_or_else(|| TextCodecError::Unknown(text.to_string()))?;
        pad(text, wire, width)
    }
}
