// TLS record-layer vocabulary shared by the session core and engine bindings

use std::io::{Error, ErrorKind};

/// TLS record content types (RFC 8446 section 5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 0x14,
    Alert = 0x15,
    Handshake = 0x16,
    ApplicationData = 0x17,
}

impl ContentType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x14 => Some(Self::ChangeCipherSpec),
            0x15 => Some(Self::Alert),
            0x16 => Some(Self::Handshake),
            0x17 => Some(Self::ApplicationData),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// TLS record header size (ContentType + ProtocolVersion + Length)
pub const TLS_RECORD_HEADER_LEN: usize = 5;

/// Maximum plaintext payload for a single TLS record
///
/// RFC 8446 Section 5.1: "The record layer fragments information blocks into
/// TLSPlaintext records carrying data in chunks of 2^14 bytes or less."
/// Exceeding this produces "record overflow" errors in peer implementations.
pub const MAX_TLS_PLAINTEXT_LEN: usize = 16384;

/// Maximum TLS 1.3 ciphertext payload (plaintext + 256-byte expansion
/// allowance for the inner content type byte, AEAD tag, and padding)
pub const MAX_TLS_CIPHERTEXT_LEN: usize = MAX_TLS_PLAINTEXT_LEN + 256;

/// Maximum on-the-wire record size (ciphertext + header)
pub const MAX_TLS_RECORD_LEN: usize = MAX_TLS_CIPHERTEXT_LEN + TLS_RECORD_HEADER_LEN;

/// Parse a content type byte, rejecting unknown values.
pub fn parse_content_type(b: u8) -> std::io::Result<ContentType> {
    ContentType::from_byte(b).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidData,
            format!("invalid record content type: 0x{:02x}", b),
        )
    })
}
