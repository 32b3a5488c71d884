//! Byte-level codec for the minissdpd socket protocol.
//!
//! Strings on the socket are never NUL-terminated. Each is preceded by its
//! length, written 7 bits per byte with the most significant group first; every
//! byte except the last carries the continuation bit `0x80`.
//!
//! Responses start with a one-byte record count followed by that many records,
//! each made of three length-prefixed strings. Note that the daemon answers in
//! the order {location, type, USN}, while registrations are written in the order
//! {type, USN, server, location}.

use std::io::{self, Read};

use bytes::BufMut;
use thiserror::Error;

use crate::protocol_constants::MAX_LENGTH_BYTES;

/// Largest length representable in [`MAX_LENGTH_BYTES`] groups of 7 bits.
pub const MAX_ENCODABLE_LENGTH: u64 = (1 << (7 * MAX_LENGTH_BYTES as u64)) - 1;

/// Errors produced while encoding or decoding daemon messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// The length needs more than five prefix bytes.
    #[error("length {0} cannot be encoded in 5 bytes")]
    LengthTooLarge(usize),

    /// No terminating byte was seen within five prefix bytes.
    #[error("length prefix not terminated within 5 bytes")]
    LengthOverflow,

    /// The reader failed (or ran dry) while decoding a length prefix.
    #[error("failed to read length prefix: {0}")]
    Read(#[source] io::Error),

    /// A response ended before all announced records were read.
    #[error("short read in daemon response: {0}")]
    ShortRead(#[source] io::Error),

    /// A string payload was not valid UTF-8.
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Convenient Result alias for wire operations.
pub type WireResult<T> = Result<T, WireError>;

// ─────────────────────────────────────────────────────────────────────────────
// Length Prefix
// ─────────────────────────────────────────────────────────────────────────────

/// Writes `len` as a length prefix.
///
/// # Errors
///
/// Returns [`WireError::LengthTooLarge`] if `len` exceeds [`MAX_ENCODABLE_LENGTH`].
pub fn encode_length<B: BufMut>(len: usize, buf: &mut B) -> WireResult<()> {
    let n = len as u64;
    if n > MAX_ENCODABLE_LENGTH {
        return Err(WireError::LengthTooLarge(len));
    }

    let mut groups = 1;
    while groups < MAX_LENGTH_BYTES && n >> (7 * groups) != 0 {
        groups += 1;
    }

    for shift in (1..groups).rev() {
        buf.put_u8(((n >> (7 * shift)) & 0x7f) as u8 | 0x80);
    }
    buf.put_u8((n & 0x7f) as u8);
    Ok(())
}

/// Reads a length prefix, one byte at a time.
///
/// # Errors
///
/// - [`WireError::Read`] if the reader fails or ends mid-prefix.
/// - [`WireError::LengthOverflow`] if five bytes pass without a terminator.
pub fn decode_length<R: Read>(reader: &mut R) -> WireResult<usize> {
    let mut n: u64 = 0;
    let mut byte = [0u8; 1];

    for _ in 0..MAX_LENGTH_BYTES {
        reader.read_exact(&mut byte).map_err(WireError::Read)?;
        n = (n << 7) | u64::from(byte[0] & 0x7f);
        if byte[0] & 0x80 == 0 {
            return usize::try_from(n).map_err(|_| WireError::LengthOverflow);
        }
    }

    Err(WireError::LengthOverflow)
}

// ─────────────────────────────────────────────────────────────────────────────
// Strings
// ─────────────────────────────────────────────────────────────────────────────

/// Writes `s` preceded by its length prefix.
pub fn encode_string<B: BufMut>(s: &str, buf: &mut B) -> WireResult<()> {
    encode_length(s.len(), buf)?;
    buf.put_slice(s.as_bytes());
    Ok(())
}

/// Reads one length-prefixed string.
///
/// The payload is read through `take` so a hostile length cannot force a
/// large up-front allocation.
pub fn decode_string<R: Read>(reader: &mut R) -> WireResult<String> {
    let len = decode_length(reader)?;

    let mut payload = Vec::new();
    reader
        .by_ref()
        .take(len as u64)
        .read_to_end(&mut payload)
        .map_err(WireError::ShortRead)?;

    if payload.len() != len {
        return Err(WireError::ShortRead(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {} bytes, got {}", len, payload.len()),
        )));
    }

    String::from_utf8(payload).map_err(|_| WireError::InvalidUtf8)
}

// ─────────────────────────────────────────────────────────────────────────────
// Service Records
// ─────────────────────────────────────────────────────────────────────────────

/// An SSDP service as registered with, or reported by, minissdpd.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceRecord {
    service_type: String,
    usn: String,
    server: String,
    location: String,
}

impl ServiceRecord {
    /// Builds a record. Records are immutable once built.
    pub fn new(
        service_type: impl Into<String>,
        usn: impl Into<String>,
        server: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            service_type: service_type.into(),
            usn: usn.into(),
            server: server.into(),
            location: location.into(),
        }
    }

    /// SSDP notification/search type (NT/ST).
    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    /// Unique service name.
    pub fn usn(&self) -> &str {
        &self.usn
    }

    /// `SERVER` header value. Always empty on records decoded from a response.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// URL of the device description.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Encodes the record in registration order {type, USN, server, location}.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(
            4 * MAX_LENGTH_BYTES
                + self.service_type.len()
                + self.usn.len()
                + self.server.len()
                + self.location.len(),
        );
        self.encode_to(&mut buf)?;
        Ok(buf)
    }

    /// Appends the encoded record to `buf`.
    pub fn encode_to<B: BufMut>(&self, buf: &mut B) -> WireResult<()> {
        for field in [&self.service_type, &self.usn, &self.server, &self.location] {
            encode_string(field, buf)?;
        }
        Ok(())
    }
}

/// Decodes a daemon query response.
///
/// Reads a one-byte count, then for each record the strings {location, type,
/// USN}. The daemon does not send the server string.
///
/// # Errors
///
/// Any truncation surfaces as [`WireError::ShortRead`]; oversized prefixes as
/// [`WireError::LengthOverflow`].
pub fn decode_records<R: Read>(reader: &mut R) -> WireResult<Vec<ServiceRecord>> {
    let mut count = [0u8; 1];
    reader
        .read_exact(&mut count)
        .map_err(WireError::ShortRead)?;

    let mut records = Vec::with_capacity(usize::from(count[0]));
    for _ in 0..count[0] {
        let location = decode_string(reader).map_err(short)?;
        let service_type = decode_string(reader).map_err(short)?;
        let usn = decode_string(reader).map_err(short)?;
        records.push(ServiceRecord {
            service_type,
            usn,
            server: String::new(),
            location,
        });
    }

    Ok(records)
}

/// Inside a response, a reader running dry is a truncated response.
fn short(err: WireError) -> WireError {
    match err {
        WireError::Read(e) => WireError::ShortRead(e),
        other => other,
    }
}
