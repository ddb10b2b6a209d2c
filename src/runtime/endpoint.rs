//! File-like byte endpoint over one request.
//!
//! Opening an endpoint opens a request with no preference, writes update it,
//! and closing (or dropping) the endpoint retracts it. Reads return the
//! class target.
//!
//! Accepted writes:
//! - exactly 4 bytes: a native-endian `i32`
//! - 1 to 11 bytes: ASCII hexadecimal, optional `0x` prefix, optional
//!   trailing newline; an 11-byte write must end in a newline
//!
//! The raw value `-1` means "no preference".

use std::io;

use crate::core::{ClassId, QosEngine, QosError, Recompute, RequestHandle, Requirement};

/// Fixed size of a binary payload.
pub const BINARY_PAYLOAD_LEN: usize = std::mem::size_of::<i32>();
/// Longest accepted ASCII payload, newline included.
pub const MAX_ASCII_PAYLOAD_LEN: usize = 11;

/// Encoding used when reading the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFormat {
    /// 4 native-endian bytes.
    Binary,
    /// ASCII decimal followed by a newline.
    Decimal,
}

/// Decode a write payload without touching any ledger.
pub fn parse_payload(buf: &[u8]) -> Result<Requirement, QosError> {
    if buf.len() == BINARY_PAYLOAD_LEN {
        let mut raw = [0_u8; BINARY_PAYLOAD_LEN];
        raw.copy_from_slice(buf);
        return Ok(Requirement::from_raw(i32::from_ne_bytes(raw)));
    }
    if buf.is_empty() || buf.len() > MAX_ASCII_PAYLOAD_LEN {
        return Err(QosError::InvalidArgument(format!(
            "payload of {} bytes",
            buf.len()
        )));
    }

    let digits = match buf.split_last() {
        Some((b'\n', rest)) => rest,
        _ if buf.len() == MAX_ASCII_PAYLOAD_LEN => {
            return Err(QosError::InvalidArgument(
                "11-byte payload must end with a newline".into(),
            ));
        }
        _ => buf,
    };
    let text = std::str::from_utf8(digits)
        .map_err(|_| QosError::InvalidArgument("payload is not ASCII".into()))?;
    let hex = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(QosError::InvalidArgument(format!("`{text}` is not a hex number")));
    }
    let parsed = u64::from_str_radix(hex, 16)
        .map_err(|e| QosError::InvalidArgument(format!("`{text}`: {e}")))?;
    // only the low 32 bits are kept
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let raw = parsed as u32 as i32;
    Ok(Requirement::from_raw(raw))
}

/// Encode a target for reading.
pub fn encode_target(target: i32, format: ReadFormat) -> Vec<u8> {
    match format {
        ReadFormat::Binary => target.to_ne_bytes().to_vec(),
        ReadFormat::Decimal => format!("{target}\n").into_bytes(),
    }
}

/// An open endpoint session.
#[derive(Debug)]
pub struct QosEndpoint {
    handle: RequestHandle,
}

impl QosEndpoint {
    /// Open an endpoint on a class looked up by name.
    pub fn open(engine: &QosEngine, class_name: &str) -> Result<Self, QosError> {
        Ok(Self {
            handle: engine.open_by_name(class_name)?,
        })
    }

    /// Class the endpoint is bound to.
    pub const fn class(&self) -> ClassId {
        self.handle.class()
    }

    /// Read the current class target.
    pub fn read_target(&self, format: ReadFormat) -> Result<Vec<u8>, QosError> {
        if !self.handle.is_active() {
            return Err(QosError::InvalidHandle);
        }
        let target = self.handle.engine().current_target(self.handle.class())?;
        Ok(encode_target(target, format))
    }

    /// Decode a payload and apply it as an update. Returns the bytes consumed.
    /// A malformed payload leaves the request untouched.
    pub fn write_payload(&mut self, buf: &[u8]) -> Result<usize, QosError> {
        let requirement = parse_payload(buf)?;
        self.handle.update(requirement)?;
        Ok(buf.len())
    }

    /// Apply a typed update directly.
    pub fn update(&mut self, requirement: impl Into<Requirement>) -> Result<Recompute, QosError> {
        self.handle.update(requirement)
    }

    /// Close the session, retracting its request.
    pub fn close(mut self) {
        self.handle.close();
    }
}

impl io::Write for QosEndpoint {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_payload(buf).map_err(|e| match e {
            QosError::InvalidArgument(_) => io::Error::new(io::ErrorKind::InvalidInput, e),
            other => io::Error::other(other),
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
