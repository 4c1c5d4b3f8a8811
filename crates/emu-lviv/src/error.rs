//! Error types.
//!
//! Each failure class has its own type so callers can match on what went
//! wrong; [`LvivError`] unifies them for operations that can fail in more
//! than one way.

use std::fmt;

use thiserror::Error;

/// Invalid machine configuration. Fatal at construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown memory map {0}K (expected 80, 144 or 256)")]
    UnknownMemoryMap(u16),
    #[error("unknown profile \"{0}\"")]
    UnknownProfile(String),
    #[error("{field} must be non-zero")]
    Zero { field: &'static str },
    #[error("ROM image must be at most 16384 bytes, got {0}")]
    RomTooLarge(usize),
    #[error("invalid configuration JSON: {0}")]
    Json(String),
}

/// Kind of memory access that was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
    Burn,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessKind::Read => "read",
            AccessKind::Write => "write",
            AccessKind::Burn => "burn",
        })
    }
}

/// Illegal read, write or burn on a memory bank under strict mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} disabled at {address:#06X}")]
pub struct AccessFault {
    pub kind: AccessKind,
    pub address: u16,
}

/// Out-of-bounds block transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeFault {
    #[error("invalid bounds {begin:#06X}..={end:#06X}")]
    InvalidBounds { begin: u16, end: u16 },
    #[error("offset {offset} + {needed} bytes is outside a source of {available} bytes")]
    SourceExhausted {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

/// Malformed snapshot or tape file. Reported to the user; machine state is
/// left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("invalid {format} file structure")]
    BadHeader { format: &'static str },
    #[error("{format} file too short: need {expected} bytes, got {actual}")]
    Truncated {
        format: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{format} block too large: {actual} bytes, limit {limit}")]
    TooLarge {
        format: &'static str,
        limit: usize,
        actual: usize,
    },
    #[error("unknown file type {0:#04X}")]
    UnknownFileType(u8),
}

/// Failed asynchronous file acquisition or read.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no file selected")]
    Cancelled,
    #[error("file source disconnected before delivering a result")]
    Disconnected,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failed screenshot or audio dump.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),
    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Any error raised by the machine.
#[derive(Debug, Error)]
pub enum LvivError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Access(#[from] AccessFault),
    #[error(transparent)]
    Range(#[from] RangeFault),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, LvivError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_fault_message_names_address() {
        let fault = AccessFault {
            kind: AccessKind::Write,
            address: 0xC123,
        };
        assert_eq!(fault.to_string(), "write disabled at 0xC123");
    }

    #[test]
    fn range_fault_converts_into_lviv_error() {
        let err: LvivError = RangeFault::InvalidBounds { begin: 2, end: 1 }.into();
        assert!(matches!(err, LvivError::Range(RangeFault::InvalidBounds { .. })));
    }
}
