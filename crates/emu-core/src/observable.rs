//! Read-only inspection of component state.
//!
//! Queries never affect emulation state: reading a keyboard-backed port
//! through `query` must not latch anything, and reading a page that would
//! fault under strict mode must not raise.

use std::fmt;

/// A dynamically-typed value returned by a state query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U64(u64),
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::U8(v) => write!(f, "{v:#04X}"),
            Value::U16(v) => write!(f, "{v:#06X}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
        }
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// A component whose state can be inspected by dotted path
/// (`memory.0xC000`, `io.0xC1`, `cpu.pc`).
pub trait Observable {
    /// Query a property. Returns `None` for unknown paths.
    fn query(&self, path: &str) -> Option<Value>;

    /// Paths accepted by [`Observable::query`]; `<...>` marks a parameter.
    fn query_paths(&self) -> &'static [&'static str];
}

/// Parse a numeric path segment: `0x` or `$` prefixed hex, or decimal.
#[must_use]
pub fn parse_number(segment: &str) -> Option<u32> {
    if let Some(hex) = segment
        .strip_prefix("0x")
        .or_else(|| segment.strip_prefix("0X"))
        .or_else(|| segment.strip_prefix('$'))
    {
        u32::from_str_radix(hex, 16).ok()
    } else {
        segment.parse().ok()
    }
}
