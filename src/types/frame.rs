//! Frame and record types

use bytes::Bytes;
use chrono::{DateTime, TimeZone};
use std::fmt;

/// One client request: the bytes up to and including the first newline,
/// or everything received before the peer closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    payload: Bytes,
    terminated: bool,
}

impl Frame {
    /// Create a frame from received bytes
    pub fn new(payload: Bytes, terminated: bool) -> Self {
        Self {
            payload,
            terminated,
        }
    }

    /// Raw frame bytes, newline included when present
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the frame and return its payload
    pub fn into_bytes(self) -> Bytes {
        self.payload
    }

    /// Whether a newline ended the frame (as opposed to end of stream)
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Frame length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True when the peer closed without sending anything
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = String::from_utf8_lossy(&self.payload);
        write!(f, "{}", text.trim_end_matches('\n'))
    }
}

/// Format one timestamp record line for the shared log.
///
/// `pattern` is a chrono strftime pattern; a trailing newline is always added.
pub fn format_timestamp_record<Tz>(now: &DateTime<Tz>, pattern: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    format!("{}\n", now.format(pattern))
}
