//! Trace point data types.
//!
//! A [`TracePoint`] is the completed record of one zone: identity (name,
//! category) plus timing and thread/process facts. Text is stored inline in
//! fixed-capacity buffers so a trace point never allocates.

use std::fmt;

use serde::{Serialize, Serializer};

/// Category assigned to zones opened without one.
pub const DEFAULT_CATEGORY: &str = "default";

/// Storage capacity of a trace point name, terminator slot included.
pub const NAME_CAPACITY: usize = 64;

/// Storage capacity of a trace point category, terminator slot included.
pub const CATEGORY_CAPACITY: usize = 40;

/// Inline text buffer holding at most `N - 1` bytes of UTF-8.
///
/// Over-long input is truncated to the longest prefix that fits and ends on a
/// character boundary. Construction never fails.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedText<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> FixedText<N> {
    /// Maximum number of text bytes that can be stored.
    pub const MAX_LEN: usize = N.saturating_sub(1);

    /// Store `text`, truncating it if it does not fit.
    pub fn new(text: &str) -> Self {
        let mut len = text.len().min(Self::MAX_LEN);
        while !text.is_char_boundary(len) {
            len -= 1;
        }

        let mut buf = [0u8; N];
        buf[..len].copy_from_slice(&text.as_bytes()[..len]);
        Self { buf, len }
    }

    /// The stored text.
    pub fn as_str(&self) -> &str {
        // Always valid: `new` only copies whole characters.
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }

    /// Length of the stored text in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no text is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<const N: usize> Default for FixedText<N> {
    fn default() -> Self {
        Self {
            buf: [0u8; N],
            len: 0,
        }
    }
}

impl<const N: usize> From<&str> for FixedText<N> {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl<const N: usize> fmt::Debug for FixedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<const N: usize> fmt::Display for FixedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> PartialEq<str> for FixedText<N> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl<const N: usize> PartialEq<&str> for FixedText<N> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl<const N: usize> Serialize for FixedText<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Zone name storage.
pub type ZoneName = FixedText<NAME_CAPACITY>;

/// Zone category storage.
pub type ZoneCategory = FixedText<CATEGORY_CAPACITY>;

/// One completed region execution.
///
/// Timestamps are microseconds from the registry's clock. A trace point handed
/// to the registry by a [`Zone`](crate::Zone) always has `time_end >= time_start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracePoint {
    /// Display label; not unique.
    pub name: ZoneName,
    /// Grouping tag.
    pub category: ZoneCategory,
    /// Start of the region in microseconds.
    pub time_start: u64,
    /// End of the region in microseconds.
    pub time_end: u64,
    /// Id of the capturing process.
    pub process_id: u32,
    /// Hashed id of the capturing thread, stable within one run.
    pub thread_id: u32,
}

impl TracePoint {
    /// Create a trace point with no timing information yet.
    pub fn new(name: &str, category: &str) -> Self {
        Self {
            name: ZoneName::new(name),
            category: ZoneCategory::new(category),
            time_start: 0,
            time_end: 0,
            process_id: 0,
            thread_id: 0,
        }
    }

    /// Set the start and end timestamps.
    pub fn with_times(mut self, time_start: u64, time_end: u64) -> Self {
        self.time_start = time_start;
        self.time_end = time_end;
        self
    }

    /// Set the process and thread identity.
    pub fn with_ids(mut self, process_id: u32, thread_id: u32) -> Self {
        self.process_id = process_id;
        self.thread_id = thread_id;
        self
    }

    /// Elapsed microseconds between start and end.
    pub fn duration(&self) -> u64 {
        self.time_end.saturating_sub(self.time_start)
    }
}

/// A `(title, value)` metadata pair emitted at the top level of the trace file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub value: String,
}

impl Metadata {
    pub fn new(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
        }
    }
}
