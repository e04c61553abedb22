//! Flame graph writer for Chrome Tracing JSON persistence.
//!
//! The output document has the shape
//!
//! ```text
//! {
//!   "traceEvents": [ { "pid", "tid", "ts", "dur", "ph": "X", "name", "cat" }, ... ],
//!   "<metadata title>": "<metadata value>",
//!   ...
//! }
//! ```
//!
//! `ts` is rebased on the earliest recorded start so the first zone starts at
//! zero. Metadata keys follow the event array in insertion order, duplicates
//! included.

use std::fmt;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::{Metadata, TracePoint};

/// Default trace file name, relative to the working directory.
pub const DEFAULT_OUTPUT: &str = "profiler.json";

/// Phase marker for Chrome Tracing complete events.
pub const COMPLETE_EVENT: &str = "X";

const TRACE_EVENTS_KEY: &str = "traceEvents";

/// Error type for trace writing operations.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("trace registry was already flushed")]
    AlreadyFlushed,
}

/// Configuration for the flame graph writer.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Path of the trace file.
    pub output_path: PathBuf,

    /// Whether anything is written at all.
    pub enabled: bool,

    /// Indent the JSON document.
    pub pretty: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT)
    }
}

impl WriterConfig {
    /// Write to the given path.
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            enabled: true,
            pretty: true,
        }
    }

    /// Emit compact single-line JSON.
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    /// Never write; recorded data is discarded at flush.
    pub fn disabled() -> Self {
        Self {
            output_path: PathBuf::new(),
            enabled: false,
            pretty: false,
        }
    }
}

/// One span as it appears in `traceEvents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub pid: u32,
    pub tid: u32,
    pub ts: u64,
    pub dur: u64,
    pub ph: String,
    pub name: String,
    pub cat: String,
}

impl TraceEvent {
    /// Render a trace point relative to `anchor`.
    pub fn from_point(point: &TracePoint, anchor: u64) -> Self {
        Self {
            pid: point.process_id,
            tid: point.thread_id,
            ts: point.time_start.saturating_sub(anchor),
            dur: point.duration(),
            ph: COMPLETE_EVENT.to_string(),
            name: point.name.as_str().to_string(),
            cat: point.category.as_str().to_string(),
        }
    }
}

/// Earliest start time among `points`, or zero if there are none.
pub fn epoch_anchor(points: &[TracePoint]) -> u64 {
    points.iter().map(|p| p.time_start).min().unwrap_or(0)
}

/// Borrowed view of everything that goes into one trace file.
struct TraceDocument<'a> {
    points: &'a [TracePoint],
    metadata: &'a [Metadata],
    anchor: u64,
}

struct Events<'a> {
    points: &'a [TracePoint],
    anchor: u64,
}

impl Serialize for Events<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(
            self.points
                .iter()
                .map(|p| TraceEvent::from_point(p, self.anchor)),
        )
    }
}

impl Serialize for TraceDocument<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1 + self.metadata.len()))?;
        map.serialize_entry(
            TRACE_EVENTS_KEY,
            &Events {
                points: self.points,
                anchor: self.anchor,
            },
        )?;
        for entry in self.metadata {
            map.serialize_entry(&entry.title, &entry.value)?;
        }
        map.end()
    }
}

/// A trace file read back from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceFile {
    pub trace_events: Vec<TraceEvent>,
    /// Top-level metadata in file order, duplicates kept.
    pub metadata: Vec<Metadata>,
}

impl TraceFile {
    /// Values of every metadata entry titled `title`, in file order.
    pub fn metadata_values<'a>(&'a self, title: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.metadata
            .iter()
            .filter(move |m| m.title == title)
            .map(|m| m.value.as_str())
    }
}

impl<'de> Deserialize<'de> for TraceFile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TraceFileVisitor;

        impl<'de> Visitor<'de> for TraceFileVisitor {
            type Value = TraceFile;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a trace document object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<TraceFile, A::Error> {
                let mut events: Option<Vec<TraceEvent>> = None;
                let mut metadata = Vec::new();

                while let Some(key) = map.next_key::<String>()? {
                    // Only the first "traceEvents" is the event array; a metadata
                    // entry may reuse the title later on.
                    if key == TRACE_EVENTS_KEY && events.is_none() {
                        events = Some(map.next_value()?);
                    } else {
                        let value: String = map.next_value()?;
                        metadata.push(Metadata::new(key, value));
                    }
                }

                let trace_events = events
                    .ok_or_else(|| <A::Error as de::Error>::missing_field(TRACE_EVENTS_KEY))?;
                Ok(TraceFile {
                    trace_events,
                    metadata,
                })
            }
        }

        deserializer.deserialize_map(TraceFileVisitor)
    }
}

/// Serializes recorded trace points and metadata to a trace file.
#[derive(Debug, Clone)]
pub struct FlameGraphWriter {
    config: WriterConfig,
}

impl FlameGraphWriter {
    pub fn new(config: WriterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Serialize the trace document into `w`.
    pub fn render<W: Write>(
        &self,
        w: W,
        points: &[TracePoint],
        metadata: &[Metadata],
    ) -> Result<(), WriteError> {
        let document = TraceDocument {
            points,
            metadata,
            anchor: epoch_anchor(points),
        };

        if self.config.pretty {
            serde_json::to_writer_pretty(w, &document)?;
        } else {
            serde_json::to_writer(w, &document)?;
        }
        Ok(())
    }

    /// Render the trace document to a string.
    pub fn render_to_string(
        &self,
        points: &[TracePoint],
        metadata: &[Metadata],
    ) -> Result<String, WriteError> {
        let mut buf = Vec::new();
        self.render(&mut buf, points, metadata)?;
        buf.push(b'\n');
        // serde_json only produces UTF-8.
        String::from_utf8(buf)
            .map_err(|e| WriteError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Write the trace file.
    ///
    /// The document is written to a sibling temporary file and renamed into
    /// place, so the target is either complete or untouched. Returns the path
    /// written, or `None` when the writer is disabled.
    pub fn write(
        &self,
        points: &[TracePoint],
        metadata: &[Metadata],
    ) -> Result<Option<PathBuf>, WriteError> {
        if !self.config.enabled {
            return Ok(None);
        }

        let target = &self.config.output_path;
        let staging = staging_path(target);

        let result = self.write_staged(&staging, points, metadata).and_then(|()| {
            fs::rename(&staging, target)?;
            Ok(())
        });

        if let Err(e) = result {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }

        tracing::debug!(
            path = %target.display(),
            spans = points.len(),
            metadata = metadata.len(),
            "wrote flame graph trace"
        );
        Ok(Some(target.clone()))
    }

    fn write_staged(
        &self,
        staging: &Path,
        points: &[TracePoint],
        metadata: &[Metadata],
    ) -> Result<(), WriteError> {
        let file = fs::File::create(staging)?;
        let mut writer = BufWriter::new(file);
        self.render(&mut writer, points, metadata)?;
        writeln!(writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Read a trace file written by [`FlameGraphWriter::write`].
    pub fn read_trace(path: &Path) -> Result<TraceFile, WriteError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Sibling path unique to this write, `<file>.<pid>.<seq>.tmp`.
fn staging_path(target: &Path) -> PathBuf {
    static NEXT_STAGING: AtomicU64 = AtomicU64::new(0);

    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| DEFAULT_OUTPUT.into());
    let seq = NEXT_STAGING.fetch_add(1, Ordering::Relaxed);
    name.push(format!(".{}.{}.tmp", std::process::id(), seq));
    target.with_file_name(name)
}
