//! Trace registry.
//!
//! Accumulates completed trace points and metadata from any number of threads
//! and writes them out exactly once, either on an explicit [`TraceRegistry::flush`]
//! or when the registry is dropped.
//!
//! The registry is an ordinary owned value. Construct it where the program
//! starts, share it by reference (scoped threads) or `Arc`, and let it drop
//! after every instrumented thread has finished.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::clock::{Clock, MonotonicClock};
use crate::types::{DEFAULT_CATEGORY, Metadata, TracePoint};
use crate::writer::{FlameGraphWriter, WriteError, WriterConfig, epoch_anchor};
use crate::zone::Zone;

/// Lifecycle of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Recording spans and metadata.
    Accumulating,
    /// Data has been written and released; further records are ignored.
    Flushed,
}

#[derive(Debug)]
struct RegistryState {
    phase: Phase,
    points: Vec<TracePoint>,
    metadata: Vec<Metadata>,
}

/// Outcome of a successful flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushSummary {
    /// File written, `None` if the writer is disabled.
    pub path: Option<PathBuf>,
    /// Number of trace events written.
    pub spans: usize,
    /// Number of metadata entries written.
    pub metadata: usize,
    /// Earliest start time, subtracted from every `ts`.
    pub epoch_anchor: u64,
}

/// Process-wide collection point for trace points and metadata.
///
/// Thread-safe via internal mutex.
pub struct TraceRegistry {
    writer: FlameGraphWriter,
    clock: Box<dyn Clock>,
    state: Mutex<RegistryState>,
}

impl TraceRegistry {
    /// Create a registry using the monotonic clock.
    pub fn new(config: WriterConfig) -> Self {
        Self::with_clock(config, MonotonicClock)
    }

    /// Create a registry reading timestamps from `clock`.
    pub fn with_clock(config: WriterConfig, clock: impl Clock + 'static) -> Self {
        Self {
            writer: FlameGraphWriter::new(config),
            clock: Box::new(clock),
            state: Mutex::new(RegistryState {
                phase: Phase::Accumulating,
                points: Vec::new(),
                metadata: Vec::new(),
            }),
        }
    }

    /// Create a registry with the default configuration (`profiler.json`).
    pub fn with_defaults() -> Self {
        Self::new(WriterConfig::default())
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // A panic while holding the lock cannot leave the vectors half-pushed.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &WriterConfig {
        self.writer.config()
    }

    /// Current reading of the registry's clock in microseconds.
    pub fn now_micros(&self) -> u64 {
        self.clock.now_micros()
    }

    /// Open a zone in the default category.
    pub fn zone(&self, name: &str) -> Zone<'_> {
        Zone::with_category(self, name, DEFAULT_CATEGORY)
    }

    /// Open a zone in `category`.
    pub fn zone_with_category(&self, name: &str, category: &str) -> Zone<'_> {
        Zone::with_category(self, name, category)
    }

    /// Append a completed trace point.
    pub fn record_span(&self, point: TracePoint) {
        let mut state = self.lock();
        match state.phase {
            Phase::Accumulating => state.points.push(point),
            Phase::Flushed => {
                tracing::trace!(name = %point.name, "span recorded after flush, ignoring");
            }
        }
    }

    /// Append a metadata entry.
    pub fn record_metadata(&self, title: impl Into<String>, value: impl Into<String>) {
        let entry = Metadata::new(title, value);
        let mut state = self.lock();
        match state.phase {
            Phase::Accumulating => state.metadata.push(entry),
            Phase::Flushed => {
                tracing::trace!(title = %entry.title, "metadata recorded after flush, ignoring");
            }
        }
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn is_flushed(&self) -> bool {
        self.phase() == Phase::Flushed
    }

    pub fn span_count(&self) -> usize {
        self.lock().points.len()
    }

    pub fn metadata_count(&self) -> usize {
        self.lock().metadata.len()
    }

    /// Copies of everything recorded so far.
    pub fn snapshot(&self) -> (Vec<TracePoint>, Vec<Metadata>) {
        let state = self.lock();
        (state.points.clone(), state.metadata.clone())
    }

    /// Write the trace file and release all recorded data.
    ///
    /// Only the first call does anything; later calls return
    /// [`WriteError::AlreadyFlushed`]. The registry is flushed even if the
    /// write fails, so the data is gone either way.
    pub fn flush(&self) -> Result<FlushSummary, WriteError> {
        let (points, metadata) = {
            let mut state = self.lock();
            if state.phase == Phase::Flushed {
                return Err(WriteError::AlreadyFlushed);
            }
            state.phase = Phase::Flushed;
            (
                std::mem::take(&mut state.points),
                std::mem::take(&mut state.metadata),
            )
        };

        let path = self.writer.write(&points, &metadata)?;
        Ok(FlushSummary {
            path,
            spans: points.len(),
            metadata: metadata.len(),
            epoch_anchor: epoch_anchor(&points),
        })
    }
}

impl Default for TraceRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for TraceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("TraceRegistry")
            .field("config", self.writer.config())
            .field("phase", &state.phase)
            .field("spans", &state.points.len())
            .field("metadata", &state.metadata.len())
            .finish()
    }
}

impl Drop for TraceRegistry {
    fn drop(&mut self) {
        match self.flush() {
            Ok(_) | Err(WriteError::AlreadyFlushed) => {}
            Err(e) => {
                tracing::debug!(
                    path = %self.writer.config().output_path.display(),
                    error = %e,
                    "skipping flame graph trace"
                );
            }
        }
    }
}
