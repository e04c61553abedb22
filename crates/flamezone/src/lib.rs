//! Scoped zone instrumentation with flame graph output.
//!
//! This crate records named code regions ("zones") and writes them as a
//! Chrome Tracing JSON document that flame graph viewers such as
//! `chrome://tracing` or <https://ui.perfetto.dev> can open:
//!
//! - **Types**: `TracePoint` records with fixed-capacity name and category
//! - **Clock**: the `Clock` trait with monotonic, wall and manual sources
//! - **Zone**: RAII guard that times a scope and publishes it on drop
//! - **Registry**: thread-safe accumulation, flushed once at shutdown
//! - **Writer**: JSON serialization and atomic file persistence
//!
//! # Usage
//!
//! ```rust,no_run
//! use flamezone::{TraceRegistry, WriterConfig};
//!
//! let registry = TraceRegistry::new(WriterConfig::new("profiler.json"));
//! registry.record_metadata("build", "debug");
//!
//! std::thread::scope(|s| {
//!     s.spawn(|| {
//!         let _zone = registry.zone_with_category("load", "io");
//!         // Do work...
//!     });
//! });
//!
//! // Dropping the registry writes profiler.json.
//! drop(registry);
//! ```
//!
//! # Compiling instrumentation out
//!
//! Hosts that ship instrumented and production builds from one source use the
//! macros instead of the types directly. Without the `profiler` feature,
//! `Profiler` is `()` and every macro call disappears:
//!
//! ```rust,ignore
//! fn load(profiler: &flamezone::Profiler) {
//!     flamezone::zone!(profiler, "load", "io");
//!     // ...
//! }
//!
//! let profiler = flamezone::profiler!();
//! flamezone::metadata!(profiler, "build", "debug");
//! load(&profiler);
//! ```

pub mod clock;
mod macros;
pub mod registry;
pub mod types;
pub mod writer;
pub mod zone;

// Re-export main types
pub use clock::{
    Clock, ManualClock, MonotonicClock, WallClock, current_process_id, current_thread_id,
};
pub use registry::{FlushSummary, Phase, TraceRegistry};
pub use types::{
    CATEGORY_CAPACITY, DEFAULT_CATEGORY, FixedText, Metadata, NAME_CAPACITY, TracePoint,
    ZoneCategory, ZoneName,
};
pub use writer::{
    DEFAULT_OUTPUT, FlameGraphWriter, TraceEvent, TraceFile, WriteError, WriterConfig,
    epoch_anchor,
};
pub use zone::Zone;

/// Handle the instrumentation macros operate on.
#[cfg(feature = "profiler")]
pub type Profiler = TraceRegistry;

/// Handle the instrumentation macros operate on; nothing when profiling is off.
#[cfg(not(feature = "profiler"))]
pub type Profiler = ();
