//! Scoped zones.
//!
//! A [`Zone`] times the region between its creation and its drop. Dropping
//! (or calling [`Zone::close`]) publishes the completed trace point to the
//! registry exactly once, including when the scope is left by an early
//! return or a panic.

use crate::clock::{current_process_id, current_thread_id};
use crate::registry::TraceRegistry;
use crate::types::{DEFAULT_CATEGORY, TracePoint};

/// RAII guard for one timed region.
#[must_use = "a zone measures the scope it is bound to; bind it with `let _zone = ...`"]
#[derive(Debug)]
pub struct Zone<'r> {
    registry: &'r TraceRegistry,
    point: TracePoint,
}

impl<'r> Zone<'r> {
    /// Open a zone in the default category.
    pub fn open(registry: &'r TraceRegistry, name: &str) -> Self {
        Self::with_category(registry, name, DEFAULT_CATEGORY)
    }

    /// Open a zone in `category`.
    ///
    /// Names and categories longer than their storage are truncated.
    pub fn with_category(registry: &'r TraceRegistry, name: &str, category: &str) -> Self {
        let mut point = TracePoint::new(name, category);
        point.thread_id = current_thread_id();
        point.process_id = current_process_id();
        // Take the start time last so setup is not billed to the zone.
        point.time_start = registry.now_micros();
        Self { registry, point }
    }

    /// The trace point as captured so far; `time_end` is not yet set.
    pub fn point(&self) -> &TracePoint {
        &self.point
    }

    /// End the zone now instead of at scope exit.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Zone<'_> {
    fn drop(&mut self) {
        let end = self.registry.now_micros();
        // Guards a clock that is not monotonic (e.g. wall clock adjusted backwards).
        self.point.time_end = end.max(self.point.time_start);
        self.registry.record_span(self.point);
    }
}
