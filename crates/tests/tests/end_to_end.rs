//! End-to-end tests: zones in, trace file out.
//!
//! These tests drive the public instrumentation surface and check the JSON
//! document a flame graph viewer would load.

use std::path::Path;
use std::time::Duration;

use flamezone::{
    FlameGraphWriter, Metadata, NAME_CAPACITY, Profiler, TraceFile, TraceRegistry, WriterConfig,
};
use tempfile::tempdir;

fn read(path: &Path) -> TraceFile {
    FlameGraphWriter::read_trace(path).unwrap()
}

/// E2E Test: one zone plus metadata, flushed by dropping the registry
///
/// 1. Open a zone "load" in category "io"
/// 2. Sleep 10ms inside it
/// 3. Record ("build", "debug")
/// 4. Drop the registry and inspect the file
#[test]
fn test_e2e_single_zone_with_metadata() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profiler.json");

    {
        let profiler: Profiler = flamezone::profiler!(WriterConfig::new(&path));
        {
            flamezone::zone!(profiler, "load", "io");
            std::thread::sleep(Duration::from_millis(10));
        }
        flamezone::metadata!(profiler, "build", "debug");
    }

    let trace = read(&path);
    assert_eq!(trace.trace_events.len(), 1);

    let event = &trace.trace_events[0];
    assert_eq!(event.name, "load");
    assert_eq!(event.cat, "io");
    assert_eq!(event.ph, "X");
    assert_eq!(event.ts, 0);
    assert_eq!(event.pid, std::process::id());
    assert_eq!(event.tid, flamezone::current_thread_id());
    // Sleep never returns early; allow generous slack for loaded machines.
    assert!(event.dur >= 10_000, "dur was {}", event.dur);
    assert!(event.dur < 1_000_000, "dur was {}", event.dur);

    assert_eq!(trace.metadata, vec![Metadata::new("build", "debug")]);

    // Top-level field as seen by a generic JSON reader.
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["build"], "debug");
    assert!(raw["traceEvents"].is_array());
}

#[test]
fn test_no_spans_gives_empty_array() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profiler.json");

    let registry = TraceRegistry::new(WriterConfig::new(&path));
    let summary = registry.flush().unwrap();
    assert_eq!(summary.spans, 0);
    assert_eq!(summary.epoch_anchor, 0);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["traceEvents"], serde_json::json!([]));
}

#[test]
fn test_timestamps_are_relative_to_earliest_start() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profiler.json");
    let registry = TraceRegistry::new(WriterConfig::new(&path));

    {
        let _outer = registry.zone("outer");
        std::thread::sleep(Duration::from_millis(2));
        {
            let _inner = registry.zone("inner");
            std::thread::sleep(Duration::from_millis(2));
        }
    }
    let (points, _) = registry.snapshot();
    drop(registry);

    let trace = read(&path);
    let anchor = points.iter().map(|p| p.time_start).min().unwrap();
    for (point, event) in points.iter().zip(&trace.trace_events) {
        assert_eq!(event.name, point.name.as_str());
        assert_eq!(event.ts, point.time_start - anchor);
        assert_eq!(event.dur, point.time_end - point.time_start);
    }

    // inner completes first, outer is the earliest start.
    assert_eq!(trace.trace_events[0].name, "inner");
    assert_eq!(trace.trace_events[1].name, "outer");
    assert_eq!(trace.trace_events[1].ts, 0);
    assert!(trace.trace_events[0].ts >= 2_000);
}

#[test]
fn test_metadata_order_escaping_and_duplicates() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profiler.json");

    {
        let profiler = flamezone::profiler!(WriterConfig::new(&path));
        flamezone::metadata!(profiler, "first", "1");
        flamezone::metadata!(profiler, "quote", "she said \"hi\"");
        flamezone::metadata!(profiler, "first", "2");
        flamezone::metadata!(profiler, "path", "C:\\temp");
    }

    let trace = read(&path);
    assert_eq!(
        trace.metadata,
        vec![
            Metadata::new("first", "1"),
            Metadata::new("quote", "she said \"hi\""),
            Metadata::new("first", "2"),
            Metadata::new("path", "C:\\temp"),
        ]
    );

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains(r#""quote": "she said \"hi\"""#));
    assert_eq!(text.matches("\"first\"").count(), 2);
}

#[test]
fn test_oversized_name_is_truncated_in_output() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profiler.json");
    let name = "abcdefgh".repeat(20);
    let category = "c".repeat(100);

    {
        let registry = TraceRegistry::new(WriterConfig::new(&path));
        registry.zone_with_category(&name, &category).close();
    }

    let event = &read(&path).trace_events[0];
    assert_eq!(event.name, &name[..NAME_CAPACITY - 1]);
    assert_eq!(event.cat, &category[..flamezone::CATEGORY_CAPACITY - 1]);
}

#[test]
fn test_unwritable_output_is_skipped_silently() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("not-a-dir").join("profiler.json");

    {
        let profiler = flamezone::profiler!(WriterConfig::new(&path));
        flamezone::zone!(profiler, "work");
        flamezone::metadata!(profiler, "build", "debug");
    }

    assert!(!path.exists());
    // Nothing else was created either.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_existing_file_is_replaced_whole() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profiler.json");
    std::fs::write(&path, "stale contents that are longer than the new document").unwrap();

    {
        let registry = TraceRegistry::new(WriterConfig::new(&path).compact());
        registry.record_metadata("run", "2");
    }

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "{\"traceEvents\":[],\"run\":\"2\"}\n"
    );
}
