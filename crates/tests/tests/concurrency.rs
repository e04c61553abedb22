//! Concurrency tests
//!
//! Many threads opening and closing zones against one registry must neither
//! lose nor duplicate spans.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use flamezone::{FlameGraphWriter, TraceRegistry, WriterConfig};
use tempfile::tempdir;

const THREADS: usize = 8;
const ZONES: usize = 200;

#[test]
fn test_n_threads_m_zones_all_recorded() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profiler.json");
    let registry = TraceRegistry::new(WriterConfig::new(&path).compact());
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for t in 0..THREADS {
            let registry = &registry;
            let barrier = &barrier;
            s.spawn(move || {
                barrier.wait();
                for z in 0..ZONES {
                    flamezone::zone!(registry, &format!("span-{t}-{z}"), "stress");
                }
            });
        }
    });
    drop(registry);

    let trace = FlameGraphWriter::read_trace(&path).unwrap();
    assert_eq!(trace.trace_events.len(), THREADS * ZONES);

    let names: HashSet<_> = trace.trace_events.iter().map(|e| e.name.clone()).collect();
    assert_eq!(names.len(), THREADS * ZONES);
    for t in 0..THREADS {
        for z in 0..ZONES {
            assert!(names.contains(&format!("span-{t}-{z}")));
        }
    }

    // Every thread shows up as its own lane.
    let tids: HashSet<_> = trace.trace_events.iter().map(|e| e.tid).collect();
    assert_eq!(tids.len(), THREADS);
}

#[test]
fn test_per_thread_spans_keep_completion_order() {
    let registry = TraceRegistry::new(WriterConfig::disabled());

    thread::scope(|s| {
        for t in 0..4 {
            let registry = &registry;
            s.spawn(move || {
                for z in 0..50 {
                    registry.zone(&format!("{t}:{z}")).close();
                }
            });
        }
    });

    let (points, _) = registry.snapshot();
    for t in 0..4 {
        let prefix = format!("{t}:");
        let order: Vec<usize> = points
            .iter()
            .filter_map(|p| p.name.as_str().strip_prefix(&prefix))
            .map(|z| z.parse().unwrap())
            .collect();
        assert_eq!(order, (0..50).collect::<Vec<_>>());
    }
    assert!(points.iter().all(|p| p.time_end >= p.time_start));
}

#[test]
fn test_shared_through_arc_with_metadata() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profiler.json");
    let registry = Arc::new(TraceRegistry::new(WriterConfig::new(&path)));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let _zone = registry.zone_with_category("worker", "threads");
                registry.record_metadata(format!("worker-{t}"), "done");
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // All clones are gone once the threads are joined.
    let registry = Arc::try_unwrap(registry).unwrap();
    let summary = registry.flush().unwrap();
    assert_eq!(summary.spans, 4);
    assert_eq!(summary.metadata, 4);

    let trace = FlameGraphWriter::read_trace(&path).unwrap();
    let titles: HashSet<_> = trace.metadata.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles.len(), 4);
    assert!(trace.trace_events.iter().all(|e| e.cat == "threads"));
}
