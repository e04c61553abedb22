//! Demo of flamezone simulating a small load -> parse -> render pipeline.
//!
//! Writes `demo_profiler.json`; open it in `chrome://tracing` or Perfetto.

use std::thread;
use std::time::Duration;

use flamezone::{FlameGraphWriter, TraceRegistry, WriterConfig};

fn load(registry: &TraceRegistry, file: &str) {
    let _zone = registry.zone_with_category(&format!("load {file}"), "io");
    thread::sleep(Duration::from_millis(4));
}

fn parse(registry: &TraceRegistry, file: &str) {
    let _zone = registry.zone_with_category(&format!("parse {file}"), "cpu");
    for pass in 0..3 {
        let _pass = registry.zone_with_category(&format!("pass {pass}"), "cpu");
        thread::sleep(Duration::from_millis(1));
    }
}

fn render(registry: &TraceRegistry) {
    let _zone = registry.zone_with_category("render", "gpu");
    thread::sleep(Duration::from_millis(6));
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = TraceRegistry::new(WriterConfig::new("demo_profiler.json"));
    registry.record_metadata("demo", "pipeline");

    thread::scope(|s| {
        for file in ["a.txt", "b.txt", "c.txt"] {
            let registry = &registry;
            s.spawn(move || {
                load(registry, file);
                parse(registry, file);
            });
        }
    });
    render(&registry);

    let summary = registry.flush()?;
    println!("Spans: {}", summary.spans);

    if let Some(path) = summary.path {
        let trace = FlameGraphWriter::read_trace(&path)?;
        for event in &trace.trace_events {
            println!(
                "{:>8}us {:>8}us  tid={:<10} [{}] {}",
                event.ts, event.dur, event.tid, event.cat, event.name
            );
        }
        println!("\n--- Trace written to {} ---", path.display());
    }

    Ok(())
}
