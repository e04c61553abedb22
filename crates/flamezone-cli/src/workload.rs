//! Synthetic multi-threaded workload.
//!
//! Each worker opens one zone spanning its whole run and a nested zone per
//! step, so the resulting trace shows one lane per thread with a row of steps
//! under each worker.

use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::WorkloadConfig;

/// Parameters for one workload run.
#[derive(Debug, Clone)]
#[cfg_attr(not(feature = "profiler"), allow(dead_code))]
pub struct Workload {
    pub threads: usize,
    pub zones_per_thread: usize,
    pub zone_duration: Duration,
    pub category: String,
}

impl From<&WorkloadConfig> for Workload {
    fn from(config: &WorkloadConfig) -> Self {
        Self {
            threads: config.threads,
            zones_per_thread: config.zones_per_thread,
            zone_duration: Duration::from_millis(config.zone_duration_ms),
            category: config.category.clone(),
        }
    }
}

/// What a workload run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadReport {
    /// Zones opened across all workers, worker zones included.
    pub zones: usize,
    pub elapsed: Duration,
}

/// Run `workload` on scoped threads, instrumenting through `profiler`.
pub fn run(profiler: &flamezone::Profiler, workload: &Workload) -> WorkloadReport {
    let started = Instant::now();

    thread::scope(|s| {
        for worker in 0..workload.threads {
            s.spawn(move || run_worker(profiler, workload, worker));
        }
    });

    WorkloadReport {
        zones: workload.threads * (workload.zones_per_thread + 1),
        elapsed: started.elapsed(),
    }
}

fn run_worker(profiler: &flamezone::Profiler, workload: &Workload, worker: usize) {
    debug!(worker, steps = workload.zones_per_thread, "worker started");
    flamezone::zone!(profiler, &format!("worker-{worker}"), &workload.category);

    for step in 0..workload.zones_per_thread {
        tracing::trace!(worker, step, "step");
        flamezone::zone!(
            profiler,
            &format!("worker-{worker}/step-{step}"),
            &workload.category
        );
        if !workload.zone_duration.is_zero() {
            thread::sleep(workload.zone_duration);
        }
    }

    debug!(worker, "worker finished");
}
