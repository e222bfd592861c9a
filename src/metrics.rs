// src/metrics.rs

//! Timing and memory measurement for one child process.
//!
//! Memory is sampled by polling with `sysinfo`, so it is best-effort:
//! very short-lived spikes may be missed, and if the PID cannot be
//! inspected the peak is simply `None`.

use serde::Serialize;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

use sysinfo::{Pid, System};

/// Metrics collected for a single execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvocationMetrics {
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,

    /// Peak RSS in KB (best-effort).
    pub max_rss_kb: Option<u64>,
}

/// Tracks peak memory usage of a child process while it runs.
pub struct MemoryTracker {
    stop: Arc<AtomicBool>,
    peak_kb: Arc<AtomicU64>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MemoryTracker {
    /// Start sampling `pid` every `sample_every`.
    ///
    /// The sampler thread exits on its own once the process disappears.
    pub fn start(pid: u32, sample_every: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let peak_kb = Arc::new(AtomicU64::new(0));

        let stop_flag = Arc::clone(&stop);
        let peak = Arc::clone(&peak_kb);

        let handle = thread::spawn(move || {
            let pid = Pid::from_u32(pid);
            let mut system = System::new();

            while !stop_flag.load(Ordering::Relaxed) {
                if !system.refresh_process(pid) {
                    break;
                }
                match system.process(pid) {
                    // sysinfo reports bytes
                    Some(process) => {
                        peak.fetch_max(process.memory() / 1024, Ordering::Relaxed);
                    }
                    None => break,
                }
                thread::sleep(sample_every);
            }
        });

        Self {
            stop,
            peak_kb,
            handle: Some(handle),
        }
    }

    /// Stop sampling and return the peak RSS in KB, if any sample was taken.
    pub fn stop_and_take(mut self) -> Option<u64> {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }

        match self.peak_kb.load(Ordering::Relaxed) {
            0 => None,
            kb => Some(kb),
        }
    }

    /// Async form of [`stop_and_take`](Self::stop_and_take). Joining the
    /// sampler can block for one sample interval, so it runs on the
    /// blocking pool.
    pub async fn finish(self) -> Option<u64> {
        tokio::task::spawn_blocking(move || self.stop_and_take())
            .await
            .unwrap_or(None)
    }
}

impl Drop for MemoryTracker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
