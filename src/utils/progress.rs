use std::time::{Duration, Instant};

use crate::utils::fs_tree::mib;

const STEP_PERCENT: u64 = 5;
const MAX_SILENCE: Duration = Duration::from_secs(2);

/// Logs byte progress every 5% or every 2 seconds, whichever comes first.
pub struct ProgressReporter {
    label: &'static str,
    total: Option<u64>,
    done: u64,
    start: Instant,
    last_update: Instant,
    last_bucket: u64,
    updates: u32,
}

impl ProgressReporter {
    pub fn new(label: &'static str, total: Option<u64>) -> Self {
        let now = Instant::now();
        Self {
            label,
            total: total.filter(|t| *t > 0),
            done: 0,
            start: now,
            last_update: now,
            last_bucket: 0,
            updates: 0,
        }
    }

    pub fn advance(&mut self, bytes: u64) {
        self.done += bytes;
        let now = Instant::now();
        let percent = self.percent();
        let bucket = percent.unwrap_or(0) / STEP_PERCENT;

        if bucket > self.last_bucket || now.duration_since(self.last_update) >= MAX_SILENCE {
            self.last_bucket = bucket;
            self.last_update = now;
            self.updates += 1;
            self.log(percent);
        }
    }

    pub fn bytes(&self) -> u64 {
        self.done
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn updates(&self) -> u32 {
        self.updates
    }

    fn percent(&self) -> Option<u64> {
        self.total.map(|total| (self.done.saturating_mul(100) / total).min(100))
    }

    fn log(&self, percent: Option<u64>) {
        let elapsed = self.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 { mib(self.done) / elapsed } else { 0.0 };
        match (percent, self.total) {
            (Some(p), Some(total)) => tracing::info!(
                "  [{:3}] {}: {:3}% ({:7.1} / {:7.1} MB) - {:6.1} MB/s - {:5.1}s elapsed",
                self.updates,
                self.label,
                p,
                mib(self.done),
                mib(total),
                rate,
                elapsed
            ),
            _ => tracing::info!(
                "  [{:3}] {}: {:7.1} MB - {:6.1} MB/s - {:5.1}s elapsed",
                self.updates,
                self.label,
                mib(self.done),
                rate,
                elapsed
            ),
        }
    }
}
