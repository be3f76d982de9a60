//! Inference throughput statistics.

use crate::lockfree::{AtomicDouble, Counter};
use std::time::Duration;

/// Statistics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolStatsSnapshot {
    pub frames_processed: u64,
    pub dropped_frames: u64,
    pub total_processing_micros: u64,
    pub tasks_executed: u64,
    pub average_processing_ms: f64,
    pub peak_processing_ms: f64,
    /// Average processing time as a percentage of the inference interval, capped at 100.
    pub cpu_usage_percent: f64,
}

/// Written by pool threads, read from anywhere.
#[derive(Debug, Default)]
pub(crate) struct PoolStats {
    frames_processed: Counter,
    dropped_frames: Counter,
    total_processing_micros: Counter,
    tasks_executed: Counter,
    peak_processing_ms: AtomicDouble,
}

impl PoolStats {
    pub fn record_frame(&self, elapsed: Duration) {
        self.frames_processed.increment();
        self.total_processing_micros.add(elapsed.as_micros() as u64);

        let ms = elapsed.as_secs_f64() * 1000.0;
        if ms > self.peak_processing_ms.get() {
            self.peak_processing_ms.set(ms);
        }
    }

    pub fn record_drop(&self) {
        self.dropped_frames.increment();
    }

    pub fn record_task(&self) {
        self.tasks_executed.increment();
    }

    pub fn snapshot(&self, interval_ms: u64) -> PoolStatsSnapshot {
        let frames_processed = self.frames_processed.get();
        let total_processing_micros = self.total_processing_micros.get();

        let average_processing_ms = if frames_processed > 0 {
            total_processing_micros as f64 / frames_processed as f64 / 1000.0
        } else {
            0.0
        };
        let cpu_usage_percent = if interval_ms > 0 {
            (average_processing_ms / interval_ms as f64 * 100.0).min(100.0)
        } else {
            0.0
        };

        PoolStatsSnapshot {
            frames_processed,
            dropped_frames: self.dropped_frames.get(),
            total_processing_micros,
            tasks_executed: self.tasks_executed.get(),
            average_processing_ms,
            peak_processing_ms: self.peak_processing_ms.get(),
            cpu_usage_percent,
        }
    }

    pub fn reset(&self) {
        self.frames_processed.reset();
        self.dropped_frames.reset();
        self.total_processing_micros.reset();
        self.tasks_executed.reset();
        self.peak_processing_ms.set(0.0);
    }
}
