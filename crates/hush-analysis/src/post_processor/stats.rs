//! Post-processor statistics.

use hush_core::{AtomicDouble, AtomicFlag, AtomicFloat, Counter};

/// Statistics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PostProcessorStatistics {
    pub frames_processed: u64,
    /// Announced hits (reached the minimum duration).
    pub total_hits: u64,
    /// Threshold episodes that ended before the minimum duration.
    pub false_positives: u64,
    /// Threshold crossings ignored during a debounce window.
    pub debounced_hits: u64,
    pub average_confidence: f64,
    pub average_smoothed_confidence: f64,
    pub peak_confidence: f32,
    pub current_hit_duration: u64,
    pub is_currently_hit: bool,
}

/// Written by the owning thread only.
#[derive(Debug, Default)]
pub(crate) struct PostProcessorStats {
    pub frames_processed: Counter,
    pub total_hits: Counter,
    pub false_positives: Counter,
    pub debounced_hits: Counter,
    pub average_confidence: AtomicDouble,
    pub average_smoothed_confidence: AtomicDouble,
    pub peak_confidence: AtomicFloat,
    pub current_hit_duration: Counter,
    pub is_currently_hit: AtomicFlag,
}

impl PostProcessorStats {
    pub fn snapshot(&self) -> PostProcessorStatistics {
        PostProcessorStatistics {
            frames_processed: self.frames_processed.get(),
            total_hits: self.total_hits.get(),
            false_positives: self.false_positives.get(),
            debounced_hits: self.debounced_hits.get(),
            average_confidence: self.average_confidence.get(),
            average_smoothed_confidence: self.average_smoothed_confidence.get(),
            peak_confidence: self.peak_confidence.get(),
            current_hit_duration: self.current_hit_duration.get(),
            is_currently_hit: self.is_currently_hit.get(),
        }
    }

    pub fn reset(&self) {
        self.frames_processed.reset();
        self.total_hits.reset();
        self.false_positives.reset();
        self.debounced_hits.reset();
        self.average_confidence.set(0.0);
        self.average_smoothed_confidence.set(0.0);
        self.peak_confidence.set(0.0);
        self.current_hit_duration.reset();
        self.is_currently_hit.set(false);
    }
}
