//! Confidence smoothing and hit detection.
//!
//! Each inference frame yields one raw confidence. The post-processor median-filters
//! the stream, then runs a small state machine over the smoothed value:
//!
//! 1. **Idle**: waiting for the threshold (or the hysteresis high level).
//! 2. **Candidate**: threshold met; frames are counted and the peak tracked, nothing
//!    is announced yet. Losing the threshold here is a false positive.
//! 3. **Hit**: the count reached `min_hit_duration`; `hit = true` has been announced.
//!    Losing the threshold (or the hysteresis low level) announces `hit = false`.
//!    Exceeding `max_hit_duration` forces the same.
//! 4. **Debounce**: after a hit ends, crossings are ignored for `debounce_frames`
//!    frames. Each run of consecutive ignored frames counts as one debounced hit.
//!
//! The processor is driven by one thread. Everything other threads might want to
//! read (hit flag, smoothed confidence, statistics, last event) is published
//! lock-free through [`PostProcessorMonitor`].

mod config;
mod event;
mod median;
mod stats;

pub use config::PostProcessorConfig;
pub use event::HitEvent;
pub use stats::PostProcessorStatistics;

use arc_swap::ArcSwap;
use hush_core::{AtomicFlag, AtomicFloat};
use median::MedianWindow;
use stats::PostProcessorStats;
use std::sync::Arc;
use std::time::Instant;

/// Called with `(hit, event)` on every announced transition.
pub type HitCallback = Box<dyn FnMut(bool, &HitEvent) + Send>;

struct Shared {
    has_hit: AtomicFlag,
    enabled: AtomicFlag,
    smoothed_confidence: AtomicFloat,
    last_event: ArcSwap<HitEvent>,
    stats: PostProcessorStats,
}

/// Cloneable read-only view of a [`PostProcessor`] for other threads.
#[derive(Clone)]
pub struct PostProcessorMonitor {
    shared: Arc<Shared>,
}

impl PostProcessorMonitor {
    pub fn has_hit(&self) -> bool {
        self.shared.has_hit.get()
    }

    pub fn smoothed_confidence(&self) -> f32 {
        self.shared.smoothed_confidence.get()
    }

    pub fn last_hit_event(&self) -> HitEvent {
        **self.shared.last_event.load()
    }

    pub fn statistics(&self) -> PostProcessorStatistics {
        self.shared.stats.snapshot()
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.get()
    }

    /// Bypass toggle; takes effect on the next processed frame.
    pub fn set_enabled(&self, enabled: bool) {
        self.shared.enabled.set(enabled);
    }
}

/// Median filter plus hit-detection state machine.
pub struct PostProcessor {
    config: PostProcessorConfig,
    window: MedianWindow,

    in_hit: bool,
    announced: bool,
    hit_frames: u32,
    peak_in_hit: f32,
    hit_start_frame: u64,
    hit_started_at: Option<Instant>,
    debounce_remaining: u32,
    /// The previous frame was a crossing swallowed by the debounce window.
    suppressing: bool,
    last_event: HitEvent,

    frame_index: u64,
    confidence_sum: f64,
    smoothed_sum: f64,

    callback: Option<HitCallback>,
    shared: Arc<Shared>,
}

impl PostProcessor {
    pub fn new(config: PostProcessorConfig) -> Self {
        let config = config.validated();
        tracing::info!(
            "Post-processor: median {}, threshold {}, hysteresis {}, min/max {}/{} frames, debounce {}",
            config.median_filter_size,
            config.threshold,
            if config.enable_hysteresis {
                format!("{}..{}", config.hysteresis_low, config.hysteresis_high)
            } else {
                "off".to_string()
            },
            config.min_hit_duration,
            config.max_hit_duration,
            if config.enable_debounce {
                format!("{} frames", config.debounce_frames)
            } else {
                "off".to_string()
            },
        );

        Self {
            window: MedianWindow::new(config.median_filter_size),
            config,
            in_hit: false,
            announced: false,
            hit_frames: 0,
            peak_in_hit: 0.0,
            hit_start_frame: 0,
            hit_started_at: None,
            debounce_remaining: 0,
            suppressing: false,
            last_event: HitEvent::default(),
            frame_index: 0,
            confidence_sum: 0.0,
            smoothed_sum: 0.0,
            callback: None,
            shared: Arc::new(Shared {
                has_hit: AtomicFlag::new(false),
                enabled: AtomicFlag::new(true),
                smoothed_confidence: AtomicFloat::new(0.0),
                last_event: ArcSwap::from_pointee(HitEvent::default()),
                stats: PostProcessorStats::default(),
            }),
        }
    }

    /// Processor with the given threshold and median size, other settings default.
    pub fn with_threshold(threshold: f32, median_filter_size: usize) -> Self {
        Self::new(PostProcessorConfig {
            threshold,
            median_filter_size,
            ..PostProcessorConfig::default()
        })
    }

    pub fn config(&self) -> &PostProcessorConfig {
        &self.config
    }

    pub fn monitor(&self) -> PostProcessorMonitor {
        PostProcessorMonitor {
            shared: self.shared.clone(),
        }
    }

    pub fn set_hit_callback<F>(&mut self, callback: F)
    where
        F: FnMut(bool, &HitEvent) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    pub fn clear_hit_callback(&mut self) {
        self.callback = None;
    }

    /// Whether a hit is currently announced.
    pub fn has_hit(&self) -> bool {
        self.shared.has_hit.get()
    }

    pub fn smoothed_confidence(&self) -> f32 {
        self.shared.smoothed_confidence.get()
    }

    pub fn last_hit_event(&self) -> HitEvent {
        self.last_event
    }

    pub fn statistics(&self) -> PostProcessorStatistics {
        self.shared.stats.snapshot()
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.get()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.shared.enabled.set(enabled);
    }

    /// Median window contents, oldest first.
    pub fn filter_history(&self) -> Vec<f32> {
        self.window.history()
    }

    /// Feed one raw confidence and return the smoothed value.
    ///
    /// Input is clamped to [0, 1] (NaN counts as 0). While disabled the raw value is
    /// returned untouched and no state changes.
    pub fn process_confidence(&mut self, confidence: f32) -> f32 {
        if !self.shared.enabled.get() {
            return confidence;
        }

        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        self.window.push(confidence);
        let smoothed = self.window.median();
        self.shared.smoothed_confidence.set(smoothed);

        self.update_hit_state(smoothed);
        self.update_statistics(confidence, smoothed);
        self.frame_index += 1;

        smoothed
    }

    fn update_hit_state(&mut self, smoothed: f32) {
        let met = self.config.threshold_met(smoothed, self.in_hit);
        let stats = &self.shared.stats;

        if self.config.enable_debounce && self.debounce_remaining > 0 {
            self.debounce_remaining -= 1;
            if met {
                if !self.suppressing {
                    stats.debounced_hits.increment();
                }
                self.suppressing = true;
                return;
            }
        }
        self.suppressing = false;

        match (met, self.in_hit) {
            (true, false) => {
                self.in_hit = true;
                self.hit_frames = 1;
                self.peak_in_hit = smoothed;
                self.hit_start_frame = self.frame_index;
                self.hit_started_at = Some(Instant::now());
                if self.hit_frames >= self.config.min_hit_duration {
                    self.announce(true, smoothed);
                }
            }
            (true, true) => {
                self.hit_frames += 1;
                self.peak_in_hit = self.peak_in_hit.max(smoothed);
                if !self.announced && self.hit_frames >= self.config.min_hit_duration {
                    self.announce(true, smoothed);
                }
                if self.hit_frames > self.config.max_hit_duration {
                    tracing::debug!(
                        "Hit exceeded {} frames, forcing end",
                        self.config.max_hit_duration
                    );
                    self.end_hit(smoothed);
                }
            }
            (false, true) => {
                if self.hit_frames < self.config.min_hit_duration {
                    stats.false_positives.increment();
                }
                self.end_hit(smoothed);
            }
            (false, false) => {}
        }

        let stats = &self.shared.stats;
        stats
            .current_hit_duration
            .set(if self.in_hit { self.hit_frames as u64 } else { 0 });
        stats.is_currently_hit.set(self.in_hit);
    }

    fn end_hit(&mut self, smoothed: f32) {
        if self.announced {
            self.announce(false, smoothed);
        }
        self.in_hit = false;
        self.debounce_remaining = if self.config.enable_debounce {
            self.config.debounce_frames
        } else {
            0
        };
    }

    fn announce(&mut self, hit: bool, smoothed: f32) {
        self.announced = hit;
        self.shared.has_hit.set(hit);

        if hit {
            self.last_event = HitEvent {
                peak_confidence: self.peak_in_hit,
                smoothed_confidence: smoothed,
                duration_frames: self.hit_frames,
                start_frame: self.hit_start_frame,
                timestamp: self.hit_started_at,
                is_active: true,
            };
            self.shared.stats.total_hits.increment();
        } else {
            self.last_event.peak_confidence = self.peak_in_hit;
            self.last_event.smoothed_confidence = smoothed;
            self.last_event.duration_frames = self.hit_frames;
            self.last_event.is_active = false;
        }
        self.shared.last_event.store(Arc::new(self.last_event));

        tracing::debug!(
            "Hit {} (confidence {:.3}, {} frames)",
            if hit { "started" } else { "ended" },
            smoothed,
            self.hit_frames
        );

        if let Some(callback) = self.callback.as_mut() {
            callback(hit, &self.last_event);
        }
    }

    fn update_statistics(&mut self, confidence: f32, smoothed: f32) {
        let stats = &self.shared.stats;
        self.confidence_sum += confidence as f64;
        self.smoothed_sum += smoothed as f64;

        stats.frames_processed.increment();
        let count = stats.frames_processed.get() as f64;
        stats.average_confidence.set(self.confidence_sum / count);
        stats.average_smoothed_confidence.set(self.smoothed_sum / count);
        stats.peak_confidence.raise_to(confidence);
    }

    /// Clear history, hit state and statistics.
    ///
    /// If a hit was announced, the callback receives a final `hit = false`.
    pub fn reset(&mut self) {
        self.window.clear();
        let was_announced = self.announced;

        self.in_hit = false;
        self.hit_frames = 0;
        self.peak_in_hit = 0.0;
        self.debounce_remaining = 0;
        self.suppressing = false;
        self.frame_index = 0;
        self.confidence_sum = 0.0;
        self.smoothed_sum = 0.0;

        if was_announced {
            self.announce(false, 0.0);
        }
        self.announced = false;
        self.shared.has_hit.set(false);
        self.shared.smoothed_confidence.set(0.0);
        self.shared.stats.reset();
        tracing::debug!("Post-processor reset");
    }

    /// Apply a new configuration. The median history is discarded if its size changes.
    pub fn update_config(&mut self, config: PostProcessorConfig) {
        self.config = config.validated();
        if self.window.size() != self.config.median_filter_size {
            self.window.resize(self.config.median_filter_size);
        }
        tracing::debug!("Post-processor configuration updated");
    }
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new(PostProcessorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use parking_lot::Mutex;

    type Transitions = Arc<Mutex<Vec<(bool, HitEvent)>>>;

    fn recording(config: PostProcessorConfig) -> (PostProcessor, Transitions) {
        let mut processor = PostProcessor::new(config);
        let transitions: Transitions = Arc::default();
        let sink = transitions.clone();
        processor.set_hit_callback(move |hit, event| sink.lock().push((hit, *event)));
        (processor, transitions)
    }

    fn states(transitions: &Transitions) -> Vec<bool> {
        transitions.lock().iter().map(|(hit, _)| *hit).collect()
    }

    const SIMPLE_HIT: [f32; 11] = [0.1, 0.2, 0.3, 0.7, 0.8, 0.9, 0.8, 0.7, 0.3, 0.2, 0.1];

    #[test]
    fn test_simple_hit_fires_once_each_way() {
        let (mut processor, transitions) = recording(PostProcessorConfig {
            median_filter_size: 5,
            threshold: 0.6,
            min_hit_duration: 3,
            ..Default::default()
        });

        let mut hit_frames = Vec::new();
        for (frame, &confidence) in SIMPLE_HIT.iter().enumerate() {
            processor.process_confidence(confidence);
            if processor.has_hit() {
                hit_frames.push(frame);
            }
        }

        assert_eq!(states(&transitions), vec![true, false]);
        assert_eq!(hit_frames, vec![7, 8, 9]);
        assert!(!processor.has_hit());

        let events = transitions.lock();
        let (_, start) = events[0];
        assert!(start.is_active);
        assert_eq!(start.duration_frames, 3);
        assert_eq!(start.start_frame, 5);
        assert_relative_eq!(start.peak_confidence, 0.8);
        let (_, end) = events[1];
        assert!(!end.is_active);
        assert_eq!(end.duration_frames, 5);

        let stats = processor.statistics();
        assert_eq!(stats.total_hits, 1);
        assert_eq!(stats.false_positives, 0);
        assert_eq!(stats.frames_processed, 11);
    }

    #[test]
    fn test_single_frame_spike_is_false_positive() {
        let (mut processor, transitions) = recording(PostProcessorConfig {
            median_filter_size: 5,
            threshold: 0.6,
            min_hit_duration: 3,
            ..Default::default()
        });

        for confidence in [0.1, 0.2, 0.9, 0.1, 0.2, 0.1] {
            processor.process_confidence(confidence);
            assert!(!processor.has_hit());
        }

        assert!(transitions.lock().is_empty());
        let stats = processor.statistics();
        assert_eq!(stats.false_positives, 1);
        assert_eq!(stats.total_hits, 0);
        assert_relative_eq!(stats.peak_confidence, 0.9);
    }

    #[test]
    fn test_hysteresis_holds_hit_above_low_level() {
        let sequence = [
            0.1, 0.1, 0.1, 0.8, 0.8, 0.8, 0.6, 0.6, 0.55, 0.55, 0.6, 0.3, 0.3, 0.3,
        ];
        let base = PostProcessorConfig {
            median_filter_size: 3,
            threshold: 0.7,
            min_hit_duration: 2,
            enable_debounce: false,
            ..Default::default()
        };

        let (mut with_hysteresis, _) = recording(PostProcessorConfig {
            enable_hysteresis: true,
            hysteresis_high: 0.7,
            hysteresis_low: 0.5,
            ..base
        });
        let (mut plain, _) = recording(base);

        let mut held = Vec::new();
        let mut dropped = Vec::new();
        for &confidence in &sequence {
            with_hysteresis.process_confidence(confidence);
            plain.process_confidence(confidence);
            held.push(with_hysteresis.has_hit());
            dropped.push(plain.has_hit());
        }

        // Smoothed values 0.6 and 0.55 keep the hysteresis hit alive until 0.3 at frame 12.
        let expected_held: Vec<bool> = (0..sequence.len()).map(|f| (5..12).contains(&f)).collect();
        let expected_plain: Vec<bool> = (0..sequence.len()).map(|f| (5..7).contains(&f)).collect();
        assert_eq!(held, expected_held);
        assert_eq!(dropped, expected_plain);
    }

    #[test]
    fn test_debounce_suppresses_quick_retrigger() {
        let sequence = [
            0.1, 0.1, 0.1, 0.9, 0.9, 0.9, 0.1, 0.1, 0.9, 0.9, 0.9, 0.9, 0.1, 0.1, 0.1, 0.1, 0.1,
            0.9, 0.9, 0.9, 0.9,
        ];
        let base = PostProcessorConfig {
            median_filter_size: 3,
            threshold: 0.6,
            min_hit_duration: 2,
            enable_debounce: true,
            debounce_frames: 3,
            ..Default::default()
        };

        let (mut debounced, transitions) = recording(base);
        let mut starts = Vec::new();
        for (frame, &confidence) in sequence.iter().enumerate() {
            let before = debounced.has_hit();
            debounced.process_confidence(confidence);
            if !before && debounced.has_hit() {
                starts.push(frame);
            }
        }
        // The second episode is held off until the debounce window (frames 8-10) passes.
        assert_eq!(starts, vec![5, 12, 19]);
        // Frames 9 and 10 are one suppressed crossing.
        assert_eq!(debounced.statistics().debounced_hits, 1);
        assert_eq!(states(&transitions), vec![true, false, true, false, true]);

        let (mut undamped, _) = recording(PostProcessorConfig {
            enable_debounce: false,
            ..base
        });
        let mut starts = Vec::new();
        for (frame, &confidence) in sequence.iter().enumerate() {
            let before = undamped.has_hit();
            undamped.process_confidence(confidence);
            if !before && undamped.has_hit() {
                starts.push(frame);
            }
        }
        assert_eq!(starts, vec![5, 10, 19]);
    }

    #[test]
    fn test_debounce_counts_each_suppressed_crossing_once() {
        let mut processor = PostProcessor::new(PostProcessorConfig {
            median_filter_size: 3,
            threshold: 0.6,
            min_hit_duration: 2,
            enable_debounce: true,
            debounce_frames: 10,
            ..Default::default()
        });

        let mut sequence = vec![0.9; 4];
        for level in [0.1, 0.9, 0.1, 0.9, 0.1] {
            sequence.extend_from_slice(&[level, level]);
        }
        for confidence in sequence {
            processor.process_confidence(confidence);
        }

        let stats = processor.statistics();
        assert_eq!(stats.total_hits, 1);
        assert_eq!(stats.debounced_hits, 2);
    }

    #[test]
    fn test_max_duration_forces_end() {
        let (mut processor, transitions) = recording(PostProcessorConfig {
            median_filter_size: 3,
            threshold: 0.6,
            min_hit_duration: 2,
            max_hit_duration: 5,
            enable_debounce: true,
            debounce_frames: 2,
            ..Default::default()
        });

        let mut sequence = vec![0.9; 12];
        sequence.extend_from_slice(&[0.1, 0.1, 0.1]);
        for confidence in sequence {
            processor.process_confidence(confidence);
        }

        let events = transitions.lock();
        assert_eq!(
            events.iter().map(|(hit, _)| *hit).collect::<Vec<_>>(),
            vec![true, false, true, false]
        );
        // Forced end after exceeding five frames.
        assert_eq!(events[1].1.duration_frames, 6);
        assert_eq!(processor.statistics().debounced_hits, 1);
        assert_eq!(processor.statistics().total_hits, 2);
    }

    #[test]
    fn test_min_duration_one_announces_immediately() {
        let (mut processor, transitions) = recording(PostProcessorConfig {
            median_filter_size: 3,
            min_hit_duration: 1,
            enable_debounce: false,
            ..Default::default()
        });
        processor.process_confidence(0.9);
        assert!(processor.has_hit());
        processor.process_confidence(0.1);
        assert!(!processor.has_hit());
        assert_eq!(states(&transitions), vec![true, false]);
    }

    #[test]
    fn test_disabled_passes_through() {
        let (mut processor, transitions) = recording(PostProcessorConfig::fast());
        processor.set_enabled(false);
        assert_eq!(processor.process_confidence(0.95), 0.95);
        assert_eq!(processor.process_confidence(1.7), 1.7);
        assert!(!processor.has_hit());
        assert!(transitions.lock().is_empty());
        assert_eq!(processor.statistics().frames_processed, 0);

        processor.monitor().set_enabled(true);
        assert!(processor.is_enabled());
        assert_eq!(processor.process_confidence(1.7), 1.0);
    }

    #[test]
    fn test_reset_ends_active_hit() {
        let (mut processor, transitions) = recording(PostProcessorConfig::fast());
        processor.process_confidence(0.9);
        assert!(processor.has_hit());

        processor.reset();
        assert!(!processor.has_hit());
        assert_eq!(states(&transitions), vec![true, false]);
        assert_eq!(processor.statistics(), PostProcessorStatistics::default());
        assert!(processor.filter_history().is_empty());
        assert_eq!(processor.smoothed_confidence(), 0.0);

        // A reset with nothing announced stays silent.
        processor.reset();
        assert_eq!(transitions.lock().len(), 2);
    }

    #[test]
    fn test_update_config_resizes_history() {
        let mut processor = PostProcessor::default();
        for confidence in [0.1, 0.2, 0.3] {
            processor.process_confidence(confidence);
        }
        assert_eq!(processor.filter_history(), vec![0.1, 0.2, 0.3]);

        processor.update_config(PostProcessorConfig {
            median_filter_size: 5,
            threshold: 0.4,
            ..Default::default()
        });
        assert_eq!(processor.filter_history().len(), 3);
        assert_eq!(processor.config().threshold, 0.4);

        processor.update_config(PostProcessorConfig {
            median_filter_size: 8,
            ..Default::default()
        });
        assert_eq!(processor.config().median_filter_size, 9);
        assert!(processor.filter_history().is_empty());
    }

    #[test]
    fn test_monitor_sees_state_from_another_thread() {
        let mut processor = PostProcessor::new(PostProcessorConfig::fast());
        let monitor = processor.monitor();

        processor.process_confidence(0.9);
        let observed = std::thread::spawn(move || {
            (
                monitor.has_hit(),
                monitor.smoothed_confidence(),
                monitor.last_hit_event().is_active,
                monitor.statistics().total_hits,
            )
        })
        .join()
        .unwrap();

        assert_eq!(observed, (true, 0.9, true, 1));
    }

    #[test]
    fn test_running_averages() {
        let mut processor = PostProcessor::new(PostProcessorConfig::fast());
        for confidence in [0.2, 0.4, 0.6] {
            processor.process_confidence(confidence);
        }
        let stats = processor.statistics();
        assert_relative_eq!(stats.average_confidence, 0.4, epsilon = 1e-6);
        assert_relative_eq!(stats.peak_confidence, 0.6);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn transitions_alternate_and_stay_in_range(
                input in prop::collection::vec(-0.5f32..1.5, 1..400),
                size in 3usize..9,
                min in 1u32..5,
                debounce in 0u32..4,
                hysteresis in any::<bool>(),
            ) {
                let (mut processor, transitions) = recording(PostProcessorConfig {
                    median_filter_size: size,
                    min_hit_duration: min,
                    max_hit_duration: 40,
                    enable_debounce: debounce > 0,
                    debounce_frames: debounce,
                    enable_hysteresis: hysteresis,
                    ..Default::default()
                });

                for &confidence in &input {
                    let smoothed = processor.process_confidence(confidence);
                    prop_assert!((0.0..=1.0).contains(&smoothed));
                }

                let states = states(&transitions);
                for (i, hit) in states.iter().enumerate() {
                    prop_assert_eq!(*hit, i % 2 == 0);
                }
                prop_assert_eq!(processor.has_hit(), states.len() % 2 == 1);
                prop_assert_eq!(processor.statistics().total_hits as usize, states.len().div_ceil(2));
            }
        }
    }
}
