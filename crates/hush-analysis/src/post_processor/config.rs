//! Post-processor configuration, validation and presets.

use serde::{Deserialize, Serialize};

/// Post-processor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessorConfig {
    /// Median window length (odd, at least 3).
    pub median_filter_size: usize,
    /// Single detection threshold, also the source of derived hysteresis levels.
    pub threshold: f32,
    pub enable_hysteresis: bool,
    /// Level a hit must stay at or above once started. 0 with `hysteresis_high == 0`
    /// means "derive from `threshold`".
    pub hysteresis_low: f32,
    /// Level required to start a hit.
    pub hysteresis_high: f32,
    /// Frames above threshold before a hit is announced.
    pub min_hit_duration: u32,
    /// Frames after which an ongoing hit is forced to end.
    pub max_hit_duration: u32,
    pub enable_debounce: bool,
    /// Frames after a hit ends during which new crossings are ignored.
    pub debounce_frames: u32,
}

impl Default for PostProcessorConfig {
    fn default() -> Self {
        Self {
            median_filter_size: 5,
            threshold: 0.6,
            enable_hysteresis: false,
            hysteresis_low: 0.0,
            hysteresis_high: 0.0,
            min_hit_duration: 3,
            max_hit_duration: 100,
            enable_debounce: true,
            debounce_frames: 2,
        }
    }
}

impl PostProcessorConfig {
    /// Small window, low threshold, accepts one-frame hits.
    pub fn sensitive() -> Self {
        Self {
            median_filter_size: 3,
            threshold: 0.5,
            enable_hysteresis: true,
            hysteresis_low: 0.4,
            hysteresis_high: 0.5,
            min_hit_duration: 1,
            max_hit_duration: 50,
            enable_debounce: false,
            debounce_frames: 0,
        }
    }

    /// Wide window, strong hysteresis and debounce, sustained hits only.
    pub fn robust() -> Self {
        Self {
            median_filter_size: 7,
            threshold: 0.7,
            enable_hysteresis: true,
            hysteresis_low: 0.6,
            hysteresis_high: 0.7,
            min_hit_duration: 5,
            max_hit_duration: 200,
            enable_debounce: true,
            debounce_frames: 5,
        }
    }

    /// Minimal filtering for the lowest latency.
    pub fn fast() -> Self {
        Self {
            median_filter_size: 3,
            threshold: 0.6,
            enable_hysteresis: false,
            hysteresis_low: 0.0,
            hysteresis_high: 0.0,
            min_hit_duration: 1,
            max_hit_duration: 100,
            enable_debounce: false,
            debounce_frames: 0,
        }
    }

    /// Copy with every field forced into its valid range.
    ///
    /// Invalid values are corrected rather than rejected; each correction is logged.
    pub fn validated(&self) -> Self {
        let mut config = *self;

        if config.median_filter_size < 3 {
            tracing::warn!(
                "Median filter size {} too small, using 3",
                config.median_filter_size
            );
            config.median_filter_size = 3;
        }
        if config.median_filter_size % 2 == 0 {
            config.median_filter_size += 1;
            tracing::warn!(
                "Median filter size must be odd, using {}",
                config.median_filter_size
            );
        }

        config.threshold = clamp_unit(config.threshold, 0.6);
        config.hysteresis_low = clamp_unit(config.hysteresis_low, 0.0);
        config.hysteresis_high = clamp_unit(config.hysteresis_high, 0.0);

        if config.enable_hysteresis {
            if config.hysteresis_low > config.hysteresis_high {
                std::mem::swap(&mut config.hysteresis_low, &mut config.hysteresis_high);
            }
            if config.hysteresis_low == 0.0 && config.hysteresis_high == 0.0 {
                config.hysteresis_high = config.threshold;
                config.hysteresis_low = config.threshold * 0.8;
            }
        }

        // Leaves room for a max duration strictly above it.
        config.min_hit_duration = config.min_hit_duration.clamp(1, u32::MAX - 1);
        if config.max_hit_duration <= config.min_hit_duration {
            tracing::warn!(
                "Max hit duration {} not above min {}, using {}",
                config.max_hit_duration,
                config.min_hit_duration,
                config.min_hit_duration + 1
            );
            config.max_hit_duration = config.min_hit_duration + 1;
        }

        config
    }

    /// Whether `confidence` meets the level for the current state.
    #[inline]
    pub(crate) fn threshold_met(&self, confidence: f32, in_hit: bool) -> bool {
        if !self.enable_hysteresis {
            confidence >= self.threshold
        } else if in_hit {
            confidence >= self.hysteresis_low
        } else {
            confidence >= self.hysteresis_high
        }
    }
}

fn clamp_unit(value: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}
