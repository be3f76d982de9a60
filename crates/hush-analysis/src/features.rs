//! Deterministic feature heuristic standing in for a trained model.
//!
//! Three features are measured per frame and each one inside its band adds a fixed
//! weight to the confidence:
//!
//! | Feature | Band | Weight |
//! |---|---|---|
//! | RMS energy | 0.01 – 0.3 | 0.3 |
//! | Zero-crossing rate | 0.02 – 0.2 | 0.3 |
//! | Spectral centroid (fraction of Nyquist) | 0.02 – 0.5 | 0.2 |
//!
//! Useful for wiring tests and demos; it is not a detector anyone should ship.

use hush_core::{InferenceEngine, InferenceError, InferenceResult};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Instant;

/// Bands and weights of the heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureHeuristicConfig {
    pub rms_band: (f32, f32),
    pub rms_weight: f32,
    pub zcr_band: (f32, f32),
    pub zcr_weight: f32,
    pub centroid_band: (f32, f32),
    pub centroid_weight: f32,
}

impl Default for FeatureHeuristicConfig {
    fn default() -> Self {
        Self {
            rms_band: (0.01, 0.3),
            rms_weight: 0.3,
            zcr_band: (0.02, 0.2),
            zcr_weight: 0.3,
            centroid_band: (0.02, 0.5),
            centroid_weight: 0.2,
        }
    }
}

/// Measured features of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameFeatures {
    pub rms: f32,
    /// Sign changes per adjacent sample pair.
    pub zero_crossing_rate: f32,
    /// Magnitude-weighted mean frequency as a fraction of Nyquist.
    pub spectral_centroid: f32,
}

/// Root mean square of a frame (0 for an empty frame).
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f32 = frame.iter().map(|s| s * s).sum();
    (sum / frame.len() as f32).sqrt()
}

/// Sign changes divided by `len - 1`.
pub fn zero_crossing_rate(frame: &[f32]) -> f32 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    crossings as f32 / (frame.len() - 1) as f32
}

/// Feature-heuristic [`InferenceEngine`].
pub struct FeatureHeuristicEngine {
    config: FeatureHeuristicConfig,
    planner: FftPlanner<f32>,
    // Plan and buffers for the last frame length seen.
    fft: Option<Arc<dyn Fft<f32>>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    last_features: FrameFeatures,
}

impl FeatureHeuristicEngine {
    pub fn new() -> Self {
        Self::with_config(FeatureHeuristicConfig::default())
    }

    pub fn with_config(config: FeatureHeuristicConfig) -> Self {
        Self {
            config,
            planner: FftPlanner::new(),
            fft: None,
            window: Vec::new(),
            buffer: Vec::new(),
            last_features: FrameFeatures::default(),
        }
    }

    pub fn config(&self) -> &FeatureHeuristicConfig {
        &self.config
    }

    /// Features of the most recent frame.
    pub fn last_features(&self) -> FrameFeatures {
        self.last_features
    }

    /// Measure all features of `frame`.
    pub fn features(&mut self, frame: &[f32]) -> FrameFeatures {
        FrameFeatures {
            rms: rms(frame),
            zero_crossing_rate: zero_crossing_rate(frame),
            spectral_centroid: self.spectral_centroid(frame),
        }
    }

    /// Confidence for a set of features.
    pub fn score(&self, features: &FrameFeatures) -> f32 {
        let in_band = |value: f32, (low, high): (f32, f32)| -> bool {
            RangeInclusive::new(low, high).contains(&value)
        };

        let mut confidence = 0.0;
        if in_band(features.rms, self.config.rms_band) {
            confidence += self.config.rms_weight;
        }
        if in_band(features.zero_crossing_rate, self.config.zcr_band) {
            confidence += self.config.zcr_weight;
        }
        if in_band(features.spectral_centroid, self.config.centroid_band) {
            confidence += self.config.centroid_weight;
        }
        confidence.clamp(0.0, 1.0)
    }

    fn spectral_centroid(&mut self, frame: &[f32]) -> f32 {
        let n = frame.len();
        if n < 2 {
            return 0.0;
        }
        if self.window.len() != n {
            self.prepare(n);
        }
        let Some(fft) = self.fft.as_ref() else {
            return 0.0;
        };

        for ((slot, &sample), &w) in self.buffer.iter_mut().zip(frame).zip(&self.window) {
            *slot = Complex::new(sample * w, 0.0);
        }
        fft.process(&mut self.buffer);

        let half = n / 2;
        let mut weighted = 0.0f64;
        let mut total = 0.0f64;
        for (bin, value) in self.buffer[..=half].iter().enumerate() {
            let magnitude = value.norm() as f64;
            weighted += bin as f64 * magnitude;
            total += magnitude;
        }

        if total <= f64::EPSILON {
            0.0
        } else {
            (weighted / total / half as f64) as f32
        }
    }

    fn prepare(&mut self, n: usize) {
        self.fft = Some(self.planner.plan_fft_forward(n));
        self.window = (0..n)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (n - 1) as f32).cos())
            })
            .collect();
        self.buffer = vec![Complex::new(0.0, 0.0); n];
    }
}

impl Default for FeatureHeuristicEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceEngine for FeatureHeuristicEngine {
    fn infer(&mut self, frame: &[f32]) -> Result<InferenceResult, InferenceError> {
        if frame.is_empty() {
            return Err(InferenceError::InvalidFrame {
                expected: self.window.len().max(1),
                actual: 0,
            });
        }

        let start = Instant::now();
        let features = self.features(frame);
        self.last_features = features;
        let confidence = self.score(&features);

        Ok(InferenceResult::new(
            confidence,
            start.elapsed().as_micros() as u64,
        ))
    }

    fn reset(&mut self) {
        self.last_features = FrameFeatures::default();
    }

    fn name(&self) -> &str {
        "feature-heuristic"
    }
}
