//! Test helpers and fixtures for hush integration tests.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module.

#![allow(dead_code)]

pub mod tolerances;

use hush::prelude::*;
use std::time::{Duration, Instant};

/// Default host sample rate.
pub const TEST_SAMPLE_RATE: f64 = 48000.0;

/// Host samples per 320-sample frame at 16 kHz.
pub const HOST_FRAME: usize = 960;

/// Generate a sine wave at given frequency and amplitude.
pub fn generate_sine(frequency: f64, amplitude: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin()) as f32
        })
        .collect()
}

/// Calculate RMS of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Signal-to-noise ratio of `signal` against `reference`, in dB.
pub fn snr_db(signal: &[f32], reference: &[f32]) -> f64 {
    let (power, noise) = signal
        .iter()
        .zip(reference)
        .fold((0.0f64, 0.0f64), |(p, n), (&s, &r)| {
            let error = s as f64 - r as f64;
            (p + (r as f64) * (r as f64), n + error * error)
        });
    10.0 * (power / noise.max(f64::MIN_POSITIVE)).log10()
}

/// Poll `condition` every 2ms for up to five seconds.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Engine replaying a fixed confidence script, then reporting 0.
pub fn scripted_engine(script: Vec<f32>) -> impl InferenceEngine {
    let mut script = script.into_iter();
    InferenceFn::new("script", move |_frame: &[f32]| {
        Ok(InferenceResult::new(script.next().unwrap_or(0.0), 0))
    })
}

/// Pool settings for tests: two threads, no cadence wait.
pub fn test_pool() -> PoolConfig {
    PoolConfig {
        thread_count: 2,
        priority: ThreadPriority::Normal,
        interval_ms: 0,
        ..Default::default()
    }
}

/// Install a test subscriber so tracing output shows up with `--nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
