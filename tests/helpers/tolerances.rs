//! Tolerance constants for decimation and detection tests.

/// Floating point rounding errors (chunked vs one-shot processing).
pub const FLOAT_EPSILON: f32 = 1e-5;

/// Minimum SNR of a 1 kHz tone through the default 48k -> 16k filter.
pub const DEFAULT_FILTER_SNR_DB: f64 = 50.0;

/// Minimum SNR of the same tone through the high-quality filter.
pub const HIGH_QUALITY_FILTER_SNR_DB: f64 = 70.0;

/// Largest output/input RMS ratio allowed for a tone above the output Nyquist.
pub const STOPBAND_RMS_RATIO: f32 = 0.2;

/// Allowed deviation of a settled DC input from unity.
pub const DC_TOLERANCE: f32 = 0.2;
