//! Polyphase FIR decimation from the host rate down to the analysis rate.
//!
//! A Hamming-windowed sinc prototype of length `L` is split into `M` branches of
//! `L / M` taps. Each input sample lands in the delay line of the branch that will
//! multiply it, and once per `M` inputs every branch is dotted against its delay line
//! to produce one output. This is the same arithmetic as filtering at the input rate
//! and keeping every `M`th sample, without computing the discarded outputs.
//!
//! The per-branch delay lines are mirrored (each sample is written twice, `P` slots
//! apart), so the most recent `P` samples of a branch are always one contiguous slice
//! and the dot product can run through a vector kernel without wrap handling.
//!
//! Processing never allocates; all buffers are sized at construction.

mod design;
mod kernel;

pub use design::{polyphase_branches, windowed_sinc};
pub use kernel::DotKernel;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Rate the analysis stage runs at.
pub const TARGET_SAMPLE_RATE: f64 = 16_000.0;

/// Largest supported decimation factor.
pub const MAX_FACTOR: usize = 8;

/// Taps per polyphase branch for the default filter.
pub const DEFAULT_TAPS_PER_PHASE: usize = 24;

/// Taps per polyphase branch for [`DecimatorConfig::high_quality`].
pub const HIGH_QUALITY_TAPS_PER_PHASE: usize = 32;

/// Integer decimation factor taking `sample_rate` to roughly 16kHz, clamped to 1..=8.
pub fn decimation_factor_for_rate(sample_rate: f64) -> usize {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return 1;
    }
    ((sample_rate / TARGET_SAMPLE_RATE).round() as usize).clamp(1, MAX_FACTOR)
}

/// Decimator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecimatorConfig {
    /// Decimation factor `M` (1-8).
    pub factor: usize,
    /// Taps per polyphase branch; the prototype has `factor * taps_per_phase` taps.
    pub taps_per_phase: usize,
    /// Passband edge as a fraction of the output Nyquist frequency (0, 1].
    pub cutoff: f32,
}

impl Default for DecimatorConfig {
    fn default() -> Self {
        Self {
            factor: 3,
            taps_per_phase: DEFAULT_TAPS_PER_PHASE,
            cutoff: 1.0,
        }
    }
}

impl DecimatorConfig {
    pub fn new(factor: usize) -> Self {
        Self {
            factor,
            ..Self::default()
        }
    }

    /// Longer filter with better passband flatness and stopband rejection.
    pub fn high_quality(factor: usize) -> Self {
        Self {
            factor,
            taps_per_phase: HIGH_QUALITY_TAPS_PER_PHASE,
            ..Self::default()
        }
    }

    /// Default filter for a host running at `sample_rate`.
    pub fn for_sample_rate(sample_rate: f64) -> Self {
        Self::new(decimation_factor_for_rate(sample_rate))
    }

    /// Prototype filter length `L`.
    pub fn length(&self) -> usize {
        self.factor * self.taps_per_phase
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_FACTOR).contains(&self.factor) {
            return Err(Error::InvalidConfig(format!(
                "decimation factor {} outside 1..={MAX_FACTOR}",
                self.factor
            )));
        }
        if self.taps_per_phase == 0 {
            return Err(Error::InvalidConfig("taps_per_phase must be > 0".into()));
        }
        if !(self.cutoff > 0.0 && self.cutoff <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "cutoff {} outside (0, 1]",
                self.cutoff
            )));
        }
        Ok(())
    }
}

/// Streaming polyphase decimator, mono in, mono out.
#[derive(Debug, Clone)]
pub struct PolyphaseDecimator {
    factor: usize,
    taps_per_phase: usize,
    prototype: Vec<f32>,
    /// `factor` reversed branches of `taps_per_phase` taps each.
    branches: Vec<f32>,
    /// `factor` mirrored delay lines of `2 * taps_per_phase` slots each.
    history: Vec<f32>,
    /// Slot in each delay line that the current cycle writes.
    position: usize,
    /// Input index within the current cycle of `factor` samples.
    phase: usize,
    kernel: DotKernel,
}

impl PolyphaseDecimator {
    /// Decimator with the default cutoff.
    ///
    /// # Panics
    /// If `factor` is outside 1..=8 or `length` is not a positive multiple of `factor`.
    pub fn new(factor: usize, length: usize) -> Self {
        assert!(
            (1..=MAX_FACTOR).contains(&factor),
            "decimation factor {factor} outside 1..={MAX_FACTOR}"
        );
        assert!(
            length >= factor && length % factor == 0,
            "filter length {length} must be a positive multiple of the decimation factor {factor}"
        );
        Self::build(factor, length / factor, 1.0)
    }

    /// Fallible form of [`new`](Self::new).
    pub fn try_new(factor: usize, length: usize) -> Result<Self> {
        if length < factor || factor == 0 || length % factor != 0 {
            return Err(Error::InvalidConfig(format!(
                "filter length {length} is not a positive multiple of decimation factor {factor}"
            )));
        }
        Self::from_config(&DecimatorConfig {
            factor,
            taps_per_phase: length / factor,
            cutoff: 1.0,
        })
    }

    pub fn from_config(config: &DecimatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(
            config.factor,
            config.taps_per_phase,
            config.cutoff,
        ))
    }

    fn build(factor: usize, taps_per_phase: usize, cutoff: f32) -> Self {
        let length = factor * taps_per_phase;
        let prototype = windowed_sinc(length, cutoff.min(1.0) as f64 / factor as f64);
        let branches = polyphase_branches(&prototype, factor);

        Self {
            factor,
            taps_per_phase,
            prototype,
            branches,
            history: vec![0.0; factor * 2 * taps_per_phase],
            position: 0,
            phase: 0,
            kernel: DotKernel::detect(),
        }
    }

    /// Force a convolution kernel. Unavailable kernels fall back to scalar.
    pub fn with_kernel(mut self, kernel: DotKernel) -> Self {
        self.set_kernel(kernel);
        self
    }

    pub fn set_kernel(&mut self, kernel: DotKernel) {
        self.kernel = if kernel.is_available() {
            kernel
        } else {
            tracing::warn!(
                "Kernel '{}' not supported on this CPU, using scalar",
                kernel.name()
            );
            DotKernel::Scalar
        };
    }

    pub fn kernel(&self) -> DotKernel {
        self.kernel
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Prototype filter length `L`.
    pub fn length(&self) -> usize {
        self.prototype.len()
    }

    pub fn taps_per_phase(&self) -> usize {
        self.taps_per_phase
    }

    /// Prototype coefficients (sum to 1).
    pub fn coefficients(&self) -> &[f32] {
        &self.prototype
    }

    /// Group delay in output samples, `(L / M) / 2`.
    pub fn group_delay(&self) -> usize {
        self.taps_per_phase / 2
    }

    /// Exact group delay in input samples, `(L - 1) / 2`.
    pub fn group_delay_input_samples(&self) -> f64 {
        (self.length() - 1) as f64 / 2.0
    }

    /// Upper bound on outputs produced by `input_len` more input samples.
    pub fn max_output_len(&self, input_len: usize) -> usize {
        (self.phase + input_len) / self.factor
    }

    /// Zero the delay lines and restart the input cycle. Does not allocate.
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.position = 0;
        self.phase = 0;
    }

    /// Feed one sample; returns an output once per `factor` inputs.
    #[inline]
    pub fn push_sample(&mut self, sample: f32) -> Option<f32> {
        let taps = self.taps_per_phase;
        let branch = self.factor - 1 - self.phase;
        let line = branch * 2 * taps;
        self.history[line + self.position] = sample;
        self.history[line + self.position + taps] = sample;

        self.phase += 1;
        if self.phase < self.factor {
            return None;
        }
        self.phase = 0;

        let start = self.position + 1;
        let mut acc = 0.0;
        for branch in 0..self.factor {
            let line = branch * 2 * taps;
            let window = &self.history[line + start..line + start + taps];
            let coefficients = &self.branches[branch * taps..(branch + 1) * taps];
            acc += self.kernel.dot(coefficients, window);
        }

        self.position += 1;
        if self.position == taps {
            self.position = 0;
        }
        Some(acc)
    }

    /// Decimate `input` into `output`. Returns the number of samples written.
    ///
    /// Outputs beyond `output.len()` are discarded, but the filter state still
    /// advances over all of `input`.
    pub fn process_mono(&mut self, input: &[f32], output: &mut [f32]) -> usize {
        let mut written = 0;
        for &sample in input {
            if let Some(out) = self.push_sample(sample) {
                if let Some(slot) = output.get_mut(written) {
                    *slot = out;
                    written += 1;
                }
            }
        }
        written
    }

    /// Average `left`/`right` per sample, then decimate. Extra samples in the longer
    /// channel are ignored.
    pub fn process_stereo_to_mono(
        &mut self,
        left: &[f32],
        right: &[f32],
        output: &mut [f32],
    ) -> usize {
        let mut written = 0;
        for (&l, &r) in left.iter().zip(right) {
            if let Some(out) = self.push_sample((l + r) * 0.5) {
                if let Some(slot) = output.get_mut(written) {
                    *slot = out;
                    written += 1;
                }
            }
        }
        written
    }

    /// Interleaved `[l, r, l, r, ...]` variant of
    /// [`process_stereo_to_mono`](Self::process_stereo_to_mono).
    pub fn process_interleaved_stereo(&mut self, interleaved: &[f32], output: &mut [f32]) -> usize {
        let mut written = 0;
        for frame in interleaved.chunks_exact(2) {
            if let Some(out) = self.push_sample((frame[0] + frame[1]) * 0.5) {
                if let Some(slot) = output.get_mut(written) {
                    *slot = out;
                    written += 1;
                }
            }
        }
        written
    }
}

impl Default for PolyphaseDecimator {
    fn default() -> Self {
        let config = DecimatorConfig::default();
        Self::build(config.factor, config.taps_per_phase, config.cutoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn sine(freq: f64, sample_rate: f64, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate).sin() as f32)
            .collect()
    }

    /// Direct-form reference: filter at the input rate, keep every `M`th output.
    fn direct_form(prototype: &[f32], factor: usize, input: &[f32]) -> Vec<f32> {
        let mut out = Vec::new();
        let mut n = factor - 1;
        while n < input.len() {
            let mut acc = 0.0f64;
            for (k, &h) in prototype.iter().enumerate() {
                if n >= k {
                    acc += h as f64 * input[n - k] as f64;
                }
            }
            out.push(acc as f32);
            n += factor;
        }
        out
    }

    #[test]
    fn test_decimation_factor_for_rate() {
        assert_eq!(decimation_factor_for_rate(48_000.0), 3);
        assert_eq!(decimation_factor_for_rate(44_100.0), 3);
        assert_eq!(decimation_factor_for_rate(96_000.0), 6);
        assert_eq!(decimation_factor_for_rate(16_000.0), 1);
        assert_eq!(decimation_factor_for_rate(8_000.0), 1);
        assert_eq!(decimation_factor_for_rate(192_000.0), 8);
        assert_eq!(decimation_factor_for_rate(f64::NAN), 1);
    }

    #[test]
    #[should_panic(expected = "multiple of the decimation factor")]
    fn test_length_not_multiple_panics() {
        let _ = PolyphaseDecimator::new(3, 47);
    }

    #[test]
    fn test_try_new_rejects_bad_length() {
        assert!(PolyphaseDecimator::try_new(3, 47).is_err());
        assert!(PolyphaseDecimator::try_new(9, 72).is_err());
        assert!(PolyphaseDecimator::try_new(3, 48).is_ok());
    }

    #[test]
    fn test_group_delay() {
        let decimator = PolyphaseDecimator::new(3, 72);
        assert_eq!(decimator.taps_per_phase(), 24);
        assert_eq!(decimator.group_delay(), 12);
        assert_eq!(decimator.group_delay_input_samples(), 35.5);
    }

    #[test]
    fn test_output_count() {
        let mut decimator = PolyphaseDecimator::new(3, 72);
        let mut output = vec![0.0; 64];
        assert_eq!(decimator.max_output_len(10), 3);
        assert_eq!(decimator.process_mono(&[0.0; 10], &mut output), 3);
        // One sample carried over from the previous call.
        assert_eq!(decimator.max_output_len(5), 2);
        assert_eq!(decimator.process_mono(&[0.0; 5], &mut output), 2);
    }

    #[test]
    fn test_matches_direct_form() {
        let input = sine(1_000.0, 48_000.0, 1_000);
        for kernel in DotKernel::available() {
            let mut decimator = PolyphaseDecimator::new(3, 72).with_kernel(kernel);
            let mut output = vec![0.0; decimator.max_output_len(input.len())];
            let produced = decimator.process_mono(&input, &mut output);

            let reference = direct_form(decimator.coefficients(), 3, &input);
            assert_eq!(produced, reference.len());
            for (a, b) in output.iter().zip(&reference) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_dc_converges_to_unity() {
        let mut decimator = PolyphaseDecimator::default();
        let input = vec![1.0; 3_000];
        let mut output = vec![0.0; 1_000];
        let produced = decimator.process_mono(&input, &mut output);
        assert_eq!(produced, 1_000);
        for &sample in &output[decimator.taps_per_phase() + 1..] {
            assert_abs_diff_eq!(sample, 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_factor_one_single_tap_is_passthrough() {
        let mut decimator = PolyphaseDecimator::new(1, 1);
        let input = [0.5, -0.25, 1.0];
        let mut output = [0.0; 3];
        assert_eq!(decimator.process_mono(&input, &mut output), 3);
        assert_eq!(output, input);
    }

    #[test]
    fn test_stereo_averages_channels() {
        let left = sine(500.0, 48_000.0, 600);
        let right: Vec<f32> = left.iter().map(|s| s * 0.5).collect();
        let mono: Vec<f32> = left.iter().zip(&right).map(|(l, r)| (l + r) * 0.5).collect();

        let mut stereo = PolyphaseDecimator::new(3, 72);
        let mut expected = PolyphaseDecimator::new(3, 72);
        let mut a = vec![0.0; 200];
        let mut b = vec![0.0; 200];
        assert_eq!(stereo.process_stereo_to_mono(&left, &right, &mut a), 200);
        assert_eq!(expected.process_mono(&mono, &mut b), 200);
        assert_eq!(a, b);

        let interleaved: Vec<f32> = left
            .iter()
            .zip(&right)
            .flat_map(|(&l, &r)| [l, r])
            .collect();
        let mut interleaved_decimator = PolyphaseDecimator::new(3, 72);
        let mut c = vec![0.0; 200];
        assert_eq!(
            interleaved_decimator.process_interleaved_stereo(&interleaved, &mut c),
            200
        );
        assert_eq!(a, c);
    }

    #[test]
    fn test_short_output_still_advances_state() {
        let input = sine(700.0, 48_000.0, 300);
        let mut full = PolyphaseDecimator::new(3, 72);
        let mut truncated = PolyphaseDecimator::new(3, 72);

        let mut a = vec![0.0; 100];
        let mut b = vec![0.0; 10];
        full.process_mono(&input, &mut a);
        assert_eq!(truncated.process_mono(&input, &mut b), 10);

        let tail = sine(700.0, 48_000.0, 30);
        let mut x = vec![0.0; 10];
        let mut y = vec![0.0; 10];
        full.process_mono(&tail, &mut x);
        truncated.process_mono(&tail, &mut y);
        assert_eq!(x, y);
    }

    #[test]
    fn test_reset_is_bit_reproducible() {
        let input = sine(1_234.0, 48_000.0, 2_000);
        let mut decimator = PolyphaseDecimator::default();
        let mut first = vec![0.0; 700];
        let mut second = vec![0.0; 700];

        let n1 = decimator.process_mono(&input, &mut first);
        decimator.reset();
        let n2 = decimator.process_mono(&input, &mut second);

        assert_eq!(n1, n2);
        assert_eq!(
            first.iter().map(|s| s.to_bits()).collect::<Vec<_>>(),
            second.iter().map(|s| s.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_unavailable_kernel_falls_back() {
        let decimator = PolyphaseDecimator::default();
        for kernel in [
            DotKernel::Scalar,
            DotKernel::Sse,
            DotKernel::Avx,
            DotKernel::Neon,
        ] {
            let chosen = decimator.clone().with_kernel(kernel).kernel();
            assert!(chosen.is_available());
        }
    }

    proptest! {
        /// Splitting the input into arbitrary chunks gives the same output as one call.
        #[test]
        fn prop_chunked_matches_one_shot(
            factor in 1usize..=8,
            splits in prop::collection::vec(0usize..97, 0..12),
        ) {
            let input = sine(900.0, 48_000.0, 1_500);
            let mut one_shot = PolyphaseDecimator::new(factor, factor * 16);
            let mut expected = vec![0.0; input.len()];
            let n = one_shot.process_mono(&input, &mut expected);

            let mut chunked = PolyphaseDecimator::new(factor, factor * 16);
            let mut actual = Vec::with_capacity(n);
            let mut scratch = vec![0.0; input.len()];
            let mut cursor = 0;
            for split in splits.into_iter().chain(std::iter::once(input.len())) {
                let end = (cursor + split).min(input.len());
                let produced = chunked.process_mono(&input[cursor..end], &mut scratch);
                actual.extend_from_slice(&scratch[..produced]);
                cursor = end;
            }

            prop_assert_eq!(actual.len(), n);
            for (a, b) in actual.iter().zip(&expected[..n]) {
                prop_assert!((a - b).abs() <= 1e-5);
            }
        }
    }
}
