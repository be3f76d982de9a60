//! Signal-level checks of the polyphase decimator at the production rate (48k -> 16k).

mod helpers;

use approx::assert_abs_diff_eq;
use helpers::tolerances::*;
use helpers::*;
use hush::{DecimatorConfig, DotKernel, PolyphaseDecimator};

fn decimate(decimator: &mut PolyphaseDecimator, input: &[f32]) -> Vec<f32> {
    let mut output = vec![0.0; decimator.max_output_len(input.len())];
    let written = decimator.process_mono(input, &mut output);
    output.truncate(written);
    output
}

/// Ideal output for a sine: output `j` lines up with input `j*M + M - 1`, delayed by
/// the filter's group delay.
fn ideal_reference(decimator: &PolyphaseDecimator, frequency: f64, amplitude: f64, len: usize) -> Vec<f32> {
    let factor = decimator.factor() as f64;
    let delay = decimator.group_delay_input_samples();
    (0..len)
        .map(|j| {
            let n = j as f64 * factor + factor - 1.0 - delay;
            (amplitude * (2.0 * std::f64::consts::PI * frequency * n / TEST_SAMPLE_RATE).sin()) as f32
        })
        .collect()
}

fn tone_snr(config: DecimatorConfig, kernel: DotKernel) -> f64 {
    let mut decimator = PolyphaseDecimator::from_config(&config).unwrap().with_kernel(kernel);
    let input = generate_sine(1000.0, 0.5, TEST_SAMPLE_RATE, TEST_SAMPLE_RATE as usize);
    let output = decimate(&mut decimator, &input);
    let reference = ideal_reference(&decimator, 1000.0, 0.5, output.len());

    let settle = decimator.taps_per_phase() * 2;
    snr_db(&output[settle..], &reference[settle..])
}

#[test]
fn test_default_filter_snr() {
    for kernel in DotKernel::available() {
        let snr = tone_snr(DecimatorConfig::for_sample_rate(TEST_SAMPLE_RATE), kernel);
        assert!(
            snr >= DEFAULT_FILTER_SNR_DB,
            "{} kernel: SNR {:.1} dB",
            kernel.name(),
            snr
        );
    }
}

#[test]
fn test_high_quality_filter_snr() {
    let snr = tone_snr(DecimatorConfig::high_quality(3), DotKernel::detect());
    assert!(snr >= HIGH_QUALITY_FILTER_SNR_DB, "SNR {:.1} dB", snr);
}

#[test]
fn test_stopband_tone_attenuated() {
    let mut decimator = PolyphaseDecimator::from_config(&DecimatorConfig::new(3)).unwrap();
    let input = generate_sine(20_000.0, 0.5, TEST_SAMPLE_RATE, 48_000);
    let output = decimate(&mut decimator, &input);

    let settle = decimator.taps_per_phase() * 2;
    let ratio = rms(&output[settle..]) / rms(&input);
    assert!(ratio < STOPBAND_RMS_RATIO, "20 kHz leaked at {:.3} of input RMS", ratio);
}

#[test]
fn test_dc_settles_to_unity() {
    let mut decimator = PolyphaseDecimator::from_config(&DecimatorConfig::new(3)).unwrap();
    let output = decimate(&mut decimator, &vec![1.0; 4800]);

    for &sample in &output[decimator.taps_per_phase() + 1..] {
        assert!((sample - 1.0).abs() < DC_TOLERANCE, "DC settled at {}", sample);
    }
}

#[test]
fn test_chunked_stereo_matches_one_shot() {
    let left = generate_sine(440.0, 0.7, TEST_SAMPLE_RATE, 9600);
    let right = generate_sine(3000.0, 0.3, TEST_SAMPLE_RATE, 9600);

    let mut one_shot = PolyphaseDecimator::default();
    let mut expected = vec![0.0; 3200];
    let written = one_shot.process_stereo_to_mono(&left, &right, &mut expected);
    assert_eq!(written, 3200);

    let mut chunked = PolyphaseDecimator::default();
    let mut actual = Vec::new();
    let mut scratch = [0.0f32; 256];
    let mut start = 0;
    // Uneven block sizes, as hosts deliver them.
    for size in [1usize, 7, 128, 64, 333, 17].iter().cycle() {
        if start >= left.len() {
            break;
        }
        let end = (start + size).min(left.len());
        let n = chunked.process_stereo_to_mono(&left[start..end], &right[start..end], &mut scratch[..]);
        actual.extend_from_slice(&scratch[..n]);
        start = end;
    }

    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(&expected) {
        assert_abs_diff_eq!(a, e, epsilon = FLOAT_EPSILON);
    }
}
