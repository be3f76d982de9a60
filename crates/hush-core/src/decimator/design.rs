//! Prototype lowpass design and polyphase decomposition.

use std::f64::consts::PI;

/// Hamming-windowed sinc lowpass of `length` taps, normalised to unity DC gain.
///
/// `cutoff` is relative to the input Nyquist frequency (1.0 = Nyquist). The filter
/// is symmetric about `(length - 1) / 2`, so it is linear phase.
pub fn windowed_sinc(length: usize, cutoff: f64) -> Vec<f32> {
    if length == 1 {
        return vec![1.0];
    }

    let centre = (length - 1) as f64 / 2.0;
    let span = (length - 1) as f64;

    let taps: Vec<f64> = (0..length)
        .map(|n| {
            let m = n as f64 - centre;
            let sinc = if m.abs() < 1e-12 {
                cutoff
            } else {
                (PI * cutoff * m).sin() / (PI * m)
            };
            let window = 0.54 - 0.46 * (2.0 * PI * n as f64 / span).cos();
            sinc * window
        })
        .collect();

    let gain: f64 = taps.iter().sum();
    taps.iter().map(|&tap| (tap / gain) as f32).collect()
}

/// Split `prototype` into `factor` branches, `branch[p][i] = prototype[i * factor + p]`,
/// stored flat with each branch reversed so it can be dotted against a history
/// window laid out oldest-first.
pub fn polyphase_branches(prototype: &[f32], factor: usize) -> Vec<f32> {
    let taps_per_phase = prototype.len() / factor;
    let mut branches = Vec::with_capacity(prototype.len());

    for phase in 0..factor {
        for i in (0..taps_per_phase).rev() {
            branches.push(prototype[i * factor + phase]);
        }
    }
    branches
}
