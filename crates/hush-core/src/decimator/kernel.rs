//! Dot-product kernels for the polyphase branches.
//!
//! The scalar kernel is the reference; vector kernels must agree with it to within
//! floating-point reassociation error. Vector kernels are only selectable when the
//! running CPU reports the instruction set, so `dot` never executes an unsupported
//! instruction.

/// Convolution strategy used by [`PolyphaseDecimator`](super::PolyphaseDecimator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DotKernel {
    /// Portable reference implementation.
    #[default]
    Scalar,
    /// 4-lane SSE (x86_64).
    Sse,
    /// 8-lane AVX (x86_64).
    Avx,
    /// 4-lane NEON (aarch64).
    Neon,
}

impl DotKernel {
    /// Fastest kernel supported by this CPU.
    pub fn detect() -> Self {
        #[cfg(all(feature = "simd", target_arch = "x86_64"))]
        {
            if std::arch::is_x86_feature_detected!("avx") {
                return DotKernel::Avx;
            }
            if std::arch::is_x86_feature_detected!("sse") {
                return DotKernel::Sse;
            }
        }
        #[cfg(all(feature = "simd", target_arch = "aarch64"))]
        {
            if std::arch::is_aarch64_feature_detected!("neon") {
                return DotKernel::Neon;
            }
        }
        DotKernel::Scalar
    }

    /// Whether this kernel can run here (compiled in and supported by the CPU).
    pub fn is_available(self) -> bool {
        match self {
            DotKernel::Scalar => true,
            #[cfg(all(feature = "simd", target_arch = "x86_64"))]
            DotKernel::Sse => std::arch::is_x86_feature_detected!("sse"),
            #[cfg(all(feature = "simd", target_arch = "x86_64"))]
            DotKernel::Avx => std::arch::is_x86_feature_detected!("avx"),
            #[cfg(all(feature = "simd", target_arch = "aarch64"))]
            DotKernel::Neon => std::arch::is_aarch64_feature_detected!("neon"),
            #[allow(unreachable_patterns)]
            _ => false,
        }
    }

    /// All kernels usable on this machine, scalar first.
    pub fn available() -> Vec<DotKernel> {
        [
            DotKernel::Scalar,
            DotKernel::Sse,
            DotKernel::Avx,
            DotKernel::Neon,
        ]
        .into_iter()
        .filter(|kernel| kernel.is_available())
        .collect()
    }

    pub fn name(self) -> &'static str {
        match self {
            DotKernel::Scalar => "scalar",
            DotKernel::Sse => "sse",
            DotKernel::Avx => "avx",
            DotKernel::Neon => "neon",
        }
    }

    /// `sum(a[i] * b[i])` over the shorter of the two slices.
    ///
    /// Callers must only hold kernels that passed [`is_available`](Self::is_available).
    #[inline]
    pub(crate) fn dot(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            // SAFETY: the decimator only stores kernels that passed `is_available`.
            #[cfg(all(feature = "simd", target_arch = "x86_64"))]
            DotKernel::Avx => unsafe { x86::dot_avx(a, b) },
            #[cfg(all(feature = "simd", target_arch = "x86_64"))]
            DotKernel::Sse => unsafe { x86::dot_sse(a, b) },
            #[cfg(all(feature = "simd", target_arch = "aarch64"))]
            DotKernel::Neon => unsafe { neon::dot_neon(a, b) },
            _ => dot_scalar(a, b),
        }
    }
}

#[inline]
pub(crate) fn dot_scalar(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(all(feature = "simd", target_arch = "x86_64"))]
mod x86 {
    use std::arch::x86_64::*;

    #[target_feature(enable = "sse")]
    pub(super) unsafe fn dot_sse(a: &[f32], b: &[f32]) -> f32 {
        let len = a.len().min(b.len());
        let chunks = len / 4;
        let mut acc = _mm_setzero_ps();

        for i in 0..chunks {
            let va = _mm_loadu_ps(a.as_ptr().add(i * 4));
            let vb = _mm_loadu_ps(b.as_ptr().add(i * 4));
            acc = _mm_add_ps(acc, _mm_mul_ps(va, vb));
        }

        let mut lanes = [0.0f32; 4];
        _mm_storeu_ps(lanes.as_mut_ptr(), acc);
        let mut sum = (lanes[0] + lanes[1]) + (lanes[2] + lanes[3]);
        for i in chunks * 4..len {
            sum += a[i] * b[i];
        }
        sum
    }

    #[target_feature(enable = "avx")]
    pub(super) unsafe fn dot_avx(a: &[f32], b: &[f32]) -> f32 {
        let len = a.len().min(b.len());
        let chunks = len / 8;
        let mut acc = _mm256_setzero_ps();

        for i in 0..chunks {
            let va = _mm256_loadu_ps(a.as_ptr().add(i * 8));
            let vb = _mm256_loadu_ps(b.as_ptr().add(i * 8));
            acc = _mm256_add_ps(acc, _mm256_mul_ps(va, vb));
        }

        let mut lanes = [0.0f32; 8];
        _mm256_storeu_ps(lanes.as_mut_ptr(), acc);
        let mut sum = lanes.iter().sum::<f32>();
        for i in chunks * 8..len {
            sum += a[i] * b[i];
        }
        sum
    }
}

#[cfg(all(feature = "simd", target_arch = "aarch64"))]
mod neon {
    use std::arch::aarch64::*;

    #[target_feature(enable = "neon")]
    pub(super) unsafe fn dot_neon(a: &[f32], b: &[f32]) -> f32 {
        let len = a.len().min(b.len());
        let chunks = len / 4;
        let mut acc = vdupq_n_f32(0.0);

        for i in 0..chunks {
            let va = vld1q_f32(a.as_ptr().add(i * 4));
            let vb = vld1q_f32(b.as_ptr().add(i * 4));
            acc = vaddq_f32(acc, vmulq_f32(va, vb));
        }

        let mut sum = vaddvq_f32(acc);
        for i in chunks * 4..len {
            sum += a[i] * b[i];
        }
        sum
    }
}
