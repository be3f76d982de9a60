//! Inference collaborator contract.
//!
//! The pool hands each frame of decimated audio to an [`InferenceEngine`] and only
//! looks at the returned confidence and success flag. What sits behind the trait (a
//! model runtime, a heuristic, a test double) is up to the caller.

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

/// Result of one inference call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceResult {
    /// Detection confidence in [0, 1].
    pub confidence: f32,
    pub success: bool,
    pub latency_micros: u64,
}

impl InferenceResult {
    /// Successful result; `confidence` is clamped to [0, 1] and NaN maps to 0.
    pub fn new(confidence: f32, latency_micros: u64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            confidence,
            success: true,
            latency_micros,
        }
    }

    /// Result for a frame the engine could not evaluate.
    pub fn failed(latency_micros: u64) -> Self {
        Self {
            confidence: 0.0,
            success: false,
            latency_micros,
        }
    }
}

/// Why an engine could not evaluate a frame.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("Invalid frame: expected {expected} samples, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },

    #[error("Inference failed: {0}")]
    Failed(String),
}

/// Per-frame inference.
///
/// # Thread Safety
///
/// The engine is called from the pool's inference worker only, one frame at a time.
/// It must be `Send` to move there; it does not need to be `Sync`.
pub trait InferenceEngine: Send {
    fn infer(&mut self, frame: &[f32]) -> Result<InferenceResult, InferenceError>;

    /// Clear any state carried between frames.
    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "inference"
    }
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn infer(&mut self, frame: &[f32]) -> Result<InferenceResult, InferenceError> {
        (**self).infer(frame)
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Engine shared between the pipeline owner and the inference worker.
pub type SharedInference = Arc<Mutex<dyn InferenceEngine>>;

/// Wrap an engine for [`RealtimeThreadPool::start`](crate::pool::RealtimeThreadPool::start).
pub fn shared_inference<E: InferenceEngine + 'static>(engine: E) -> SharedInference {
    Arc::new(Mutex::new(engine))
}

/// Adapter turning a closure into an [`InferenceEngine`].
pub struct InferenceFn<F> {
    name: String,
    f: F,
}

impl<F> InferenceFn<F>
where
    F: FnMut(&[f32]) -> Result<InferenceResult, InferenceError> + Send,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> InferenceEngine for InferenceFn<F>
where
    F: FnMut(&[f32]) -> Result<InferenceResult, InferenceError> + Send,
{
    fn infer(&mut self, frame: &[f32]) -> Result<InferenceResult, InferenceError> {
        (self.f)(frame)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
