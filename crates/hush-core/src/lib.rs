//! Real-time primitives for the hush detection pipeline.
//!
//! Everything the audio thread touches lives here, along with the background
//! scheduling that keeps heavy work off it:
//!
//! - **Queue**: bounded lock-free SPSC ring ([`bounded_queue`])
//! - **Decimator**: polyphase FIR downsampling with SIMD kernels ([`PolyphaseDecimator`])
//! - **Pool**: fixed-cadence inference thread plus task workers ([`RealtimeThreadPool`])
//! - **Inference**: the engine contract the pool drives ([`InferenceEngine`])
//!
//! # Example
//!
//! ```
//! use hush_core::{bounded_queue, PolyphaseDecimator};
//!
//! let mut decimator = PolyphaseDecimator::new(3, 72);
//! let (mut tx, mut rx) = bounded_queue::<f32>(2048);
//!
//! let input = vec![0.0f32; 480];
//! let mut decimated = vec![0.0f32; decimator.max_output_len(input.len())];
//! let produced = decimator.process_mono(&input, &mut decimated);
//! assert_eq!(tx.push_bulk(&decimated[..produced]), 160);
//! assert_eq!(rx.size(), 160);
//! ```

pub mod decimator;
pub mod error;
pub mod inference;
pub mod lockfree;
pub mod pool;
pub mod queue;

pub use decimator::{decimation_factor_for_rate, DecimatorConfig, DotKernel, PolyphaseDecimator};
pub use error::{Error, Result};
pub use inference::{
    shared_inference, InferenceEngine, InferenceError, InferenceFn, InferenceResult,
    SharedInference,
};
pub use lockfree::{AtomicDouble, AtomicFlag, AtomicFloat, CacheAligned, Counter};
pub use pool::{PoolConfig, PoolStatsSnapshot, RealtimeThreadPool, SharedConsumer, ThreadPriority};
pub use queue::{bounded_queue, QueueConsumer, QueueProducer, DEFAULT_QUEUE_CAPACITY};
