//! Confidence post-processing for the hush detection pipeline.
//!
//! - [`PostProcessor`]: median smoothing and the hit state machine (minimum/maximum
//!   duration, hysteresis, debounce) turning per-frame confidence into hit on/off
//!   transitions.
//! - [`FeatureHeuristicEngine`]: a deterministic energy/zero-crossing/centroid
//!   heuristic implementing [`hush_core::InferenceEngine`].
//!
//! ```
//! use hush_analysis::{PostProcessor, PostProcessorConfig};
//!
//! let mut processor = PostProcessor::new(PostProcessorConfig::fast());
//! processor.process_confidence(0.9);
//! assert!(processor.has_hit());
//! ```

pub mod features;
pub mod post_processor;

pub use features::{FeatureHeuristicConfig, FeatureHeuristicEngine, FrameFeatures};
pub use post_processor::{
    HitCallback, HitEvent, PostProcessor, PostProcessorConfig, PostProcessorMonitor,
    PostProcessorStatistics,
};
