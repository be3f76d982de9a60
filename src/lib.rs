//! # Hush - Real-time hit detection
//!
//! Listens to a stereo host stream, decides per 20 ms frame whether a "hit" is
//! happening, and turns hits into MIDI notes.
//!
//! ## Architecture
//!
//! Hush is an umbrella crate that wires together:
//! - **hush-core** - SPSC sample queue, polyphase decimator, real-time thread pool
//! - **hush-analysis** - median smoothing and the hit state machine
//! - **hush-midi** - hit-to-note conversion and the event sink
//!
//! ```text
//! audio thread:  stereo -> PolyphaseDecimator -> bounded queue
//! inference:     queue -> engine -> PostProcessor -> MidiEventHandler -> event sink
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use hush::prelude::*;
//!
//! let mut pipeline = Pipeline::builder()
//!     .sample_rate(48_000.0)
//!     .midi(MidiConfig { hit_note: 36, ..Default::default() })
//!     .build()?;
//! pipeline.activate()?;
//!
//! // In the audio callback
//! # let (left, right) = (vec![0.0f32; 256], vec![0.0f32; 256]);
//! pipeline.process_stereo(&left, &right);
//!
//! // Anywhere else
//! let mut events = Vec::new();
//! pipeline.drain_events(&mut events);
//! # Ok::<(), hush::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `simd` (default) - SSE/AVX/NEON decimator kernels, selected at runtime

/// Re-export of hush-core for direct access
pub use hush_core as core;

/// Re-export of hush-analysis
pub use hush_analysis as analysis;

/// Re-export of hush-midi
pub use hush_midi as midi;

mod builder;
mod config;
mod detection;
mod error;
mod pipeline;

pub use builder::PipelineBuilder;
pub use config::{PipelineConfig, DEFAULT_MAX_BLOCK_SIZE};
pub use detection::{Clock, DetectionChain};
pub use error::{Error, Result};
pub use pipeline::Pipeline;

pub use hush_analysis::{
    FeatureHeuristicEngine, HitEvent, PostProcessor, PostProcessorConfig, PostProcessorMonitor,
    PostProcessorStatistics,
};
pub use hush_core::{
    DecimatorConfig, DotKernel, InferenceEngine, InferenceError, InferenceFn, InferenceResult,
    PolyphaseDecimator, PoolConfig, PoolStatsSnapshot, RealtimeThreadPool, ThreadPriority,
};
pub use hush_midi::{MidiConfig, MidiEvent, MidiEventHandler, MidiEventKind, MidiStatistics};

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::{
        DecimatorConfig, FeatureHeuristicEngine, InferenceEngine, InferenceError,
        InferenceFn, InferenceResult, MidiConfig, MidiEvent, MidiEventKind, Pipeline,
        PipelineConfig, PoolConfig, PostProcessorConfig, Result, ThreadPriority,
    };
}
