//! Builder for configuring and constructing a [`Pipeline`].

use crate::config::PipelineConfig;
use crate::{Pipeline, Result};
use hush_analysis::{FeatureHeuristicEngine, PostProcessorConfig};
use hush_core::{DecimatorConfig, InferenceEngine, PoolConfig};
use hush_midi::MidiConfig;

/// Without an engine, the pipeline runs the [`FeatureHeuristicEngine`].
///
/// # Example
///
/// ```
/// use hush::prelude::*;
///
/// let pipeline = Pipeline::builder()
///     .sample_rate(44_100.0)
///     .post_processor(PostProcessorConfig::robust())
///     .build()?;
/// assert_eq!(pipeline.decimator().factor(), 3);
/// # Ok::<(), hush::Error>(())
/// ```
#[derive(Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    engine: Option<Box<dyn InferenceEngine>>,
}

impl PipelineBuilder {
    /// Start from a full configuration, e.g. one loaded from TOML.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 48000
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    pub fn decimator(mut self, decimator: DecimatorConfig) -> Self {
        self.config.decimator = Some(decimator);
        self
    }

    pub fn high_quality(mut self, enabled: bool) -> Self {
        self.config.high_quality = enabled;
        self
    }

    /// Default: 2048
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.config.pool = pool;
        self
    }

    pub fn post_processor(mut self, config: PostProcessorConfig) -> Self {
        self.config.post_processor = config;
        self
    }

    pub fn midi(mut self, config: MidiConfig) -> Self {
        self.config.midi = config;
        self
    }

    pub fn engine<E: InferenceEngine + 'static>(mut self, engine: E) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let engine = self
            .engine
            .unwrap_or_else(|| Box::new(FeatureHeuristicEngine::new()));
        Pipeline::new(self.config, engine)
    }
}
