//! Pipeline configuration, loadable from TOML.
//!
//! ```toml
//! sample_rate = 48000.0
//! queue_capacity = 2048
//!
//! [pool]
//! thread_count = 2
//! priority = "high"
//!
//! [post_processor]
//! threshold = 0.7
//! enable_hysteresis = true
//!
//! [midi]
//! hit_note = 36
//! note_off_delay = 0
//! ```
//!
//! Every table and field is optional.

use crate::Result;
use hush_analysis::PostProcessorConfig;
use hush_core::{DecimatorConfig, Error as CoreError, PoolConfig, DEFAULT_QUEUE_CAPACITY};
use hush_midi::{MidiConfig, DEFAULT_EVENT_CAPACITY};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest host block processed in one decimator pass; longer blocks are split.
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Host sample rate in Hz.
    pub sample_rate: f64,
    /// Decimator override. Without one the factor follows `sample_rate`.
    pub decimator: Option<DecimatorConfig>,
    /// Use the longer filter when the decimator is derived from `sample_rate`.
    pub high_quality: bool,
    /// Sample queue ring size (rounded up to a power of two).
    pub queue_capacity: usize,
    pub max_block_size: usize,
    /// Event sink capacity.
    pub event_capacity: usize,
    pub pool: PoolConfig,
    pub post_processor: PostProcessorConfig,
    pub midi: MidiConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            decimator: None,
            high_quality: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            pool: PoolConfig::default(),
            post_processor: PostProcessorConfig::default(),
            midi: MidiConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!("Loading pipeline config from {}", path.as_ref().display());
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The decimator this configuration resolves to.
    pub fn decimator_config(&self) -> DecimatorConfig {
        match self.decimator {
            Some(config) => config,
            None if self.high_quality => DecimatorConfig::high_quality(
                hush_core::decimation_factor_for_rate(self.sample_rate),
            ),
            None => DecimatorConfig::for_sample_rate(self.sample_rate),
        }
    }

    /// Reject settings the pipeline cannot run with. Post-processor and MIDI settings
    /// are corrected by their own components instead.
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(invalid(format!("sample rate {} must be positive", self.sample_rate)));
        }
        self.decimator_config().validate()?;

        if self.pool.frame_size == 0 {
            return Err(invalid("frame size must be > 0".into()));
        }
        // The ring keeps one slot free, so it must hold more than one frame.
        let ring = self.queue_capacity.max(2).next_power_of_two();
        if ring <= self.pool.frame_size {
            return Err(invalid(format!(
                "queue capacity {} cannot hold a frame of {} samples",
                self.queue_capacity, self.pool.frame_size
            )));
        }
        if self.max_block_size == 0 {
            return Err(invalid("max block size must be > 0".into()));
        }
        if self.event_capacity == 0 {
            return Err(invalid("event capacity must be > 0".into()));
        }
        Ok(())
    }
}

fn invalid(message: String) -> crate::Error {
    CoreError::InvalidConfig(message).into()
}
