//! The audio-facing pipeline.

use crate::builder::PipelineBuilder;
use crate::config::PipelineConfig;
use crate::detection::{Clock, DetectionChain};
use crate::Result;
use hush_analysis::{PostProcessor, PostProcessorMonitor};
use hush_core::{
    Counter, Error as CoreError, InferenceEngine, PolyphaseDecimator, PoolStatsSnapshot,
    QueueProducer, RealtimeThreadPool, SharedConsumer, SharedInference,
};
use hush_midi::{
    MidiEvent, MidiEventConsumer, MidiEventHandler, MidiHandlerMonitor, MidiStatistics,
};
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;

type Chain = DetectionChain<Box<dyn InferenceEngine>>;

/// Hit detector from host audio to MIDI events.
///
/// The host's audio thread calls [`process_stereo`](Self::process_stereo) (or
/// [`process_interleaved`](Self::process_interleaved)) with every block. Those calls
/// decimate into a preallocated buffer and push into a bounded queue; they never block
/// or allocate, and samples that do not fit are dropped and counted. Inference,
/// post-processing and MIDI conversion run on the pool's inference thread. Events are
/// read back with [`drain_events`](Self::drain_events).
///
/// ```no_run
/// use hush::prelude::*;
///
/// let mut pipeline = Pipeline::builder()
///     .sample_rate(48_000.0)
///     .engine(FeatureHeuristicEngine::new())
///     .build()?;
/// pipeline.activate()?;
///
/// let (left, right) = (vec![0.0f32; 480], vec![0.0f32; 480]);
/// pipeline.process_stereo(&left, &right);
///
/// let mut events = Vec::new();
/// pipeline.drain_events(&mut events);
/// pipeline.deactivate();
/// # Ok::<(), hush::Error>(())
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    decimator: PolyphaseDecimator,
    scratch: Vec<f32>,
    producer: QueueProducer<f32>,
    consumer: SharedConsumer,
    clock: Arc<Clock>,
    dropped_samples: Counter,

    chain: Arc<Mutex<Chain>>,
    pool: RealtimeThreadPool,
    events: MidiEventConsumer,
    hit_monitor: PostProcessorMonitor,
    midi_monitor: MidiHandlerMonitor,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub(crate) fn new(config: PipelineConfig, engine: Box<dyn InferenceEngine>) -> Result<Self> {
        config.validate()?;

        let decimator = PolyphaseDecimator::from_config(&config.decimator_config())?;
        let (producer, consumer) = hush_core::bounded_queue(config.queue_capacity);
        let (sink, events) = hush_midi::midi_event_channel(config.event_capacity);
        let clock = Arc::new(Clock::default());

        let post_processor = PostProcessor::new(config.post_processor);
        let midi = MidiEventHandler::new(config.midi);
        let hit_monitor = post_processor.monitor();
        let midi_monitor = midi.monitor();

        let chain = DetectionChain::new(engine, post_processor, midi, sink, clock.clone());
        let scratch = vec![0.0; config.max_block_size / decimator.factor() + 1];

        tracing::info!(
            "Pipeline: {} Hz / {} ({} taps, {} kernel), queue {}, frame {} samples",
            config.sample_rate,
            decimator.factor(),
            decimator.length(),
            decimator.kernel().name(),
            producer.capacity(),
            config.pool.frame_size,
        );

        Ok(Self {
            pool: RealtimeThreadPool::new(config.pool),
            config,
            decimator,
            scratch,
            producer,
            consumer: Arc::new(Mutex::new(consumer)),
            clock,
            dropped_samples: Counter::default(),
            chain: Arc::new(Mutex::new(chain)),
            events,
            hit_monitor,
            midi_monitor,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn decimator(&self) -> &PolyphaseDecimator {
        &self.decimator
    }

    pub fn is_active(&self) -> bool {
        self.pool.is_running()
    }

    /// Reset all detection state and start the worker threads. Idempotent.
    pub fn activate(&mut self) -> Result<()> {
        if self.pool.is_running() {
            return Ok(());
        }

        self.decimator.reset();
        self.consumer.lock().clear();
        self.chain.lock().reset();
        self.clock.sample_position.store(0, Ordering::Release);

        let engine: SharedInference = self.chain.clone();
        match self.pool.try_start(self.consumer.clone(), engine) {
            Ok(()) | Err(CoreError::AlreadyRunning) => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!("Pipeline activated");
        Ok(())
    }

    /// Stop the worker threads. A note still sounding gets its note-off now.
    /// Idempotent.
    pub fn deactivate(&mut self) {
        if !self.pool.is_running() {
            return;
        }
        self.pool.stop();
        self.chain.lock().release();
        self.consumer.lock().clear();
        tracing::info!("Pipeline deactivated");
    }

    /// Audio thread: downmix, decimate and enqueue one block. Returns the number of
    /// decimated samples queued.
    pub fn process_stereo(&mut self, left: &[f32], right: &[f32]) -> usize {
        let frames = left.len().min(right.len());
        let mut queued = 0;
        for (l, r) in left[..frames]
            .chunks(self.config.max_block_size)
            .zip(right[..frames].chunks(self.config.max_block_size))
        {
            let produced = self.decimator.process_stereo_to_mono(l, r, &mut self.scratch);
            queued += self.enqueue(produced);
        }
        self.advance(frames);
        queued
    }

    /// Interleaved `[l, r, l, r, ...]` variant of
    /// [`process_stereo`](Self::process_stereo).
    pub fn process_interleaved(&mut self, interleaved: &[f32]) -> usize {
        let frames = interleaved.len() / 2;
        let mut queued = 0;
        for block in interleaved[..frames * 2].chunks(self.config.max_block_size * 2) {
            let produced = self
                .decimator
                .process_interleaved_stereo(block, &mut self.scratch);
            queued += self.enqueue(produced);
        }
        self.advance(frames);
        queued
    }

    /// Host timestamp stamped on events from now on.
    pub fn set_host_timestamp(&self, timestamp: u64) {
        self.clock.host_timestamp.store(timestamp, Ordering::Relaxed);
    }

    /// Input-rate samples processed since activation.
    pub fn sample_position(&self) -> u64 {
        self.clock.position()
    }

    #[inline]
    fn enqueue(&mut self, produced: usize) -> usize {
        let pushed = self.producer.push_bulk(&self.scratch[..produced]);
        if pushed < produced {
            self.dropped_samples.add((produced - pushed) as u64);
        }
        pushed
    }

    #[inline]
    fn advance(&self, frames: usize) {
        self.clock
            .sample_position
            .fetch_add(frames as u64, Ordering::Release);
    }

    /// Move every pending event into `out`; returns how many were moved.
    pub fn drain_events(&mut self, out: &mut Vec<MidiEvent>) -> usize {
        self.events.drain_into(out)
    }

    pub fn pop_event(&mut self) -> Option<MidiEvent> {
        self.events.pop()
    }

    /// Lock-free view of the hit state for UI polling.
    pub fn hit_monitor(&self) -> PostProcessorMonitor {
        self.hit_monitor.clone()
    }

    pub fn pool_statistics(&self) -> PoolStatsSnapshot {
        self.pool.statistics()
    }

    pub fn midi_statistics(&self) -> MidiStatistics {
        self.midi_monitor.statistics()
    }

    /// Decimated samples dropped because the queue was full.
    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples.get()
    }

    /// Apply new post-processor settings; takes effect on the next frame.
    pub fn update_post_processor(&self, config: hush_analysis::PostProcessorConfig) {
        self.chain.lock().post_processor_mut().update_config(config);
    }

    /// Apply new MIDI settings; takes effect on the next frame.
    pub fn update_midi(&self, config: hush_midi::MidiConfig) {
        self.chain.lock().midi_mut().update_config(config);
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.deactivate();
    }
}
