//! Per-frame detection: inference, post-processing and MIDI conversion in one engine.

use hush_analysis::PostProcessor;
use hush_core::{InferenceEngine, InferenceError, InferenceResult};
use hush_midi::{MidiEvent, MidiEventHandler, MidiEventProducer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Position and host time published by the audio thread.
#[derive(Debug, Default)]
pub struct Clock {
    /// Input-rate samples processed since activation.
    pub sample_position: AtomicU64,
    pub host_timestamp: AtomicU64,
}

impl Clock {
    #[inline]
    pub fn position(&self) -> u64 {
        self.sample_position.load(Ordering::Acquire)
    }

    #[inline]
    pub fn host_timestamp(&self) -> u64 {
        self.host_timestamp.load(Ordering::Relaxed)
    }
}

/// Wraps an engine so that each inferred frame also drives the post-processor and
/// the MIDI handler. Emitted events go to the sink; a full sink counts as a failed
/// event.
pub struct DetectionChain<E> {
    engine: E,
    post_processor: PostProcessor,
    midi: MidiEventHandler,
    sink: MidiEventProducer,
    clock: Arc<Clock>,
}

impl<E: InferenceEngine> DetectionChain<E> {
    pub fn new(
        engine: E,
        post_processor: PostProcessor,
        midi: MidiEventHandler,
        sink: MidiEventProducer,
        clock: Arc<Clock>,
    ) -> Self {
        Self {
            engine,
            post_processor,
            midi,
            sink,
            clock,
        }
    }

    pub fn post_processor(&self) -> &PostProcessor {
        &self.post_processor
    }

    pub fn post_processor_mut(&mut self) -> &mut PostProcessor {
        &mut self.post_processor
    }

    pub fn midi(&self) -> &MidiEventHandler {
        &self.midi
    }

    pub fn midi_mut(&mut self) -> &mut MidiEventHandler {
        &mut self.midi
    }

    /// End any sounding note immediately and push its note-off.
    pub fn release(&mut self) {
        let event = self
            .midi
            .release(self.clock.position(), self.clock.host_timestamp());
        if let Some(event) = event {
            self.emit(event);
        }
    }

    fn emit(&mut self, event: MidiEvent) {
        if !self.sink.push(event) {
            self.midi.record_failed_event();
        }
    }
}

impl<E: InferenceEngine> InferenceEngine for DetectionChain<E> {
    fn infer(&mut self, frame: &[f32]) -> Result<InferenceResult, InferenceError> {
        let result = self.engine.infer(frame)?;
        if !result.success {
            return Ok(result);
        }

        self.post_processor.process_confidence(result.confidence);

        let position = self.clock.position();
        let host_timestamp = self.clock.host_timestamp();
        // A due note-off goes out before a new note-on at the same position.
        if let Some(event) = self.midi.process_pending_events(position) {
            self.emit(event);
        }
        let hit = self.post_processor.has_hit();
        if let Some(event) = self.midi.process_hit_state(hit, position, host_timestamp) {
            self.emit(event);
        }

        Ok(result)
    }

    fn reset(&mut self) {
        self.engine.reset();
        self.post_processor.reset();
        self.midi.reset();
    }

    fn name(&self) -> &str {
        self.engine.name()
    }
}
