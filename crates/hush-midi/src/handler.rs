//! Hit-state to note conversion.

use crate::config::MidiConfig;
use crate::event::{MidiEvent, MidiEventKind};
use crate::stats::{MidiStatistics, MidiStats};
use crate::utils::note_name;
use hush_core::AtomicFlag;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteState {
    /// Idle.
    NoteOff,
    /// Sounding.
    NoteOn,
    /// Sounding, with a note-off scheduled at a later sample position.
    PendingNoteOff,
}

/// Identity of the note-on that is currently sounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SoundingNote {
    channel: u8,
    note: u8,
}

struct Shared {
    note_on: AtomicFlag,
    stats: MidiStats,
}

/// Cloneable read-only view of a [`MidiEventHandler`] for other threads.
#[derive(Clone)]
pub struct MidiHandlerMonitor {
    shared: Arc<Shared>,
}

impl MidiHandlerMonitor {
    pub fn is_note_on(&self) -> bool {
        self.shared.note_on.get()
    }

    pub fn statistics(&self) -> MidiStatistics {
        self.shared.stats.snapshot()
    }
}

/// Turns hit on/off transitions into note-on/note-off events.
///
/// Only edges produce events: reporting the same hit state twice in a row never emits
/// anything. With a nonzero `note_off_delay` the note-off is held back until
/// [`process_pending_events`](Self::process_pending_events) reaches the scheduled
/// sample position.
///
/// ```
/// use hush_midi::{MidiConfig, MidiEventHandler, MidiEventKind};
///
/// let mut handler = MidiEventHandler::new(MidiConfig::default());
/// let on = handler.process_hit_state(true, 0, 0).unwrap();
/// assert_eq!(on.kind, MidiEventKind::NoteOn);
///
/// assert!(handler.process_hit_state(false, 480, 0).is_none());
/// assert!(handler.process_pending_events(560).is_none());
/// let off = handler.process_pending_events(580).unwrap();
/// assert_eq!(off.kind, MidiEventKind::NoteOff);
/// ```
pub struct MidiEventHandler {
    config: MidiConfig,
    state: NoteState,
    last_hit_state: bool,
    note_off_at: Option<u64>,
    /// Host time of the falling edge that scheduled `note_off_at`.
    note_off_host_timestamp: u64,
    sounding: Option<SoundingNote>,
    shared: Arc<Shared>,
}

impl MidiEventHandler {
    pub fn new(config: MidiConfig) -> Self {
        let config = config.validated();
        tracing::info!(
            "MIDI handler: note {} ({}), velocity {}, channel {}, note-off {}",
            config.hit_note,
            note_name(config.hit_note),
            config.hit_velocity,
            config.channel,
            if !config.send_note_off {
                "disabled".to_string()
            } else if config.note_off_delay == 0 {
                "immediate".to_string()
            } else {
                format!("after {} samples", config.note_off_delay)
            }
        );

        Self {
            config,
            state: NoteState::NoteOff,
            last_hit_state: false,
            note_off_at: None,
            note_off_host_timestamp: 0,
            sounding: None,
            shared: Arc::new(Shared {
                note_on: AtomicFlag::new(false),
                stats: MidiStats::default(),
            }),
        }
    }

    pub fn config(&self) -> &MidiConfig {
        &self.config
    }

    pub fn state(&self) -> NoteState {
        self.state
    }

    /// True while the note is sounding, including while a note-off is pending.
    pub fn is_note_on(&self) -> bool {
        self.state != NoteState::NoteOff
    }

    pub fn pending_note_off_at(&self) -> Option<u64> {
        self.note_off_at
    }

    pub fn monitor(&self) -> MidiHandlerMonitor {
        MidiHandlerMonitor {
            shared: self.shared.clone(),
        }
    }

    /// Report the current hit state. Returns an event only on an edge that emits one.
    pub fn process_hit_state(
        &mut self,
        hit: bool,
        sample_offset: u64,
        host_timestamp: u64,
    ) -> Option<MidiEvent> {
        if hit == self.last_hit_state {
            return None;
        }
        self.last_hit_state = hit;

        match (hit, self.state) {
            (true, NoteState::NoteOff) => {
                self.set_state(NoteState::NoteOn);
                Some(self.create_event(MidiEventKind::NoteOn, sample_offset, host_timestamp))
            }
            (true, NoteState::PendingNoteOff) => {
                // Still sounding; keep it on rather than cutting the new hit short.
                tracing::debug!("Hit restarted before scheduled note-off, cancelling it");
                self.note_off_at = None;
                self.set_state(NoteState::NoteOn);
                None
            }
            (false, NoteState::NoteOn) => {
                if !self.config.send_note_off {
                    self.sounding = None;
                    self.set_state(NoteState::NoteOff);
                    None
                } else if self.config.note_off_delay == 0 {
                    self.set_state(NoteState::NoteOff);
                    Some(self.create_event(MidiEventKind::NoteOff, sample_offset, host_timestamp))
                } else {
                    let at = sample_offset.saturating_add(self.config.note_off_delay);
                    tracing::debug!("Note-off scheduled at sample {}", at);
                    self.note_off_at = Some(at);
                    self.note_off_host_timestamp = host_timestamp;
                    self.set_state(NoteState::PendingNoteOff);
                    None
                }
            }
            _ => None,
        }
    }

    /// Emit the scheduled note-off once `current_sample_offset` reaches it.
    pub fn process_pending_events(&mut self, current_sample_offset: u64) -> Option<MidiEvent> {
        match self.note_off_at {
            Some(at) if current_sample_offset >= at => {
                self.note_off_at = None;
                self.set_state(NoteState::NoteOff);
                Some(self.create_event(
                    MidiEventKind::NoteOff,
                    current_sample_offset,
                    self.note_off_host_timestamp,
                ))
            }
            _ => None,
        }
    }

    /// End a sounding note right away, then [`reset`](Self::reset).
    ///
    /// Used when detection stops so no note is left hanging. Returns the note-off if a
    /// note was sounding (pending or not) and note-offs are enabled.
    pub fn release(&mut self, sample_offset: u64, host_timestamp: u64) -> Option<MidiEvent> {
        let event = (self.is_note_on() && self.config.send_note_off)
            .then(|| self.create_event(MidiEventKind::NoteOff, sample_offset, host_timestamp));
        self.reset();
        event
    }

    /// Count an event the sink rejected.
    pub fn record_failed_event(&self) {
        self.shared.stats.failed_events.increment();
    }

    /// Force `NoteOff` and drop any scheduled note-off. Emits nothing.
    pub fn reset(&mut self) {
        self.last_hit_state = false;
        self.note_off_at = None;
        self.note_off_host_timestamp = 0;
        self.sounding = None;
        self.set_state(NoteState::NoteOff);
        tracing::debug!("MIDI handler reset");
    }

    /// Apply new settings. A note already sounding keeps its pending note-off, and
    /// that note-off still targets the note and channel the note-on went out on.
    pub fn update_config(&mut self, config: MidiConfig) {
        self.config = config.validated();
        tracing::debug!("MIDI handler configuration updated");
    }

    pub fn statistics(&self) -> MidiStatistics {
        self.shared.stats.snapshot()
    }

    pub fn reset_statistics(&self) {
        self.shared.stats.reset();
    }

    fn set_state(&mut self, state: NoteState) {
        self.state = state;
        self.shared.note_on.set(state != NoteState::NoteOff);
    }

    fn create_event(
        &mut self,
        kind: MidiEventKind,
        sample_offset: u64,
        host_timestamp: u64,
    ) -> MidiEvent {
        let target = match kind {
            MidiEventKind::NoteOn => {
                let note = SoundingNote {
                    channel: self.config.channel,
                    note: self.config.hit_note,
                };
                self.sounding = Some(note);
                note
            }
            MidiEventKind::NoteOff => self.sounding.take().unwrap_or(SoundingNote {
                channel: self.config.channel,
                note: self.config.hit_note,
            }),
        };
        let event = MidiEvent {
            kind,
            channel: target.channel,
            note: target.note,
            velocity: match kind {
                MidiEventKind::NoteOn => self.config.hit_velocity,
                MidiEventKind::NoteOff => 0,
            },
            sample_offset,
            host_timestamp: if self.config.use_host_timestamp {
                host_timestamp
            } else {
                0
            },
        };

        let stats = &self.shared.stats;
        stats.total_events.increment();
        stats.last_event_timestamp.set(event.host_timestamp);
        match kind {
            MidiEventKind::NoteOn => stats.note_on_events.increment(),
            MidiEventKind::NoteOff => stats.note_off_events.increment(),
        }

        tracing::trace!(
            "{:?} note {} at sample {}",
            kind,
            event.note,
            event.sample_offset
        );
        event
    }
}

impl Default for MidiEventHandler {
    fn default() -> Self {
        Self::new(MidiConfig::default())
    }
}
