use hush_core::Counter;

/// MIDI handler statistics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MidiStatistics {
    pub note_on_events: u64,
    pub note_off_events: u64,
    pub total_events: u64,
    /// Events the sink could not accept.
    pub failed_events: u64,
    pub last_event_timestamp: u64,
}

#[derive(Debug, Default)]
pub(crate) struct MidiStats {
    pub note_on_events: Counter,
    pub note_off_events: Counter,
    pub total_events: Counter,
    pub failed_events: Counter,
    pub last_event_timestamp: Counter,
}

impl MidiStats {
    pub fn snapshot(&self) -> MidiStatistics {
        MidiStatistics {
            note_on_events: self.note_on_events.get(),
            note_off_events: self.note_off_events.get(),
            total_events: self.total_events.get(),
            failed_events: self.failed_events.get(),
            last_event_timestamp: self.last_event_timestamp.get(),
        }
    }

    pub fn reset(&self) {
        self.note_on_events.reset();
        self.note_off_events.reset();
        self.total_events.reset();
        self.failed_events.reset();
        self.last_event_timestamp.reset();
    }
}
