//! Note events produced by the handler.

use midi_msg::{Channel, ChannelVoiceMsg, MidiMsg};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MidiEventKind {
    NoteOn,
    NoteOff,
}

/// Note event positioned in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    pub kind: MidiEventKind,
    /// Zero-based channel.
    pub channel: u8,
    pub note: u8,
    /// 0 for note-off.
    pub velocity: u8,
    /// Sample position the event belongs at.
    pub sample_offset: u64,
    /// Host timestamp, or 0 when host timestamps are disabled.
    pub host_timestamp: u64,
}

impl MidiEvent {
    #[inline]
    pub fn is_note_on(&self) -> bool {
        self.kind == MidiEventKind::NoteOn
    }

    pub fn to_midi_msg(&self) -> MidiMsg {
        let msg = match self.kind {
            MidiEventKind::NoteOn => ChannelVoiceMsg::NoteOn {
                note: self.note,
                velocity: self.velocity,
            },
            MidiEventKind::NoteOff => ChannelVoiceMsg::NoteOff {
                note: self.note,
                velocity: self.velocity,
            },
        };
        MidiMsg::ChannelVoice {
            channel: Channel::from_u8(self.channel),
            msg,
        }
    }

    /// Wire bytes (status, note, velocity).
    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_midi_msg().to_midi()
    }
}
