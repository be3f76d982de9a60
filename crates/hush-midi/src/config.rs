use crate::utils::{is_valid_channel, is_valid_note, is_valid_velocity, note_name};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HIT_NOTE: u8 = 45;
pub const DEFAULT_HIT_VELOCITY: u8 = 127;
pub const DEFAULT_CHANNEL: u8 = 0;

/// MIDI output settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    /// Note sent for every hit (A2 by default).
    pub hit_note: u8,
    pub hit_velocity: u8,
    /// Zero-based channel (0-15).
    pub channel: u8,
    pub send_note_off: bool,
    /// Samples between the end of a hit and its note-off; 0 sends it immediately.
    pub note_off_delay: u64,
    /// Stamp events with the host timestamp instead of 0.
    pub use_host_timestamp: bool,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            hit_note: DEFAULT_HIT_NOTE,
            hit_velocity: DEFAULT_HIT_VELOCITY,
            channel: DEFAULT_CHANNEL,
            send_note_off: true,
            note_off_delay: 100,
            use_host_timestamp: true,
        }
    }
}

impl MidiConfig {
    /// Copy with out-of-range note, velocity and channel replaced by the defaults.
    pub fn validated(&self) -> Self {
        let mut config = *self;

        if !is_valid_note(config.hit_note) {
            tracing::warn!(
                "Invalid hit note {}, using {} ({})",
                config.hit_note,
                DEFAULT_HIT_NOTE,
                note_name(DEFAULT_HIT_NOTE)
            );
            config.hit_note = DEFAULT_HIT_NOTE;
        }
        if !is_valid_velocity(config.hit_velocity) {
            tracing::warn!(
                "Invalid velocity {}, using {}",
                config.hit_velocity,
                DEFAULT_HIT_VELOCITY
            );
            config.hit_velocity = DEFAULT_HIT_VELOCITY;
        }
        if !is_valid_channel(config.channel) {
            tracing::warn!(
                "Invalid MIDI channel {}, using {}",
                config.channel,
                DEFAULT_CHANNEL
            );
            config.channel = DEFAULT_CHANNEL;
        }

        config
    }
}
