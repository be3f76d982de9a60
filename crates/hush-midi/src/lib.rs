//! MIDI output for the hush detection pipeline.
//!
//! [`MidiEventHandler`] turns the post-processor's hit on/off transitions into note
//! events, optionally delaying the note-off by a number of samples. Events travel to
//! the reader through a lock-free [`midi_event_channel`].

pub mod config;
pub mod event;
pub mod handler;
pub mod output;
mod stats;
pub mod utils;

pub use config::MidiConfig;
pub use event::{MidiEvent, MidiEventKind};
pub use handler::{MidiEventHandler, MidiHandlerMonitor, NoteState};
pub use output::{midi_event_channel, MidiEventConsumer, MidiEventProducer, DEFAULT_EVENT_CAPACITY};
pub use stats::MidiStatistics;
pub use utils::{is_valid_channel, is_valid_note, is_valid_velocity, note_name};

pub use midi_msg::{Channel, ChannelVoiceMsg, MidiMsg};
