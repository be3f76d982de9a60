//! Lock-free event sink between the detection worker and the event reader.

use crate::event::MidiEvent;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Writing half, owned by the detection worker.
pub struct MidiEventProducer {
    producer: HeapProd<MidiEvent>,
}

impl MidiEventProducer {
    /// Returns false if the sink is full; the event is dropped.
    #[inline]
    pub fn push(&mut self, event: MidiEvent) -> bool {
        self.producer.try_push(event).is_ok()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.producer.is_full()
    }
}

/// Reading half.
pub struct MidiEventConsumer {
    consumer: HeapCons<MidiEvent>,
}

impl MidiEventConsumer {
    #[inline]
    pub fn pop(&mut self) -> Option<MidiEvent> {
        self.consumer.try_pop()
    }

    /// Append every pending event to `out`, returning how many were moved.
    pub fn drain_into(&mut self, out: &mut Vec<MidiEvent>) -> usize {
        let before = out.len();
        out.extend(self.consumer.pop_iter());
        out.len() - before
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.consumer.is_empty()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.consumer.occupied_len()
    }

    pub fn clear(&mut self) {
        self.consumer.clear();
    }
}

/// Create an event sink holding up to `capacity` events.
pub fn midi_event_channel(capacity: usize) -> (MidiEventProducer, MidiEventConsumer) {
    let (producer, consumer) = HeapRb::new(capacity.max(1)).split();
    (
        MidiEventProducer { producer },
        MidiEventConsumer { consumer },
    )
}
