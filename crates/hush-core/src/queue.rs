//! Bounded single-producer/single-consumer queue for moving samples off the audio thread.
//!
//! The queue is a power-of-two ring with one slot sacrificed to tell "full" from
//! "empty", so a queue created with capacity `N` holds `N - 1` items. The producer
//! publishes the write index with release ordering after the slot is written; the
//! consumer acquires it before reading, and the same pairing runs the other way for
//! the read index.
//!
//! Neither side blocks or allocates after [`bounded_queue`] returns. The handles are
//! not `Clone`, which is what keeps the queue single-producer and single-consumer.
//!
//! # Example
//!
//! ```
//! use hush_core::queue::bounded_queue;
//!
//! let (mut tx, mut rx) = bounded_queue::<f32>(8);
//! assert!(tx.push(0.5));
//! assert_eq!(rx.pop(), Some(0.5));
//! assert_eq!(rx.pop(), None);
//! ```

use crate::lockfree::CacheAligned;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Default ring size for decimated audio (about 128ms at 16kHz).
pub const DEFAULT_QUEUE_CAPACITY: usize = 2048;

struct Ring<T> {
    /// Next slot to read. Written only by the consumer.
    read: CacheAligned<AtomicUsize>,
    /// Next slot to write. Written only by the producer.
    write: CacheAligned<AtomicUsize>,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
}

// SAFETY: a slot is only ever accessed by the producer before it is published and by
// the consumer after it is published; the acquire/release pairs on `read`/`write`
// order those accesses.
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T: Copy> Ring<T> {
    fn with_slots(slots: usize) -> Self {
        let slots = slots.max(2).next_power_of_two();
        let storage = (0..slots)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            read: CacheAligned(AtomicUsize::new(0)),
            write: CacheAligned(AtomicUsize::new(0)),
            slots: storage,
            mask: slots - 1,
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.mask
    }

    #[inline]
    fn size(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        write.wrapping_sub(read) & self.mask
    }

    /// # Safety
    /// Caller must be the single producer and `index` must be a free slot.
    #[inline]
    unsafe fn write_slot(&self, index: usize, item: T) {
        (*self.slots[index].get()).write(item);
    }

    /// # Safety
    /// Caller must be the single consumer and `index` must be a published slot.
    #[inline]
    unsafe fn read_slot(&self, index: usize) -> T {
        (*self.slots[index].get()).assume_init()
    }
}

/// Create a queue whose ring has `capacity` slots (rounded up to a power of two).
///
/// Usable capacity is one less than the ring size.
pub fn bounded_queue<T: Copy + Send>(capacity: usize) -> (QueueProducer<T>, QueueConsumer<T>) {
    let ring = Arc::new(Ring::with_slots(capacity));
    (
        QueueProducer { ring: ring.clone() },
        QueueConsumer { ring },
    )
}

/// Writing half of a bounded queue. Owned by the audio thread.
pub struct QueueProducer<T> {
    ring: Arc<Ring<T>>,
}

impl<T: Copy + Send> QueueProducer<T> {
    /// Push one item. Returns false, leaving the queue untouched, if it is full.
    #[inline]
    pub fn push(&mut self, item: T) -> bool {
        let ring = &*self.ring;
        let write = ring.write.load(Ordering::Relaxed);
        let next = (write + 1) & ring.mask;
        if next == ring.read.load(Ordering::Acquire) {
            return false;
        }
        // SAFETY: `write` is not visible to the consumer until the store below.
        unsafe { ring.write_slot(write, item) };
        ring.write.store(next, Ordering::Release);
        true
    }

    /// Push as many items from the front of `items` as fit. Returns the count pushed.
    pub fn push_bulk(&mut self, items: &[T]) -> usize {
        let ring = &*self.ring;
        let mut write = ring.write.load(Ordering::Relaxed);
        let read = ring.read.load(Ordering::Acquire);
        let free = ring.capacity() - (write.wrapping_sub(read) & ring.mask);
        let count = free.min(items.len());

        for &item in &items[..count] {
            // SAFETY: the first `free` slots past `write` are owned by the producer.
            unsafe { ring.write_slot(write, item) };
            write = (write + 1) & ring.mask;
        }
        if count > 0 {
            ring.write.store(write, Ordering::Release);
        }
        count
    }

    /// Approximate number of queued items. Diagnostics only.
    #[inline]
    pub fn size(&self) -> usize {
        self.ring.size()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.size() == self.capacity()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Reading half of a bounded queue. Owned by the inference worker.
pub struct QueueConsumer<T> {
    ring: Arc<Ring<T>>,
}

impl<T: Copy + Send> QueueConsumer<T> {
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        let ring = &*self.ring;
        let read = ring.read.load(Ordering::Relaxed);
        if read == ring.write.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: the acquire load above makes the producer's write to `read` visible.
        let item = unsafe { ring.read_slot(read) };
        ring.read.store((read + 1) & ring.mask, Ordering::Release);
        Some(item)
    }

    /// Copy of the next item without consuming it.
    #[inline]
    pub fn peek(&self) -> Option<T> {
        let ring = &*self.ring;
        let read = ring.read.load(Ordering::Relaxed);
        if read == ring.write.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: see `pop`; the slot stays owned by the consumer until `read` moves.
        Some(unsafe { ring.read_slot(read) })
    }

    /// Pop up to `out.len()` items into `out`. Returns the count popped.
    pub fn pop_bulk(&mut self, out: &mut [T]) -> usize {
        let ring = &*self.ring;
        let mut read = ring.read.load(Ordering::Relaxed);
        let write = ring.write.load(Ordering::Acquire);
        let available = write.wrapping_sub(read) & ring.mask;
        let count = available.min(out.len());

        for slot in &mut out[..count] {
            // SAFETY: every slot between `read` and `write` has been published.
            *slot = unsafe { ring.read_slot(read) };
            read = (read + 1) & ring.mask;
        }
        if count > 0 {
            ring.read.store(read, Ordering::Release);
        }
        count
    }

    /// Discard everything currently queued.
    ///
    /// Items pushed concurrently with the call may survive it; only call this while
    /// the producer is idle (activation, deactivation, sample-rate changes).
    pub fn clear(&mut self) {
        let write = self.ring.write.load(Ordering::Acquire);
        self.ring.read.store(write, Ordering::Release);
    }

    /// Approximate number of queued items. Diagnostics only.
    #[inline]
    pub fn size(&self) -> usize {
        self.ring.size()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.size() == self.capacity()
    }
}
