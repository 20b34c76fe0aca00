//! The audio ring buffer: a fixed 32-slot, 4096-byte-per-slot SPSC queue
//! between the scheduler (producer, called from the main playback thread)
//! and the audio callback (consumer, called from a realtime audio thread).
//!
//! An explicit atomic handoff is used rather than relying on plain
//! integer writes being atomic by convention, so `used` is the single
//! release/acquire barrier between the two sides: the
//! producer publishes a filled slot by incrementing `used` with `Release`
//! ordering after the slot's bytes are written, and the consumer only
//! reads a slot after observing `used > 0` with `Acquire` ordering.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crate::format::{AUDIO_MAX_CHUNK, AUDIO_RING_SLOTS};

struct Slot {
    len: AtomicUsize,
    buf: [u8; AUDIO_MAX_CHUNK],
}

impl Default for Slot {
    fn default() -> Self {
        Slot {
            len: AtomicUsize::new(0),
            buf: [0u8; AUDIO_MAX_CHUNK],
        }
    }
}

/// Fixed-capacity single-producer/single-consumer byte-chunk queue.
pub struct Ring {
    slots: Box<[Slot; AUDIO_RING_SLOTS]>,
    read: AtomicUsize,
    write: AtomicUsize,
    used: AtomicUsize,
}

impl Ring {
    pub fn new() -> Self {
        Ring {
            slots: Box::new(std::array::from_fn(|_| Slot::default())),
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
            used: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        AUDIO_RING_SLOTS
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        self.used() == self.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.used() == 0
    }

    /// Block in ~10ms increments while the ring is full, exactly like the
    /// original's `SDL_Delay(10)` spin in `ParseAudio`. `should_stop` is
    /// polled each iteration so playback stop/seek can break the wait.
    pub fn wait_while_full(&self, should_stop: impl Fn() -> bool) {
        if self.is_full() {
            tracing::debug!(capacity = self.capacity(), "ring buffer full, stalling producer");
        }
        while self.is_full() && !should_stop() {
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Producer: push one chunk into the next free slot. Panics if the
    /// ring is full — callers must `wait_while_full` first.
    pub fn push(&self, data: &[u8]) {
        assert!(!self.is_full(), "push into a full ring buffer");
        assert!(
            data.len() <= AUDIO_MAX_CHUNK,
            "chunk of {} bytes exceeds ring slot capacity {}",
            data.len(),
            AUDIO_MAX_CHUNK
        );

        let write = self.write.load(Ordering::Relaxed);
        let slot = &self.slots[write];

        // Safety for the SPSC contract: only the producer ever writes to
        // this slot's buffer, and it only does so for a slot the consumer
        // has already released (used < capacity guarantees that).
        let slot_buf = slot.buf.as_ptr() as *mut u8;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), slot_buf, data.len());
        }
        slot.len.store(data.len(), Ordering::Relaxed);

        self.write
            .store((write + 1) % AUDIO_RING_SLOTS, Ordering::Relaxed);
        self.used.fetch_add(1, Ordering::Release);
    }

    /// Consumer: drain up to `dst.len()` bytes across one or more queued
    /// chunks, partially consuming the front chunk if it doesn't fit.
    /// Never blocks; if the ring is empty, `dst` is left untouched and
    /// `0` is returned (matching `SMJPEG_feedaudio`'s "no data, no copy"
    /// behavior rather than zero-filling `dst`).
    pub fn feed(&self, dst: &mut [u8]) -> usize {
        let mut filled = 0;
        while filled < dst.len() && self.used() > 0 {
            let read = self.read.load(Ordering::Relaxed);
            let slot = &self.slots[read];
            let slot_len = slot.len.load(Ordering::Relaxed);
            let remaining = dst.len() - filled;

            if slot_len <= remaining {
                dst[filled..filled + slot_len].copy_from_slice(&slot.buf[..slot_len]);
                filled += slot_len;
                self.read.store((read + 1) % AUDIO_RING_SLOTS, Ordering::Relaxed);
                self.used.fetch_sub(1, Ordering::Release);
            } else {
                dst[filled..filled + remaining].copy_from_slice(&slot.buf[..remaining]);
                let left = slot_len - remaining;
                // Shift the unconsumed tail to the front of the slot so
                // the next `feed` call sees it starting at offset 0.
                let slot_buf = slot.buf.as_ptr() as *mut u8;
                unsafe {
                    std::ptr::copy(slot_buf.add(remaining), slot_buf, left);
                }
                slot.len.store(left, Ordering::Relaxed);
                filled += remaining;
            }
        }
        filled
    }
}

impl Default for Ring {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_feeds_nothing() {
        let ring = Ring::new();
        let mut dst = [0xAAu8; 16];
        assert_eq!(ring.feed(&mut dst), 0);
        assert_eq!(dst, [0xAAu8; 16]);
    }

    #[test]
    fn pushes_and_drains_in_order() {
        let ring = Ring::new();
        ring.push(b"hello");
        ring.push(b"world");
        assert_eq!(ring.used(), 2);

        let mut dst = [0u8; 5];
        assert_eq!(ring.feed(&mut dst), 5);
        assert_eq!(&dst, b"hello");
        assert_eq!(ring.used(), 1);

        assert_eq!(ring.feed(&mut dst), 5);
        assert_eq!(&dst, b"world");
        assert_eq!(ring.used(), 0);
    }

    #[test]
    fn partial_drain_leaves_remainder_at_front_of_slot() {
        let ring = Ring::new();
        ring.push(b"abcdef");

        let mut dst = [0u8; 3];
        assert_eq!(ring.feed(&mut dst), 3);
        assert_eq!(&dst, b"abc");
        assert_eq!(ring.used(), 1, "partially drained chunk stays queued");

        let mut dst2 = [0u8; 3];
        assert_eq!(ring.feed(&mut dst2), 3);
        assert_eq!(&dst2, b"def");
        assert_eq!(ring.used(), 0);
    }

    #[test]
    fn fills_capacity_and_reports_full() {
        let ring = Ring::new();
        for _ in 0..ring.capacity() {
            ring.push(b"x");
        }
        assert!(ring.is_full());
    }

    #[test]
    #[should_panic(expected = "push into a full ring buffer")]
    fn push_past_capacity_panics() {
        let ring = Ring::new();
        for _ in 0..=ring.capacity() {
            ring.push(b"x");
        }
    }

    #[test]
    fn concurrent_producer_consumer_preserves_byte_stream() {
        use std::sync::Arc;

        let ring = Arc::new(Ring::new());
        let producer_ring = Arc::clone(&ring);

        let total_chunks = 200usize;
        let producer = thread::spawn(move || {
            for i in 0..total_chunks {
                let byte = (i % 256) as u8;
                producer_ring.wait_while_full(|| false);
                producer_ring.push(&[byte; 8]);
            }
        });

        let mut received = Vec::new();
        while received.len() < total_chunks * 8 {
            let mut buf = [0u8; 8];
            let n = ring.feed(&mut buf);
            if n > 0 {
                received.extend_from_slice(&buf[..n]);
            } else {
                thread::sleep(Duration::from_micros(100));
            }
        }
        producer.join().unwrap();

        for (i, chunk) in received.chunks(8).enumerate() {
            assert!(chunk.iter().all(|&b| b == (i % 256) as u8));
        }
    }
}
