//! Lock-free single-producer/single-consumer sample ring
//!
//! One ring exists per audio channel. The emulation tick writes through a
//! [`Producer`], the host audio callback reads through a [`Consumer`].
//!
//! - `head` is advanced only by the producer, `tail` only by the consumer
//! - The ring is empty when `head == tail`
//! - The producer never looks at `tail`: a producer that laps the consumer
//!   overwrites unread samples instead of blocking
//! - The consumer never blocks either: missing samples become silence
//!
//! Slots are stored as atomic bit patterns, so an overwrite that races with a
//! read yields a stale sample rather than undefined behaviour. Slot writes are
//! published by the `Release` store of `head` and observed through the
//! `Acquire` load on the consumer side.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// A sample type that fits in a 32-bit slot.
///
/// `Default` must be the silent value for the type.
pub trait Sample: Copy + Default + Send + Sync + 'static {
    fn to_bits(self) -> u32;
    fn from_bits(bits: u32) -> Self;
}

impl Sample for f32 {
    #[inline]
    fn to_bits(self) -> u32 {
        f32::to_bits(self)
    }
    #[inline]
    fn from_bits(bits: u32) -> Self {
        f32::from_bits(bits)
    }
}

impl Sample for i16 {
    #[inline]
    fn to_bits(self) -> u32 {
        self as u16 as u32
    }
    #[inline]
    fn from_bits(bits: u32) -> Self {
        bits as u16 as i16
    }
}

impl Sample for u16 {
    #[inline]
    fn to_bits(self) -> u32 {
        self as u32
    }
    #[inline]
    fn from_bits(bits: u32) -> Self {
        bits as u16
    }
}

impl Sample for i32 {
    #[inline]
    fn to_bits(self) -> u32 {
        self as u32
    }
    #[inline]
    fn from_bits(bits: u32) -> Self {
        bits as i32
    }
}

impl Sample for u32 {
    #[inline]
    fn to_bits(self) -> u32 {
        self
    }
    #[inline]
    fn from_bits(bits: u32) -> Self {
        bits
    }
}

/// Fixed-capacity circular buffer of samples.
///
/// Created once per audio session and split into its two halves with
/// [`RingBuffer::split`]. Capacity never changes after construction.
pub struct RingBuffer<T: Sample> {
    slots: Box<[AtomicU32]>,
    /// Write cursor (producer-owned)
    head: AtomicUsize,
    /// Read cursor (consumer-owned)
    tail: AtomicUsize,
    _sample: PhantomData<T>,
}

impl<T: Sample> RingBuffer<T> {
    /// Create a ring holding `capacity` samples, all silent.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        let silence = T::default().to_bits();
        Self {
            slots: (0..capacity).map(|_| AtomicU32::new(silence)).collect(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            _sample: PhantomData,
        }
    }

    /// Split into the producer and consumer halves.
    pub fn split(self) -> (Producer<T>, Consumer<T>) {
        let ring = Arc::new(self);
        (
            Producer { ring: ring.clone() },
            Consumer { ring },
        )
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Current write cursor
    pub fn head(&self) -> usize {
        self.head.load(Ordering::Acquire)
    }

    /// Current read cursor
    pub fn tail(&self) -> usize {
        self.tail.load(Ordering::Acquire)
    }

    /// Number of unread samples
    ///
    /// After the producer laps the consumer this is only meaningful modulo
    /// capacity.
    pub fn len(&self) -> usize {
        let capacity = self.capacity();
        (self.head() + capacity - self.tail()) % capacity
    }

    pub fn is_empty(&self) -> bool {
        self.head() == self.tail()
    }

    #[inline]
    fn advance(&self, index: usize) -> usize {
        let next = index + 1;
        if next == self.slots.len() { 0 } else { next }
    }

    #[cfg(test)]
    pub(crate) fn slot(&self, index: usize) -> T {
        T::from_bits(self.slots[index].load(Ordering::Relaxed))
    }
}

/// Write half of a [`RingBuffer`]
pub struct Producer<T: Sample> {
    ring: Arc<RingBuffer<T>>,
}

impl<T: Sample> Producer<T> {
    /// Copy `samples` in at `head`, wrapping at the end of storage.
    ///
    /// No overflow check is made against `tail`: if the consumer has fallen
    /// more than a full ring behind, its unread samples are overwritten.
    pub fn push(&mut self, samples: &[T]) {
        let ring = &*self.ring;
        let mut head = ring.head.load(Ordering::Relaxed);
        for &sample in samples {
            ring.slots[head].store(sample.to_bits(), Ordering::Relaxed);
            head = ring.advance(head);
        }
        ring.head.store(head, Ordering::Release);
    }

    pub fn ring(&self) -> &RingBuffer<T> {
        &self.ring
    }
}

/// Read half of a [`RingBuffer`]
pub struct Consumer<T: Sample> {
    ring: Arc<RingBuffer<T>>,
}

impl<T: Sample> Consumer<T> {
    /// Fill `destination` from `tail` forward.
    ///
    /// Returns how many buffered samples were copied. Positions past that
    /// count are set to silence. Never blocks.
    pub fn pop_into(&mut self, destination: &mut [T]) -> usize {
        let ring = &*self.ring;
        let capacity = ring.capacity();
        let head = ring.head.load(Ordering::Acquire);
        let mut tail = ring.tail.load(Ordering::Relaxed);

        let available = (head + capacity - tail) % capacity;
        let count = available.min(destination.len());
        for slot in &mut destination[..count] {
            *slot = T::from_bits(ring.slots[tail].load(Ordering::Relaxed));
            tail = ring.advance(tail);
        }
        ring.tail.store(tail, Ordering::Release);

        destination[count..].fill(T::default());
        count
    }

    pub fn ring(&self) -> &RingBuffer<T> {
        &self.ring
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(capacity: usize) -> (Producer<f32>, Consumer<f32>) {
        RingBuffer::new(capacity).split()
    }

    #[test]
    fn test_pop_returns_pushed_samples_in_order() {
        let (mut producer, mut consumer) = ring(16);
        producer.push(&[0.1, 0.2, 0.3]);
        producer.push(&[0.4, 0.5]);

        let mut out = [9.0; 5];
        assert_eq!(consumer.pop_into(&mut out), 5);
        assert_eq!(out, [0.1, 0.2, 0.3, 0.4, 0.5]);
        assert!(consumer.ring().is_empty());
    }

    #[test]
    fn test_pop_from_empty_is_silence() {
        let (_producer, mut consumer) = ring(8);
        let mut out = [1.0; 6];
        assert_eq!(consumer.pop_into(&mut out), 0);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(consumer.ring().tail(), 0);
    }

    #[test]
    fn test_partial_underrun_pads_with_silence() {
        let (mut producer, mut consumer) = ring(8);
        producer.push(&[0.5, -0.5, 0.25]);

        let mut out = [7.0; 6];
        assert_eq!(consumer.pop_into(&mut out), 3);
        assert_eq!(out, [0.5, -0.5, 0.25, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_wrap_preserves_logical_order() {
        let (mut producer, mut consumer) = RingBuffer::<i32>::new(8).split();

        // Move both cursors to 6
        producer.push(&[0; 6]);
        let mut discard = [0; 6];
        consumer.pop_into(&mut discard);
        assert_eq!(producer.ring().head(), 6);
        assert_eq!(consumer.ring().tail(), 6);

        producer.push(&[1, 2, 3, 4, 5]);
        let ring = producer.ring();
        assert_eq!(ring.head(), 3);
        let stored: Vec<i32> = [6, 7, 0, 1, 2].iter().map(|&i| ring.slot(i)).collect();
        assert_eq!(stored, vec![1, 2, 3, 4, 5]);

        let mut out = [0; 5];
        assert_eq!(consumer.pop_into(&mut out), 5);
        assert_eq!(out, [1, 2, 3, 4, 5]);
        assert_eq!(consumer.ring().tail(), 3);
    }

    #[test]
    fn test_overflow_overwrites_unread_samples() {
        let (mut producer, mut consumer) = RingBuffer::<i16>::new(4).split();
        producer.push(&[1, 2, 3]);
        // Laps the consumer: slots 3, 0, 1 are rewritten
        producer.push(&[4, 5, 6]);

        assert_eq!(producer.ring().head(), 2);
        assert_eq!(producer.ring().len(), 2);

        let mut out = [0; 4];
        assert_eq!(consumer.pop_into(&mut out), 2);
        assert_eq!(out, [5, 6, 0, 0]);
    }

    #[test]
    fn test_len_tracks_cursors() {
        let (mut producer, mut consumer) = ring(10);
        producer.push(&[0.0; 7]);
        assert_eq!(producer.ring().len(), 7);

        let mut out = [0.0; 4];
        consumer.pop_into(&mut out);
        assert_eq!(consumer.ring().len(), 3);

        producer.push(&[0.0; 5]);
        assert_eq!(producer.ring().len(), 8);
        assert_eq!(producer.ring().capacity(), 10);
    }

    #[test]
    fn test_signed_bits_round_trip_through_slots() {
        let (mut producer, mut consumer) = RingBuffer::<i16>::new(4).split();
        producer.push(&[i16::MIN, -1, i16::MAX]);
        let mut out = [0; 3];
        consumer.pop_into(&mut out);
        assert_eq!(out, [i16::MIN, -1, i16::MAX]);
    }

    #[test]
    fn test_cross_thread_stream_arrives_in_order() {
        let (mut producer, mut consumer) = RingBuffer::<u32>::new(4096).split();
        let total = 20_000u32;

        let writer = std::thread::spawn(move || {
            let mut next = 1u32;
            while next <= total {
                // Stay well behind the consumer so nothing is overwritten
                if producer.ring().len() < 1024 {
                    let chunk: Vec<u32> = (next..(next + 64).min(total + 1)).collect();
                    next += chunk.len() as u32;
                    producer.push(&chunk);
                } else {
                    std::thread::yield_now();
                }
            }
        });

        let mut expected = 1u32;
        let mut block = [0u32; 100];
        while expected <= total {
            let got = consumer.pop_into(&mut block);
            for &sample in &block[..got] {
                assert_eq!(sample, expected);
                expected += 1;
            }
            assert!(block[got..].iter().all(|&s| s == 0));
        }
        writer.join().unwrap();
    }

    #[test]
    #[should_panic(expected = "capacity must be non-zero")]
    fn test_zero_capacity_panics() {
        let _ = RingBuffer::<f32>::new(0);
    }
}
