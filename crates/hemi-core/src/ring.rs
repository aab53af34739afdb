//! Bounded sample FIFO backing the sliding-window scheduler.
//!
//! One buffer per channel. Pushing into a full buffer evicts the oldest
//! sample, so a stalled consumer sheds old data instead of blocking the
//! acquisition side. Overlapping windows are realized with
//! [`RingBuffer::snapshot_last`] + [`RingBuffer::advance`] rather than
//! copying on every push.

use std::collections::VecDeque;

/// Fixed-capacity FIFO of channel samples.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buf: VecDeque<f64>,
    capacity: usize,
    evicted: u64,
}

impl RingBuffer {
    /// Creates a buffer holding at most `capacity` samples.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        RingBuffer {
            buf: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Appends a sample, evicting the oldest one when full.
    pub fn push(&mut self, value: f64) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
            self.evicted += 1;
        }
        self.buf.push_back(value);
    }

    /// Copies the most recent `n` samples, oldest first, without
    /// consuming them. Returns `None` if fewer than `n` are buffered.
    pub fn snapshot_last(&self, n: usize) -> Option<Vec<f64>> {
        if self.buf.len() < n {
            return None;
        }
        let start = self.buf.len() - n;
        Some(self.buf.iter().skip(start).copied().collect())
    }

    /// Drops the oldest `h` samples (or everything, if fewer remain).
    pub fn advance(&mut self, h: usize) {
        let drop = h.min(self.buf.len());
        self.buf.drain(..drop);
    }

    /// Number of buffered samples.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Maximum number of samples held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples dropped because the buffer was full when pushed into.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Removes all buffered samples.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_snapshot() {
        let mut ring = RingBuffer::new(8);
        for i in 0..5 {
            ring.push(i as f64);
        }
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.snapshot_last(3), Some(vec![2.0, 3.0, 4.0]));
        // Snapshot does not consume.
        assert_eq!(ring.len(), 5);
    }

    #[test]
    fn snapshot_short_returns_none() {
        let mut ring = RingBuffer::new(4);
        ring.push(1.0);
        assert_eq!(ring.snapshot_last(2), None);
    }

    #[test]
    fn eviction_on_full() {
        let mut ring = RingBuffer::new(3);
        for i in 0..5 {
            ring.push(i as f64);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.evicted(), 2);
        assert_eq!(ring.snapshot_last(3), Some(vec![2.0, 3.0, 4.0]));
    }

    #[test]
    fn advance_drops_oldest() {
        let mut ring = RingBuffer::new(8);
        for i in 0..6 {
            ring.push(i as f64);
        }
        ring.advance(4);
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.snapshot_last(2), Some(vec![4.0, 5.0]));
        // Advancing past the end empties the buffer without panicking.
        ring.advance(10);
        assert!(ring.is_empty());
    }

    #[test]
    fn overlapping_window_semantics() {
        // Window of 4, hop of 2: consecutive snapshots share two samples.
        let mut ring = RingBuffer::new(8);
        for i in 0..4 {
            ring.push(i as f64);
        }
        let w1 = ring.snapshot_last(4).unwrap();
        ring.advance(2);
        for i in 4..6 {
            ring.push(i as f64);
        }
        let w2 = ring.snapshot_last(4).unwrap();
        assert_eq!(w1, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(w2, vec![2.0, 3.0, 4.0, 5.0]);
    }
}
