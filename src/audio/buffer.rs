//! Fixed-capacity circular buffer for live audio samples.
//!
//! The capture thread appends while a timer thread drains, so the buffer is
//! shared as [`SharedRingBuffer`] — one mutex covering index and content
//! together.  When full, new samples **overwrite** the oldest unread data:
//! the buffer always holds the most recent `capacity` samples, and overflow
//! is lossy, never an error.
//!
//! # Example
//!
//! ```rust
//! use voicebridge::audio::RingBuffer;
//!
//! let mut buf = RingBuffer::new(4);
//! buf.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]); // 5 items, capacity 4
//! assert_eq!(buf.drain(), vec![2.0, 3.0, 4.0, 5.0]);
//! ```

use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity circular buffer with overwrite-oldest overflow.
///
/// Generic over `T: Copy + Default` so it can store any `Copy` scalar; the
/// audio path uses `RingBuffer<f32>` exclusively.
///
/// `read_pos` marks the oldest unread sample and `write_pos` the next write
/// slot.  When a write would catch up with `read_pos`, the read position is
/// advanced first, discarding the oldest unread sample.
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    read_pos: usize,
    write_pos: usize,
    /// Number of unread samples (≤ `capacity`).
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a ring buffer holding at most `capacity` samples.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            read_pos: 0,
            write_pos: 0,
            len: 0,
        }
    }

    /// Create a buffer sized for a full recording session:
    /// `sample_rate × max_secs × channels` samples.
    pub fn for_recording(sample_rate: u32, max_secs: f32, channels: u16) -> Self {
        let capacity = (sample_rate as f32 * max_secs).ceil() as usize * channels.max(1) as usize;
        Self::new(capacity.max(1))
    }

    /// Append `data`, overwriting the oldest unread samples on overflow.
    pub fn push_slice(&mut self, data: &[T]) {
        for &sample in data {
            if self.len == self.capacity {
                // Full: advance the read position first so the oldest
                // unread sample is discarded, then write over it.
                self.read_pos = (self.read_pos + 1) % self.capacity;
                self.len -= 1;
            }
            self.buf[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.capacity;
            self.len += 1;
        }
    }

    /// Drain everything written since the last read, in chronological order.
    ///
    /// Destructive: the read position advances to the write position, so a
    /// second call without intervening writes returns an empty vector.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        for i in 0..self.len {
            out.push(self.buf[(self.read_pos + i) % self.capacity]);
        }
        self.read_pos = self.write_pos;
        self.len = 0;
        out
    }

    /// Discard all unread samples and reset both positions.
    ///
    /// Called between capture sessions so a new recording never starts with
    /// stale audio.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
        self.len = 0;
    }

    /// Number of unread samples currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when there are no unread samples.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of samples the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` when the next push would overwrite unread data.
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Duration of the unread audio in seconds, assuming mono at `sample_rate`.
    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.len as f32 / sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// SharedRingBuffer
// ---------------------------------------------------------------------------

/// Thread-safe handle to the sample buffer.
///
/// The capture worker pushes under the lock; the orchestrator's poll tick
/// drains under the same lock.  Keep critical sections short — the capture
/// side runs close to the real-time audio path.
pub type SharedRingBuffer = Arc<Mutex<RingBuffer<f32>>>;

/// Construct a [`SharedRingBuffer`] sized for one recording session.
pub fn shared_ring(sample_rate: u32, max_secs: f32, channels: u16) -> SharedRingBuffer {
    Arc::new(Mutex::new(RingBuffer::for_recording(
        sample_rate,
        max_secs,
        channels,
    )))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
