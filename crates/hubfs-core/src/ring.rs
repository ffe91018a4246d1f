//! The hub's circular byte buffer.
//!
//! Unlike `ringmpsc`'s lock-free SPSC ring, this ring is read and written
//! exclusively from inside a single locked dispatch call (see `hub.rs`), so
//! there is no need for atomics or unsafe cells here — plain indices over a
//! `Vec<u8>` are enough, and considerably easier to get right.

use crate::config::WRAP_SLACK;

/// A fixed-size circular byte store with a single write cursor and a wrap
/// marker.
///
/// Readers are tracked externally (see `msgq.rs`); the ring only knows
/// about the write side and the byte contents.
#[derive(Debug)]
pub struct RingBuffer {
    bucket: Vec<u8>,
    /// Next position to write to, offset from the start of `bucket`.
    write_cursor: usize,
    /// Highest valid offset in the current epoch; readers at or past this
    /// snap back to the start on their next dispatch.
    wrap_limit: usize,
    /// Total bytes considered valid in the current epoch.
    filled: usize,
}

impl RingBuffer {
    /// Creates a new ring of the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is smaller than [`WRAP_SLACK`], since no write
    /// could ever land without immediately forcing a wrap.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity > WRAP_SLACK,
            "ring capacity must exceed the wrap slack ({WRAP_SLACK})"
        );
        Self {
            bucket: vec![0u8; capacity],
            write_cursor: 0,
            wrap_limit: capacity,
            filled: 0,
        }
    }

    /// Total capacity `B` of the ring.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.bucket.len()
    }

    #[inline]
    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    #[inline]
    pub fn wrap_limit(&self) -> usize {
        self.wrap_limit
    }

    #[inline]
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Returns `true` if writing `n` more bytes would cross into the
    /// safety slack at the end of the bucket, forcing a wrap first.
    #[inline]
    pub fn would_wrap(&self, n: usize) -> bool {
        self.filled + n >= self.capacity() - WRAP_SLACK
    }

    /// Wraps the ring: the old write cursor becomes the new wrap limit,
    /// and writing resumes from the start of the bucket.
    ///
    /// Readers whose `next_read` has fallen at or past the new
    /// `wrap_limit` are responsible for snapping back to the start
    /// themselves (see `MessageQueue::catch_up_to_wrap`); the ring itself
    /// doesn't track readers.
    pub fn wrap(&mut self) {
        self.wrap_limit = self.write_cursor;
        self.write_cursor = 0;
        self.filled = 0;
    }

    /// Appends `data` at the current write cursor.
    ///
    /// Callers must ensure `would_wrap(data.len())` is false (i.e. call
    /// [`Self::wrap`] first if it isn't) — this never splits a write
    /// across a wrap.
    ///
    /// # Panics
    ///
    /// Panics if `data` would run past the end of the bucket. This is a
    /// fatal, unrecoverable condition per the error taxonomy: it means the
    /// caller failed to wrap first.
    pub fn write(&mut self, data: &[u8]) {
        let end = self.write_cursor + data.len();
        assert!(
            end <= self.bucket.len(),
            "write_cursor would exceed bucket: cursor {} + {} > capacity {}",
            self.write_cursor,
            data.len(),
            self.bucket.len()
        );
        self.bucket[self.write_cursor..end].copy_from_slice(data);
        self.write_cursor = end;
        if self.write_cursor > self.wrap_limit {
            self.wrap_limit = self.write_cursor;
        }
        self.filled += data.len();
    }

    /// Copies `count` bytes starting at `from` into a freshly allocated
    /// vector. Used by the read path once the caller has already clamped
    /// `count` to stay within bounds.
    pub fn read_at(&self, from: usize, count: usize) -> Vec<u8> {
        self.bucket[from..from + count].to_vec()
    }

    /// Random-access write used by freeze mode: places `data` at
    /// `offset mod capacity`, ignoring the queueing/wrap protocol.
    pub fn write_at_offset(&mut self, offset: usize, data: &[u8]) {
        let cap = self.capacity();
        let mut off = offset % cap.max(1);
        self.write_cursor = off;
        self.filled = self.write_cursor;
        if self.filled + data.len() >= cap {
            off = 0;
            self.write_cursor = 0;
            self.filled = 0;
        }
        let end = off + data.len();
        self.bucket[off..end].copy_from_slice(data);
        self.write_cursor = end;
        self.filled += data.len();
    }

    /// Zaps the buffer back to empty: `filled := 0`, `write_cursor :=
    /// bucket_start`. Used when an `OTRUNC` open lands on an `allowzap`
    /// server.
    pub fn reset(&mut self) {
        self.write_cursor = 0;
        self.wrap_limit = self.bucket.len();
        self.filled = 0;
    }

    /// Random-access read used by freeze mode.
    pub fn read_at_offset(&self, offset: usize, count: usize) -> Vec<u8> {
        let cap = self.capacity();
        let off = offset % cap.max(1);
        let mut n = count;
        if off >= self.filled {
            return Vec::new();
        }
        if off + n >= self.filled {
            n = self.filled - off;
        }
        self.bucket[off..off + n].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_advances_cursor_and_filled() {
        let mut ring = RingBuffer::new(64);
        ring.write(b"hello");
        assert_eq!(ring.write_cursor(), 5);
        assert_eq!(ring.filled(), 5);
    }

    #[test]
    fn wrap_resets_cursor_and_marks_limit() {
        let mut ring = RingBuffer::new(64);
        ring.write(b"0123456789");
        ring.wrap();
        assert_eq!(ring.write_cursor(), 0);
        assert_eq!(ring.wrap_limit(), 10);
        assert_eq!(ring.filled(), 0);
    }

    #[test]
    fn would_wrap_respects_slack() {
        let ring = RingBuffer::new(32);
        // capacity 32, slack 16: filled=0, writing 16 bytes lands exactly at
        // the slack boundary and must trigger a wrap.
        assert!(ring.would_wrap(16));
        assert!(!ring.would_wrap(15));
    }

    #[test]
    #[should_panic(expected = "write_cursor would exceed bucket")]
    fn write_past_capacity_panics() {
        let mut ring = RingBuffer::new(32);
        ring.write(&vec![0u8; 64]);
    }

    #[test]
    fn freeze_mode_offset_roundtrip() {
        let mut ring = RingBuffer::new(32);
        ring.write_at_offset(10, b"AAAA");
        assert_eq!(ring.read_at_offset(10, 4), b"AAAA".to_vec());
        assert_eq!(ring.filled(), 14);
    }

    #[test]
    fn reset_zaps_the_buffer_back_to_empty() {
        let mut ring = RingBuffer::new(64);
        ring.write(b"0123456789");
        ring.reset();
        assert_eq!(ring.write_cursor(), 0);
        assert_eq!(ring.filled(), 0);
        assert_eq!(ring.wrap_limit(), 64);
    }
}
