//! Bounded, compacting request queue.
//!
//! Each hub keeps one of these per pending-read backlog. Requests are
//! pushed at the tail and serviced from the head; a serviced slot is
//! marked `Done` rather than removed immediately, and the head is skipped
//! forward across consecutive `Done` slots on the next push. This keeps
//! the queue array-backed and bounded without needing the tag-indexed
//! compaction the original performs by hand.

use crate::config::QUEUE_CAPACITY;

/// Status of a single queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Waiting,
    Done,
}

/// A fixed-capacity FIFO of pending requests, identified by an opaque tag.
///
/// `T` is the payload carried alongside each tag (typically a
/// `oneshot::Sender` used to wake the waiting protocol task).
#[derive(Debug)]
pub struct RequestQueue<T> {
    tags: Vec<u64>,
    payloads: Vec<Option<T>>,
    status: Vec<Slot>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<T> RequestQueue<T> {
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tags: vec![0; capacity],
            payloads: (0..capacity).map(|_| None).collect(),
            status: vec![Slot::Done; capacity],
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.tags.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Pushes a new waiting request at the tail. Returns `false` without
    /// modifying the queue if it's full — callers reject the request
    /// rather than overwrite a still-pending one.
    pub fn push(&mut self, tag: u64, payload: T) -> bool {
        self.compact();
        if self.is_full() {
            return false;
        }
        let idx = self.tail;
        self.tags[idx] = tag;
        self.payloads[idx] = Some(payload);
        self.status[idx] = Slot::Waiting;
        self.tail = (self.tail + 1) % self.capacity();
        self.len += 1;
        true
    }

    /// Iterates over the currently waiting (tag, payload) pairs in FIFO
    /// order, without removing them.
    pub fn iter_waiting(&self) -> impl Iterator<Item = (u64, &T)> {
        let cap = self.capacity();
        (0..self.len).filter_map(move |i| {
            let idx = (self.head + i) % cap;
            match self.status[idx] {
                Slot::Waiting => self.payloads[idx].as_ref().map(|p| (self.tags[idx], p)),
                Slot::Done => None,
            }
        })
    }

    /// Marks the slot holding `tag` as done and returns its payload, if
    /// still waiting.
    pub fn complete(&mut self, tag: u64) -> Option<T> {
        let cap = self.capacity();
        for i in 0..self.len {
            let idx = (self.head + i) % cap;
            if self.status[idx] == Slot::Waiting && self.tags[idx] == tag {
                self.status[idx] = Slot::Done;
                let payload = self.payloads[idx].take();
                self.compact();
                return payload;
            }
        }
        None
    }

    /// Removes and returns the request queued under `old_tag`, used to
    /// implement flush: the request is cancelled rather than completed.
    pub fn remove(&mut self, old_tag: u64) -> Option<T> {
        self.complete(old_tag)
    }

    /// Skips the head forward across consecutive `Done` slots, reclaiming
    /// their capacity. Called automatically on push/complete, but exposed
    /// so a hub can compact eagerly after a dispatch pass.
    pub fn compact(&mut self) {
        let cap = self.capacity();
        while self.len > 0 && self.status[self.head] == Slot::Done {
            self.head = (self.head + 1) % cap;
            self.len -= 1;
        }
    }
}

impl<T> Default for RequestQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
