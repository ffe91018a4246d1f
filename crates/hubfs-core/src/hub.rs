//! The hub engine: one ring buffer, its readers, and the dispatch logic
//! that moves bytes from writers to waiting readers.
//!
//! A [`Hub`] is a cheap, `Clone`-able handle over `Arc`-shared state, in
//! the same spirit as `ringmpsc`'s sender/receiver handles — the
//! difference is that here every writer and every reader shares the same
//! lock instead of each having a private lock-free slot, because a hub's
//! whole point is that many readers see exactly the same byte stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{oneshot, Mutex, Notify};

use crate::config::PARANOID_MAGIC;
use crate::flags::ServerFlags;
use crate::limiter::RateLimiter;
use crate::msgq::MessageQueue;
use crate::queue::RequestQueue;
use crate::ring::RingBuffer;

struct PendingRead {
    reader_id: u64,
    count: usize,
    respond: oneshot::Sender<Vec<u8>>,
}

/// A write parked under paranoid-mode backpressure, queued the same way a
/// blocked read is so a racing [`Hub::flush`] can cancel it before the
/// parked task ever dispatches it.
struct PendingWrite {
    data: Vec<u8>,
    offset: Option<u64>,
    respond: oneshot::Sender<usize>,
}

struct HubState {
    ring: RingBuffer,
    epoch: u64,
    readers: HashMap<u64, MessageQueue>,
    pending_reads: RequestQueue<PendingRead>,
    pending_writes: RequestQueue<PendingWrite>,
    limiter: Option<RateLimiter>,
    freeze: bool,
    trunc: bool,
    eof: bool,
    ketchup: usize,
}

static NEXT_READER_ID: AtomicU64 = AtomicU64::new(1);

/// A single named hub: one ring buffer broadcast to every currently-open
/// reader.
#[derive(Clone)]
pub struct Hub {
    name: Arc<str>,
    state: Arc<Mutex<HubState>>,
    tomato: Arc<Notify>,
}

impl Hub {
    pub fn new(name: impl Into<Arc<str>>, bucket_size: usize, trunc: bool, limiter: Option<RateLimiter>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(HubState {
                ring: RingBuffer::new(bucket_size),
                epoch: 0,
                readers: HashMap::new(),
                pending_reads: RequestQueue::new(),
                pending_writes: RequestQueue::new(),
                limiter,
                freeze: false,
                trunc,
                eof: false,
                ketchup: 0,
            })),
            tomato: Arc::new(Notify::new()),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opens a new reader, positioned at the tail if the hub is in trunc
    /// mode, or at the start of the ring otherwise.
    pub async fn open_reader(&self) -> u64 {
        let id = NEXT_READER_ID.fetch_add(1, Ordering::Relaxed);
        let mut st = self.state.lock().await;
        let start = if st.trunc { st.ring.write_cursor() } else { 0 };
        st.readers.insert(id, MessageQueue::new(id, start, st.epoch));
        id
    }

    /// Drops a reader and releases any request it had queued, so a
    /// departed client's message queue doesn't linger forever.
    pub async fn release_reader(&self, reader_id: u64) {
        let mut st = self.state.lock().await;
        st.readers.remove(&reader_id);
        let stale: Vec<u64> = st
            .pending_reads
            .iter_waiting()
            .filter(|(_, p)| p.reader_id == reader_id)
            .map(|(tag, _)| tag)
            .collect();
        for tag in stale {
            st.pending_reads.remove(tag);
        }
    }

    /// Reads up to `count` bytes for `reader_id`. Blocks (without holding
    /// the hub lock) until data is available, the hub is flagged EOF, or
    /// the request is flushed via [`Hub::flush`].
    ///
    /// In freeze mode `offset` selects an absolute position in the ring
    /// rather than the reader's own streaming cursor.
    pub async fn read(&self, reader_id: u64, tag: u64, offset: Option<u64>, count: usize) -> Vec<u8> {
        let mut st = self.state.lock().await;
        if let Some(data) = Self::try_serve_locked(&mut st, reader_id, offset, count) {
            return data;
        }
        if st.eof {
            return Vec::new();
        }
        let (tx, rx) = oneshot::channel();
        if !st.pending_reads.push(
            tag,
            PendingRead {
                reader_id,
                count,
                respond: tx,
            },
        ) {
            // Queue is saturated; the source treats this as a transient
            // failure rather than blocking forever.
            return Vec::new();
        }
        drop(st);
        rx.await.unwrap_or_default()
    }

    /// Cancels the pending read or parked write tagged `old_tag`, if
    /// either is still waiting. A cancelled read's caller receives an
    /// empty read; a cancelled write's caller receives a zero count —
    /// both surface to the protocol layer as a flushed/interrupted
    /// request, per §4.6's "walk every hub's read and write queues".
    pub async fn flush(&self, old_tag: u64) -> bool {
        let mut st = self.state.lock().await;
        if st.pending_reads.remove(old_tag).is_some() {
            return true;
        }
        if let Some(pending) = st.pending_writes.remove(old_tag) {
            let _ = pending.respond.send(0);
            return true;
        }
        false
    }

    /// Resets the ring to empty, matching `fsopen`'s `OTRUNC`+`allowzap`
    /// behavior: existing readers snap forward the same way they do
    /// across a wrap, since the bytes they were tracking are gone.
    pub async fn zap(&self) {
        let mut st = self.state.lock().await;
        st.ring.reset();
        st.epoch += 1;
        for mq in st.readers.values_mut() {
            mq.catch_up_to_wrap(st.epoch);
        }
    }

    /// Writes `data` into the hub and dispatches it to every waiting
    /// reader that can now be satisfied. Returns the number of bytes
    /// accepted, after truncation to the server's configured
    /// message-length ceiling.
    ///
    /// Honors paranoid-mode backpressure: if the slowest reader has
    /// fallen more than [`PARANOID_MAGIC`] bytes behind, the write is
    /// queued and a parked task spawned to dispatch it once a reader
    /// catches up (or a bounded number of polls elapse); the original
    /// caller's future resolves as soon as that parked task's result
    /// comes back, without holding the hub lock in the meantime, so a
    /// racing [`Hub::flush`] can still cancel it (`tag` is the request's
    /// protocol tag, used to queue it).
    pub async fn write(&self, tag: u64, data: &[u8], offset: Option<u64>, flags: &ServerFlags) -> usize {
        let cap = flags.max_msg_len();
        let data: Vec<u8> = if data.len() > cap { data[..cap].to_vec() } else { data.to_vec() };
        let len = data.len();

        if let Some(wait) = self.pacing_wait(len).await {
            if wait > Duration::ZERO {
                tokio::time::sleep(wait).await;
            }
        }

        let mut st = self.state.lock().await;
        if flags.paranoid() && Self::needs_parking(&st) {
            let (tx, rx) = oneshot::channel();
            if !st.pending_writes.push(tag, PendingWrite { data, offset, respond: tx }) {
                // Queue saturated; the source treats this as a transient
                // failure rather than blocking forever.
                return 0;
            }
            let hub = self.clone();
            tokio::spawn(async move {
                hub.run_parked_write(tag).await;
            });
            drop(st);
            rx.await.unwrap_or(0)
        } else {
            Self::dispatch_write_locked(&mut st, &data, offset);
            self.drain_pending_locked(&mut st);
            len
        }
    }

    /// The parked-writer task: sleeps 100ms, then polls up to 77 times at
    /// 7ms apart waiting for a lagging reader to catch up, exactly as
    /// §4.5/§5 specify (≈7ms × 77 ≈ 540ms bounded wait, 100ms head start
    /// before the first poll). Whichever happens first, it re-enters
    /// dispatch under the hub's lock and replies to whoever is still
    /// waiting on the write's oneshot — unless `flush` already cancelled
    /// the slot, in which case there's nothing left to do.
    async fn run_parked_write(&self, tag: u64) {
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut polls = 0;
        loop {
            {
                let st = self.state.lock().await;
                if !Self::needs_parking(&st) {
                    break;
                }
            }
            if polls >= 77 {
                break;
            }
            polls += 1;
            tokio::select! {
                _ = self.tomato.notified() => {}
                _ = tokio::time::sleep(Duration::from_millis(7)) => {}
            }
        }

        let mut st = self.state.lock().await;
        if let Some(PendingWrite { data, offset, respond }) = st.pending_writes.complete(tag) {
            let len = data.len();
            Self::dispatch_write_locked(&mut st, &data, offset);
            self.drain_pending_locked(&mut st);
            let _ = respond.send(len);
        }
    }

    /// Turns freeze mode on or off for this hub.
    pub async fn set_freeze(&self, on: bool) {
        self.state.lock().await.freeze = on;
    }

    pub async fn is_frozen(&self) -> bool {
        self.state.lock().await.freeze
    }

    /// Turns trunc mode on or off (new readers attach at the tail).
    pub async fn set_trunc(&self, on: bool) {
        self.state.lock().await.trunc = on;
    }

    /// Marks the hub EOF: every reader, current and future, sees an
    /// immediate empty read until a write clears it.
    pub async fn signal_eof(&self) {
        let mut st = self.state.lock().await;
        st.eof = true;
        self.wake_pending_locked(&mut st);
    }

    /// Snapshot used by the `ctl` status line: `(bucket bytes used,
    /// capacity, reader count, ketchup)`.
    pub async fn status(&self) -> HubStatus {
        let st = self.state.lock().await;
        HubStatus {
            filled: st.ring.filled(),
            capacity: st.ring.capacity(),
            readers: st.readers.len(),
            ketchup: st.ketchup,
            frozen: st.freeze,
            trunc: st.trunc,
        }
    }

    async fn pacing_wait(&self, len: usize) -> Option<Duration> {
        let mut st = self.state.lock().await;
        st.limiter.as_mut().map(|l| l.charge(len, Instant::now()))
    }

    fn needs_parking(st: &HubState) -> bool {
        st.readers
            .values()
            .any(|mq| mq.bufuse(st.ring.write_cursor()) > PARANOID_MAGIC)
    }

    fn dispatch_write_locked(st: &mut HubState, data: &[u8], offset: Option<u64>) {
        if st.freeze {
            let off = offset.unwrap_or(st.ring.write_cursor() as u64) as usize;
            st.ring.write_at_offset(off, data);
            return;
        }
        if st.ring.would_wrap(data.len()) {
            st.ring.wrap();
            st.epoch += 1;
            for mq in st.readers.values_mut() {
                mq.catch_up_to_wrap(st.epoch);
            }
        }
        st.ring.write(data);
        st.eof = false;
    }

    /// Serves `reader_id` if it has anything available, updating
    /// `ketchup` to that reader's own lag as of this dispatch — §4.5
    /// updates `ketchup`/`tomato` during read dispatch, not write
    /// dispatch, and to the reader actually being served rather than a
    /// max across every reader.
    fn try_serve_locked(st: &mut HubState, reader_id: u64, offset: Option<u64>, count: usize) -> Option<Vec<u8>> {
        if st.freeze {
            let off = offset.unwrap_or(0) as usize;
            return Some(st.ring.read_at_offset(off, count));
        }
        let write_cursor = st.ring.write_cursor();
        let mq = st.readers.get_mut(&reader_id)?;
        let avail = mq.bufuse(write_cursor);
        st.ketchup = avail;
        if avail == 0 {
            return None;
        }
        let n = avail.min(count);
        let data = st.ring.read_at(mq.next_read(), n);
        mq.advance(n);
        Some(data)
    }

    fn drain_pending_locked(&self, st: &mut HubState) {
        self.wake_pending_locked(st);
    }

    fn wake_pending_locked(&self, st: &mut HubState) {
        let ready: Vec<u64> = st
            .pending_reads
            .iter_waiting()
            .filter_map(|(tag, p)| {
                let write_cursor = st.ring.write_cursor();
                let can_serve = st.freeze
                    || st
                        .readers
                        .get(&p.reader_id)
                        .map(|mq| mq.bufuse(write_cursor) > 0)
                        .unwrap_or(false)
                    || st.eof;
                can_serve.then_some(tag)
            })
            .collect();

        for tag in ready {
            if let Some(PendingRead {
                reader_id,
                count,
                respond,
            }) = st.pending_reads.remove(tag)
            {
                let data = Self::try_serve_locked(st, reader_id, None, count).unwrap_or_default();
                let _ = respond.send(data);
            }
        }
        self.tomato.notify_waiters();
    }
}

/// A point-in-time view of a hub's state, used to render its `ctl`
/// status line.
#[derive(Debug, Clone, Copy)]
pub struct HubStatus {
    pub filled: usize,
    pub capacity: usize,
    pub readers: usize,
    pub ketchup: usize,
    pub frozen: bool,
    pub trunc: bool,
}
