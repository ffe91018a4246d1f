//! One spawned task per accepted connection: decodes frames, dispatches
//! them against a shared [`ServerContext`], and writes responses back.
//!
//! Reads are the one operation that can legitimately block for a while
//! (waiting for a writer to produce bytes), so each `Read` request runs
//! in its own task, tracked by tag, so a `Flush` for that tag can abort
//! it without stalling the rest of the connection — the async analogue
//! of `fsflush` racing a blocked `fsread`.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use hubfs_core::{FileRef, OpenHandle, ServerContext};

use crate::frame::{FrameCodec, ProtoError, Request, Response};

const ROOT_FID: u64 = 0;

/// Drives a single client connection to completion.
pub struct ClientConnection {
    ctx: Arc<ServerContext>,
}

impl ClientConnection {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    pub async fn run(self, socket: TcpStream) {
        let framed = Framed::new(socket, FrameCodec::default());
        let (mut sink, mut stream) = framed.split();

        let (tx, mut rx) = mpsc::channel::<Response>(64);
        let writer = tokio::spawn(async move {
            while let Some(resp) = rx.recv().await {
                if let Err(err) = sink.send(resp).await {
                    warn!(%err, "failed to write response frame");
                    break;
                }
            }
        });

        let mut fids: HashMap<u64, OpenHandle> = HashMap::new();
        fids.insert(
            ROOT_FID,
            OpenHandle {
                file: FileRef::Root,
                reader_id: None,
            },
        );
        let mut inflight_reads: HashMap<u64, JoinHandle<()>> = HashMap::new();
        let mut inflight_writes: HashMap<u64, JoinHandle<()>> = HashMap::new();

        loop {
            let frame = match stream.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(err)) => {
                    warn!(%err, "dropping connection after frame error");
                    break;
                }
                None => break,
            };

            if let Err(err) = self
                .dispatch(frame, &mut fids, &mut inflight_reads, &mut inflight_writes, &tx)
                .await
            {
                warn!(%err, "error dispatching request");
                break;
            }
        }

        for (_, handle) in inflight_reads.drain() {
            handle.abort();
        }
        for (_, handle) in inflight_writes.drain() {
            handle.abort();
        }
        drop(tx);
        let _ = writer.await;
    }

    async fn dispatch(
        &self,
        req: Request,
        fids: &mut HashMap<u64, OpenHandle>,
        inflight_reads: &mut HashMap<u64, JoinHandle<()>>,
        inflight_writes: &mut HashMap<u64, JoinHandle<()>>,
        tx: &mpsc::Sender<Response>,
    ) -> Result<(), ProtoError> {
        match req {
            Request::Walk {
                tag,
                fid,
                parent_fid,
                name,
            } => {
                let parent = fids.get(&parent_fid).map(|h| h.file.clone()).unwrap_or(FileRef::Root);
                match self.ctx.walk(&parent, &name).await {
                    Ok(file) => {
                        fids.insert(
                            fid,
                            OpenHandle {
                                file,
                                reader_id: None,
                            },
                        );
                        send(tx, Response::Walk { tag }).await;
                    }
                    Err(e) => send_error(tx, tag, e).await,
                }
            }
            Request::Open { tag, fid, truncate } => {
                let Some(handle) = fids.remove(&fid) else {
                    send_error(tx, tag, hubfs_core::HubError::Bad).await;
                    return Ok(());
                };
                match self.ctx.open(handle.file, truncate).await {
                    Ok(opened) => {
                        fids.insert(fid, opened);
                        send(tx, Response::Open { tag }).await;
                    }
                    Err(e) => send_error(tx, tag, e).await,
                }
            }
            Request::Read {
                tag,
                fid,
                offset,
                count,
            } => {
                let Some(handle) = fids.get(&fid).cloned() else {
                    send_error(tx, tag, hubfs_core::HubError::Bad).await;
                    return Ok(());
                };
                let ctx = Arc::clone(&self.ctx);
                let tx = tx.clone();
                let task = tokio::spawn(async move {
                    match ctx.read(&handle, tag, offset, count as usize).await {
                        Ok(data) => send(&tx, Response::Read { tag, data }).await,
                        Err(e) => send_error(&tx, tag, e).await,
                    }
                });
                inflight_reads.insert(tag, task);
            }
            Request::Write { tag, fid, offset, data } => {
                let Some(handle) = fids.get(&fid).cloned() else {
                    send_error(tx, tag, hubfs_core::HubError::Bad).await;
                    return Ok(());
                };
                // A paranoid-mode write can park for up to ~540ms waiting on
                // a lagging reader; run it in its own task, tracked by tag,
                // so a parked write never stalls the rest of the connection
                // and so a Flush for that tag can cancel it in place.
                let ctx = Arc::clone(&self.ctx);
                let tx = tx.clone();
                let task = tokio::spawn(async move {
                    match ctx.write(&handle, tag, offset, &data).await {
                        Ok(count) => send(&tx, Response::Write { tag, count: count as u32 }).await,
                        Err(e) => send_error(&tx, tag, e).await,
                    }
                });
                inflight_writes.insert(tag, task);
            }
            Request::Flush { tag, old_tag } => {
                // Route the flush through the hub engine so the blocked read
                // or parked write (if any) resolves with a zero-byte reply
                // the normal way; aborting the task outright would swallow
                // its response.
                self.ctx.flush_tag(old_tag).await;
                inflight_reads.remove(&old_tag);
                inflight_writes.remove(&old_tag);
                send(tx, Response::Flush { tag }).await;
            }
            Request::Clunk { tag, fid } => {
                if let Some(handle) = fids.remove(&fid) {
                    self.ctx.clunk(handle).await;
                }
                debug!(fid, "clunked");
                send(tx, Response::Clunk { tag }).await;
            }
            Request::Remove { tag, fid } => {
                let result = match fids.remove(&fid) {
                    Some(handle) => self.ctx.remove(&handle.file).await,
                    None => Err(hubfs_core::HubError::Bad),
                };
                match result {
                    Ok(()) => send(tx, Response::Remove { tag }).await,
                    Err(e) => send_error(tx, tag, e).await,
                }
            }
        }
        Ok(())
    }
}

async fn send(tx: &mpsc::Sender<Response>, resp: Response) {
    let _ = tx.send(resp).await;
}

async fn send_error(tx: &mpsc::Sender<Response>, tag: u64, err: hubfs_core::HubError) {
    let _ = tx
        .send(Response::Error {
            tag,
            message: err.to_string(),
        })
        .await;
}
