//! Maps the small file tree the server exposes (root directory, the
//! server-wide `ctl`, and each hub's `data`/`ctl` pair) onto the hub
//! engine underneath.
//!
//! This plays the role of the source's `Srv` callback table
//! (`fswalk`/`fsopen`/`fsread`/`fswrite`/`fsflush`/`fsdestroyfile`), minus
//! the actual 9p wire format — that lives in `hubfs-proto`, one layer up,
//! which talks to this adapter instead of to `HubRegistry` directly.

use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use crate::config::ServerConfig;
use crate::ctl::{self, CtlOutcome};
use crate::error::HubError;
use crate::flags::ServerFlags;
use crate::registry::HubRegistry;

/// Identifies one file in the tree this server exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRef {
    Root,
    ServerCtl,
    HubData(String),
}

/// State attached to an open fid. `HubData` fids carry the reader id
/// assigned at open time; everything else is stateless.
#[derive(Debug, Clone)]
pub struct OpenHandle {
    pub file: FileRef,
    pub reader_id: Option<u64>,
}

/// Ties a [`HubRegistry`] and [`ServerFlags`] together behind the
/// operations the protocol layer needs.
pub struct ServerContext {
    registry: Mutex<HubRegistry>,
    flags: ServerFlags,
    config: ServerConfig,
    shutdown: Arc<Notify>,
}

impl ServerContext {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            registry: Mutex::new(HubRegistry::new(config.bucket_size, config.trunc, config.rate_limit)),
            flags: ServerFlags::new(config.allowzap, config.max_msg_len, config.trunc),
            config: config.clone(),
            shutdown: Arc::new(Notify::new()),
        }
    }

    #[inline]
    pub fn flags(&self) -> &ServerFlags {
        &self.flags
    }

    /// A handle the listener awaits to know when `quit` has been posted to
    /// the root `ctl`. Cloning shares the same underlying signal.
    #[inline]
    pub fn shutdown_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Resolves `name` against `parent`, creating a hub on the fly when
    /// walking from the root to an unknown name — matching `fscreate`'s
    /// implicit create-on-walk behavior for new hub names.
    pub async fn walk(&self, parent: &FileRef, name: &str) -> Result<FileRef, HubError> {
        match parent {
            FileRef::Root if name == "ctl" => Ok(FileRef::ServerCtl),
            FileRef::Root => {
                let mut registry = self.registry.lock().await;
                registry.create(name)?;
                Ok(FileRef::HubData(name.to_string()))
            }
            _ => Err(HubError::Bad),
        }
    }

    /// Opens a file, attaching a reader to a hub's data file if that's
    /// what's being opened. `truncate` mirrors the wire protocol's `OTRUNC`
    /// bit: on an `allowzap` server, opening a hub's data file with it set
    /// zaps the ring back to empty, matching `fsopen`.
    pub async fn open(&self, file: FileRef, truncate: bool) -> Result<OpenHandle, HubError> {
        let reader_id = match &file {
            FileRef::HubData(name) => {
                let hub = self.registry.lock().await.get(name).ok_or(HubError::HubNotFound)?;
                if truncate && self.flags.allowzap() {
                    hub.zap().await;
                }
                Some(hub.open_reader().await)
            }
            _ => None,
        };
        Ok(OpenHandle { file, reader_id })
    }

    pub async fn read(&self, handle: &OpenHandle, tag: u64, offset: u64, count: usize) -> Result<Vec<u8>, HubError> {
        match &handle.file {
            FileRef::HubData(name) => {
                let hub = self.registry.lock().await.get(name).ok_or(HubError::HubNotFound)?;
                let reader_id = handle.reader_id.ok_or(HubError::Bad)?;
                Ok(hub.read(reader_id, tag, Some(offset), count).await)
            }
            FileRef::ServerCtl => {
                if offset > 0 {
                    return Ok(Vec::new());
                }
                let line = ctl::format_server_status(&self.flags, &self.config);
                if line.len() > count {
                    return Err(HubError::ReadTooSmall);
                }
                Ok(line.into_bytes())
            }
            FileRef::Root => Ok(Vec::new()),
        }
    }

    pub async fn write(&self, handle: &OpenHandle, tag: u64, offset: u64, data: &[u8]) -> Result<usize, HubError> {
        match &handle.file {
            FileRef::HubData(name) => {
                let hub = self.registry.lock().await.get(name).ok_or(HubError::HubNotFound)?;
                Ok(hub.write(tag, data, Some(offset), &self.flags).await)
            }
            FileRef::ServerCtl => {
                let text = std::str::from_utf8(data).map_err(|_| HubError::BadCtl)?;
                let cmd = ctl::parse(text)?;
                let registry = self.registry.lock().await;
                match ctl::execute(cmd, &*registry, &self.flags).await? {
                    CtlOutcome::Applied => Ok(data.len()),
                    CtlOutcome::ShouldQuit => {
                        drop(registry);
                        self.shutdown.notify_waiters();
                        Ok(data.len())
                    }
                }
            }
            FileRef::Root => Err(HubError::Bad),
        }
    }

    pub async fn flush(&self, handle: &OpenHandle, old_tag: u64) -> Result<bool, HubError> {
        match &handle.file {
            FileRef::HubData(name) => {
                let hub = self.registry.lock().await.get(name).ok_or(HubError::HubNotFound)?;
                Ok(hub.flush(old_tag).await)
            }
            _ => Ok(false),
        }
    }

    /// Walks every hub's read and write queues looking for `old_tag`,
    /// matching `flushinated`'s server-wide search: a flush doesn't know
    /// in advance which hub its target request was queued against.
    /// Always succeeds, whether or not a matching slot was found.
    pub async fn flush_tag(&self, old_tag: u64) -> bool {
        let registry = self.registry.lock().await;
        for name in registry.names() {
            if let Some(hub) = registry.get(name) {
                if hub.flush(old_tag).await {
                    return true;
                }
            }
        }
        false
    }

    /// Releases resources an open fid held, e.g. a hub's reader slot.
    pub async fn clunk(&self, handle: OpenHandle) {
        if let (FileRef::HubData(name), Some(reader_id)) = (&handle.file, handle.reader_id) {
            if let Some(hub) = self.registry.lock().await.get(name) {
                hub.release_reader(reader_id).await;
            }
        }
    }

    /// Tears a hub down entirely, matching `fsdestroyfile`.
    pub async fn remove(&self, file: &FileRef) -> Result<(), HubError> {
        match file {
            FileRef::HubData(name) => {
                if self.registry.lock().await.remove(name) {
                    Ok(())
                } else {
                    Err(HubError::HubNotFound)
                }
            }
            _ => Err(HubError::Bad),
        }
    }

    /// Names of every hub currently registered, for a directory read of
    /// the root.
    pub async fn hub_names(&self) -> Vec<String> {
        self.registry.lock().await.names().to_vec()
    }
}
