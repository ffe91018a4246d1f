//! Server-wide mode switches toggled by the root `ctl` file.
//!
//! These replace the original's file-scope globals. `calm`/`fear` flip
//! paranoid mode for every hub at once. `freeze`/`trunc` also have a
//! server-wide mirror here, flipped whenever a `ctl` write targets every
//! hub (no name given) — that's what the status line reports — while the
//! per-hub switches living on `Hub` itself remain the actual behavior,
//! since this server additionally allows targeting a single hub by name,
//! a capability the status line can't summarize in one bit.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct ServerFlagsInner {
    paranoid: AtomicBool,
    allowzap: AtomicBool,
    freeze: AtomicBool,
    trunc: AtomicBool,
    max_msg_len: AtomicUsize,
}

/// Cheap-to-clone handle to the server's mode switches.
#[derive(Debug, Clone)]
pub struct ServerFlags(Arc<ServerFlagsInner>);

impl ServerFlags {
    pub fn new(allowzap: bool, max_msg_len: usize, trunc: bool) -> Self {
        Self(Arc::new(ServerFlagsInner {
            paranoid: AtomicBool::new(false),
            allowzap: AtomicBool::new(allowzap),
            freeze: AtomicBool::new(false),
            trunc: AtomicBool::new(trunc),
            max_msg_len: AtomicUsize::new(max_msg_len),
        }))
    }

    #[inline]
    pub fn paranoid(&self) -> bool {
        self.0.paranoid.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_paranoid(&self, on: bool) {
        self.0.paranoid.store(on, Ordering::Relaxed);
    }

    #[inline]
    pub fn allowzap(&self) -> bool {
        self.0.allowzap.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn freeze(&self) -> bool {
        self.0.freeze.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_freeze(&self, on: bool) {
        self.0.freeze.store(on, Ordering::Relaxed);
    }

    #[inline]
    pub fn trunc(&self) -> bool {
        self.0.trunc.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_trunc(&self, on: bool) {
        self.0.trunc.store(on, Ordering::Relaxed);
    }

    #[inline]
    pub fn max_msg_len(&self) -> usize {
        self.0.max_msg_len.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_max_msg_len(&self, n: usize) {
        self.0.max_msg_len.store(n, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paranoid_toggles_independently_of_construction() {
        let flags = ServerFlags::new(false, 1024, false);
        assert!(!flags.paranoid());
        flags.set_paranoid(true);
        assert!(flags.paranoid());
    }

    #[test]
    fn clone_shares_state() {
        let flags = ServerFlags::new(false, 1024, false);
        let other = flags.clone();
        other.set_paranoid(true);
        assert!(flags.paranoid());
    }

    #[test]
    fn trunc_reflects_the_construction_default() {
        let flags = ServerFlags::new(false, 1024, true);
        assert!(flags.trunc());
        flags.set_trunc(false);
        assert!(!flags.trunc());
    }
}
