//! Error types for hub operations.
//!
//! Variants carry the exact short, space-free tokens the file-protocol
//! adapter replies with, so a `HubError`'s `Display` output can be used
//! directly as a protocol error string.

use thiserror::Error;

/// Errors that can occur while operating on a hub or the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HubError {
    /// The registry already holds `MAX_HUBS` hubs.
    #[error("too many hubs")]
    TooManyHubs,

    /// A `ctl` write didn't parse as a recognized command.
    #[error("bad ctl message")]
    BadCtl,

    /// A `ctl` read's buffer was smaller than the status string.
    #[error("read too small for response")]
    ReadTooSmall,

    /// `eof NAME` named a hub that doesn't exist.
    #[error("hub not found")]
    HubNotFound,

    /// Catch-all for conditions the source reports generically.
    #[error("something bad happened")]
    Bad,
}

impl HubError {
    /// Returns `true` if retrying the same request later could succeed
    /// (nothing in this server's error taxonomy is retried automatically,
    /// but callers may choose to).
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::BadCtl | Self::ReadTooSmall)
    }

    /// Returns `true` if the error reflects a resource limit rather than a
    /// malformed request.
    #[inline]
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Self::TooManyHubs)
    }
}
