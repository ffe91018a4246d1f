//! Server-wide tunables.

use std::time::Duration;

/// Safety slack kept free at the end of the bucket before a wrap is forced.
pub const WRAP_SLACK: usize = 16;

/// Maximum number of pending requests a single hub queue holds before
/// compaction kicks in.
pub const QUEUE_CAPACITY: usize = 777;

/// Maximum number of hubs a registry will create.
pub const MAX_HUBS: usize = 77;

/// In paranoid mode, how far (in bytes) a reader may lag the writer before
/// writes start parking.
pub const PARANOID_MAGIC: usize = 77_777;

/// Rate-limiting parameters applied to a single hub.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitParams {
    /// Bytes per second a hub's writers are paced to.
    pub bytes_per_sec: u64,
    /// Minimum separation between successive charged writes.
    pub separation: Duration,
    /// Interval at which accumulated debt is forgiven.
    pub reset: Duration,
}

/// Configuration collected from CLI flags and handed to the server at
/// startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Service name reported in the `ctl` status line (`-s`).
    pub srv_name: String,
    /// Size in bytes of each hub's ring buffer (`-q`).
    pub bucket_size: usize,
    /// Maximum length of a single write, truncated above this (`-l`).
    pub max_msg_len: usize,
    /// Rate-limit parameters, if enabled by `-b`/`-i`/`-r`.
    pub rate_limit: Option<RateLimitParams>,
    /// Start with trunc mode on (`-t`).
    pub trunc: bool,
    /// Allow a buffer to be forcibly zapped on `OTRUNC` open (`-z`).
    pub allowzap: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            srv_name: "hubfs".to_string(),
            bucket_size: 777_777,
            max_msg_len: 666_666,
            rate_limit: None,
            trunc: false,
            allowzap: false,
        }
    }
}

impl ServerConfig {
    /// Returns true if any rate-limit flag was supplied.
    #[inline]
    pub fn applies_limits(&self) -> bool {
        self.rate_limit.is_some()
    }
}
