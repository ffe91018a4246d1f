//! Entry point: parses CLI flags, builds a [`ServerContext`], and accepts
//! connections on a TCP listener.

mod listener;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use hubfs_core::config::{RateLimitParams, ServerConfig};
use hubfs_core::ServerContext;

/// Synthetic hub file server.
///
/// Flag letters mirror the original command line; `-s` and `-m` are
/// accepted and logged but don't mount anything (no filesystem mount
/// surface in this port — see the accompanying design notes).
#[derive(Debug, Parser)]
#[command(name = "hubfsd", version, about)]
struct Cli {
    /// Ring buffer size per hub, in bytes.
    #[arg(short = 'q', long = "bucket", default_value_t = 777_777)]
    bucket_size: usize,

    /// Rate limit in bytes/sec; 0 disables byte-rate pacing.
    #[arg(short = 'b', long = "bps", default_value_t = 0)]
    bytes_per_sec: u64,

    /// Minimum milliseconds between successive charged writes.
    #[arg(short = 'i', long = "interval-ms", default_value_t = 0)]
    separation_ms: u64,

    /// Milliseconds between forgiving accumulated rate-limit debt.
    #[arg(short = 'r', long = "reset-ms", default_value_t = 1000)]
    reset_ms: u64,

    /// Maximum length of a single write; longer writes are truncated.
    #[arg(short = 'l', long = "maxlen", default_value_t = 666_666)]
    max_msg_len: usize,

    /// Address to listen on.
    #[arg(short = 'a', long = "addr", default_value = "127.0.0.1:5640")]
    addr: String,

    /// Service name, used only in logging (the original registers this
    /// under /srv).
    #[arg(short = 's', long = "srvname", default_value = "hubfs")]
    srv_name: String,

    /// Mountpoint; accepted for command-line compatibility, unused.
    #[arg(short = 'm', long = "mtpt")]
    mountpoint: Option<String>,

    /// Start every hub in trunc mode.
    #[arg(short = 't', long = "trunc")]
    trunc: bool,

    /// Allow a buffer to be forcibly zapped on an OTRUNC open.
    #[arg(short = 'z', long = "allowzap")]
    allowzap: bool,

    /// Verbose/trace-level logging (the original's chatty9p).
    #[arg(short = 'D', long = "debug")]
    debug: bool,
}

impl Cli {
    fn into_server_config(self) -> ServerConfig {
        let rate_limit = if self.bytes_per_sec > 0 || self.separation_ms > 0 {
            Some(RateLimitParams {
                bytes_per_sec: self.bytes_per_sec,
                separation: Duration::from_millis(self.separation_ms),
                reset: Duration::from_millis(self.reset_ms),
            })
        } else {
            None
        };
        ServerConfig {
            srv_name: self.srv_name,
            bucket_size: self.bucket_size,
            max_msg_len: self.max_msg_len,
            rate_limit,
            trunc: self.trunc,
            allowzap: self.allowzap,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "trace" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    if cli.mountpoint.is_some() {
        tracing::warn!("-m/--mtpt has no effect in this port; hubs are only reachable over the network listener");
    }

    let addr = cli.addr.clone();
    let srv_name = cli.srv_name.clone();
    let config = cli.into_server_config();

    info!(srv_name = %srv_name, addr = %addr, bucket_size = config.bucket_size, "starting hubfsd");

    let ctx = std::sync::Arc::new(ServerContext::new(&config));
    listener::serve(&addr, ctx)
        .await
        .with_context(|| format!("serving on {addr}"))?;
    Ok(())
}
