//! The hub engine: ring buffers, request queues, rate limiting, and the
//! small file tree that exposes them to the outside world.
//!
//! This crate has no idea how it's being talked to — `hubfs-proto` wraps
//! [`adapter::ServerContext`] with an actual wire format.

pub mod adapter;
pub mod config;
pub mod ctl;
pub mod error;
pub mod flags;
pub mod hub;
pub mod limiter;
pub mod msgq;
pub mod queue;
pub mod registry;
pub mod ring;

pub use adapter::{FileRef, OpenHandle, ServerContext};
pub use config::ServerConfig;
pub use error::HubError;
pub use flags::ServerFlags;
pub use hub::{Hub, HubStatus};
pub use registry::HubRegistry;
