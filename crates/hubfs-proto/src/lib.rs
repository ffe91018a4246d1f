//! Wire framing and per-connection dispatch for talking to a hub server
//! over a plain TCP socket.

pub mod client_conn;
pub mod frame;

pub use client_conn::ClientConnection;
pub use frame::{FrameCodec, ProtoError, Request, Response};
