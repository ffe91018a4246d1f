//! Wire messages and the length-prefixed codec that frames them.
//!
//! The original speaks literal 9p; this server speaks a simpler
//! serde-driven frame of the same shape (tag, fid, verb-specific fields)
//! so the protocol layer's job stays "turn bytes into a `Request`" rather
//! than "implement a second protocol parser by hand".

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Maximum encoded frame size accepted from a peer, guarding against a
/// corrupt or hostile length prefix asking for an enormous allocation.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    Walk { tag: u64, fid: u64, parent_fid: u64, name: String },
    Open { tag: u64, fid: u64, truncate: bool },
    Read { tag: u64, fid: u64, offset: u64, count: u32 },
    Write { tag: u64, fid: u64, offset: u64, data: Vec<u8> },
    Flush { tag: u64, old_tag: u64 },
    Clunk { tag: u64, fid: u64 },
    Remove { tag: u64, fid: u64 },
}

impl Request {
    pub fn tag(&self) -> u64 {
        match self {
            Request::Walk { tag, .. }
            | Request::Open { tag, .. }
            | Request::Read { tag, .. }
            | Request::Write { tag, .. }
            | Request::Flush { tag, .. }
            | Request::Clunk { tag, .. }
            | Request::Remove { tag, .. } => *tag,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Walk { tag: u64 },
    Open { tag: u64 },
    Read { tag: u64, data: Vec<u8> },
    Write { tag: u64, count: u32 },
    Flush { tag: u64 },
    Clunk { tag: u64 },
    Remove { tag: u64 },
    Error { tag: u64, message: String },
}

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed frame: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("frame of {0} bytes exceeds the {1} byte limit")]
    TooLarge(usize, usize),
}

/// Frames `Request`s off the wire and `Response`s onto it, each prefixed
/// with a 4-byte big-endian length.
#[derive(Debug, Default)]
pub struct FrameCodec {
    next_len: Option<usize>,
}

impl Decoder for FrameCodec {
    type Item = Request;
    type Error = ProtoError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Request>, ProtoError> {
        let len = match self.next_len {
            Some(len) => len,
            None => {
                if src.len() < 4 {
                    return Ok(None);
                }
                let len = u32::from_be_bytes(src[..4].try_into().unwrap()) as usize;
                if len > MAX_FRAME_LEN {
                    return Err(ProtoError::TooLarge(len, MAX_FRAME_LEN));
                }
                src.advance(4);
                self.next_len = Some(len);
                len
            }
        };

        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(len);
        self.next_len = None;
        let request = bincode::deserialize(&frame)?;
        Ok(Some(request))
    }
}

impl Encoder<Response> for FrameCodec {
    type Error = ProtoError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), ProtoError> {
        let body = bincode::serialize(&item)?;
        if body.len() > MAX_FRAME_LEN {
            return Err(ProtoError::TooLarge(body.len(), MAX_FRAME_LEN));
        }
        dst.reserve(4 + body.len());
        dst.put_u32(body.len() as u32);
        dst.put_slice(&body);
        Ok(())
    }
}
