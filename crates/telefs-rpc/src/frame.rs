//! Wire frames.
//!
//! Every frame travels as one length-delimited chunk (u32 big-endian length
//! prefix, handled by `LengthDelimitedCodec`) containing a postcard-encoded
//! [`Frame`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::RpcError;

/// Protocol version exchanged during the handshake. Bumped on any change to
/// the frame layout or method payloads.
pub const PROTOCOL_VERSION: u32 = 1;

/// The envelope for everything that crosses the wire.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) enum Frame {
    /// Sent by the initiator as the first frame of a session.
    Hello { version: u32 },
    /// Acceptor's reply to `Hello`.
    HelloAck { version: u32 },
    /// One call. `id` is assigned by the initiator and echoed back.
    Request { id: u64, method: u16, payload: Vec<u8> },
    /// Successful completion of the request with the same `id`.
    Response { id: u64, payload: Vec<u8> },
    /// Dispatch-level failure (unknown method, undecodable payload).
    Error { id: u64, message: String },
}

pub(crate) fn encode(frame: &Frame) -> Result<Bytes, RpcError> {
    Ok(Bytes::from(postcard::to_stdvec(frame)?))
}

pub(crate) fn decode(buf: &[u8]) -> Result<Frame, RpcError> {
    Ok(postcard::from_bytes(buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip() {
        let frame = Frame::Request {
            id: 7,
            method: 3,
            payload: vec![1, 2, 3],
        };
        let encoded = encode(&frame).unwrap();
        match decode(&encoded).unwrap() {
            Frame::Request { id, method, payload } => {
                assert_eq!(id, 7);
                assert_eq!(method, 3);
                assert_eq!(payload, vec![1, 2, 3]);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode(&[0xff, 0xff, 0xff, 0xff]).is_err());
    }
}
