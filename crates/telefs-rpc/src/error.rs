//! Transport-level errors.

use std::io;
use thiserror::Error;

/// Errors produced by the RPC transport.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Socket-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The session ended while a call was outstanding, or a call was issued
    /// after the driver exited.
    #[error("connection closed")]
    ConnectionClosed,

    /// The peer did not complete the expected handshake.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// A frame envelope could not be encoded or decoded.
    #[error("malformed frame: {0}")]
    Frame(#[from] postcard::Error),

    /// The peer answered with an error frame instead of a response.
    #[error("peer error: {0}")]
    Peer(String),
}

/// Errors a [`ServiceDispatcher`](crate::ServiceDispatcher) can report back
/// to the caller. These travel to the peer as error frames.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The method id does not name a known operation.
    #[error("unknown method id {0}")]
    UnknownMethod(u16),

    /// The request payload did not decode as the method's request type.
    #[error("malformed request payload: {0}")]
    Malformed(String),
}
