//! Error taxonomy and errno mapping for the adapter.
//!
//! Three failure classes reach this module: local validation errors (bad
//! handle, bad address), remote errors reported in-band by the backend, and
//! transport/timeout failures. The host only ever sees errno values, so
//! every variant maps to exactly one via [`AdapterError::to_errno`].

use telefs_proto::{ItemId, errno};
use telefs_rpc::RpcError;
use thiserror::Error;

/// Errors produced by the volume adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The resource address or `host:port` string is malformed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// `connect` was called while a connection is already active. Callers
    /// treat this as success (idempotent connect); it never reaches the host.
    #[error("already connected")]
    AlreadyConnected,

    /// No active session.
    #[error("not connected to a VFS server")]
    NotConnected,

    /// The host passed a handle the cache has no item for.
    #[error("unknown item handle {0}")]
    InvalidHandle(ItemId),

    /// The backend reported a non-zero error code.
    #[error("remote error code {0}")]
    Remote(i32),

    /// The remote call did not complete within the deadline.
    #[error("remote call timed out")]
    Timeout,

    /// Transport-level failure.
    #[error("transport failure: {0}")]
    Rpc(#[from] RpcError),

    /// Symlinks and hard links are not supported by this volume.
    #[error("operation not supported")]
    NotSupported,
}

impl AdapterError {
    /// Map to the errno the host framework understands.
    ///
    /// The host cannot distinguish "slow" from "dead", so timeouts and
    /// transport failures both collapse to `EIO`.
    pub fn to_errno(&self) -> i32 {
        match self {
            AdapterError::Remote(code) => remote_errno(*code),
            AdapterError::Timeout | AdapterError::Rpc(_) => libc::EIO,
            AdapterError::NotConnected => libc::ENOTCONN,
            AdapterError::InvalidHandle(_) | AdapterError::InvalidAddress(_) => libc::EINVAL,
            AdapterError::NotSupported => libc::ENOTSUP,
            // Swallowed by ensure_connected; mapped defensibly anyway.
            AdapterError::AlreadyConnected => libc::EALREADY,
        }
    }
}

/// Map a remote protocol error code onto the host errno taxonomy.
/// Unknown codes become `EIO` rather than leaking through unmapped.
fn remote_errno(code: i32) -> i32 {
    match code {
        errno::ENOENT => libc::ENOENT,
        errno::EIO => libc::EIO,
        errno::EACCES => libc::EACCES,
        errno::EEXIST => libc::EEXIST,
        errno::ENOTDIR => libc::ENOTDIR,
        errno::EISDIR => libc::EISDIR,
        errno::EINVAL => libc::EINVAL,
        errno::ENOSPC => libc::ENOSPC,
        errno::ENOTSUP => libc::ENOTSUP,
        errno::ENOTCONN => libc::ENOTCONN,
        errno::ENOTEMPTY => libc::ENOTEMPTY,
        _ => libc::EIO,
    }
}

/// Shorthand for checking an in-band remote error code.
pub(crate) fn ok_or_remote(code: i32) -> Result<(), AdapterError> {
    if code == errno::OK {
        Ok(())
    } else {
        Err(AdapterError::Remote(code))
    }
}

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_codes_map_one_to_one() {
        assert_eq!(AdapterError::Remote(errno::ENOENT).to_errno(), libc::ENOENT);
        assert_eq!(AdapterError::Remote(errno::EEXIST).to_errno(), libc::EEXIST);
        assert_eq!(
            AdapterError::Remote(errno::ENOTEMPTY).to_errno(),
            libc::ENOTEMPTY
        );
        assert_eq!(AdapterError::Remote(errno::EISDIR).to_errno(), libc::EISDIR);
    }

    #[test]
    fn unknown_remote_code_defaults_to_eio() {
        assert_eq!(AdapterError::Remote(9999).to_errno(), libc::EIO);
        assert_eq!(AdapterError::Remote(-1).to_errno(), libc::EIO);
    }

    #[test]
    fn transport_failures_collapse_to_eio() {
        assert_eq!(AdapterError::Timeout.to_errno(), libc::EIO);
        assert_eq!(
            AdapterError::Rpc(RpcError::ConnectionClosed).to_errno(),
            libc::EIO
        );
    }

    #[test]
    fn local_validation_errors() {
        assert_eq!(AdapterError::InvalidHandle(7).to_errno(), libc::EINVAL);
        assert_eq!(
            AdapterError::InvalidAddress("nope".into()).to_errno(),
            libc::EINVAL
        );
        assert_eq!(AdapterError::NotConnected.to_errno(), libc::ENOTCONN);
        assert_eq!(AdapterError::NotSupported.to_errno(), libc::ENOTSUP);
    }

    #[test]
    fn ok_code_is_not_an_error() {
        assert!(ok_or_remote(errno::OK).is_ok());
        assert!(matches!(
            ok_or_remote(errno::ENOENT),
            Err(AdapterError::Remote(errno::ENOENT))
        ));
    }
}
