//! Host-side adapter that presents a remote telefs VFS as a local volume.
//!
//! The host filesystem framework calls in with one method per primitive
//! (lookup, read, write, enumerate, ...); each call is satisfied by a remote
//! RPC round trip under a deadline. The moving parts:
//!
//! - [`ConnectionManager`] — at most one live session per volume, with loss
//!   detection and no automatic reconnect.
//! - [`ItemCache`] — identity-stable `Arc<Item>` per remote identifier.
//! - [`RequestGateway`] — races every remote call against a deadline.
//! - [`DirectoryEnumerator`] — cursor-paged listings into a caller sink.
//! - [`VolumeAdapter`] — the [`VolumeOps`] implementation tying it together,
//!   with [`AdapterError::to_errno`] as the error surface.
//! - [`FsService`] — probe/load/unload entry points keyed by a
//!   `telefs://host[:port]` resource.

pub mod connection;
pub mod enumerator;
pub mod error;
pub mod gateway;
pub mod item;
pub mod resource;
pub mod service;
pub mod volume;

pub use connection::{ConnectionManager, VolumeStatus};
pub use enumerator::{DirSink, DirectoryEnumerator, PageCursor};
pub use error::{AdapterError, AdapterResult};
pub use gateway::{DEFAULT_CALL_TIMEOUT, RequestGateway};
pub use item::{Item, ItemCache};
pub use service::{FsService, ProbeOutcome};
pub use volume::{VolumeAdapter, VolumeOps, VolumeStatistics};
