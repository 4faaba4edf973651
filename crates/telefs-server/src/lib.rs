//! In-memory reference VFS backend for telefs.
//!
//! [`MemoryVfs`] implements the [`telefs_proto::Vfs`] service against a
//! heap-resident tree; [`VfsServer`] serves it over TCP. Used as the demo
//! backend (`telefsd`) and as the backend for the adapter's integration
//! tests.

mod memory;
mod serve;
pub mod testing;

pub use memory::MemoryVfs;
pub use serve::VfsServer;
