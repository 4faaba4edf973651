//! Framed RPC transport for telefs.
//!
//! This crate is payload-agnostic: it moves `(method id, bytes)` requests
//! and `bytes` responses over a length-delimited TCP connection, and leaves
//! the meaning of those bytes to the service definition crate.
//!
//! The connection model is split in two:
//!
//! - a cheap, cloneable [`CallHandle`] that callers use to issue requests;
//! - a [`ConnectionDriver`] that owns the socket and must be pumped
//!   (`driver.run().await`) for the session to make progress. The driver
//!   exits when the peer goes away, which is how session loss is observed.
//!
//! ```no_run
//! # async fn example() -> Result<(), telefs_rpc::RpcError> {
//! let (handle, driver) = telefs_rpc::connect("127.0.0.1:10001").await?;
//! tokio::spawn(driver.run());
//! let response = handle.call(1, b"payload".to_vec()).await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod frame;
mod server;

pub use client::{CallHandle, ConnectionDriver, connect, establish_initiator};
pub use error::{DispatchError, RpcError};
pub use frame::PROTOCOL_VERSION;
pub use server::{ServerDriver, ServiceDispatcher, accept};
