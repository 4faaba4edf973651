//! Per-call deadline enforcement.

use std::future::Future;
use std::time::Duration;

use telefs_rpc::RpcError;
use tracing::warn;

use crate::error::{AdapterError, AdapterResult};

/// Default deadline for one remote call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Races every remote call against a deadline.
///
/// A host filesystem callout that never returns wedges the kernel's view of
/// the volume, so no call is allowed to wait on the server indefinitely.
/// When the deadline wins, the losing call future is dropped, which also
/// abandons its pending reply slot in the connection driver.
#[derive(Debug, Clone, Copy)]
pub struct RequestGateway {
    timeout: Duration,
}

impl RequestGateway {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Gateway with a non-default deadline. Tests use short ones.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run `call` to completion or to the deadline, whichever comes first.
    pub async fn invoke<T, F>(&self, call: F) -> AdapterResult<T>
    where
        F: Future<Output = Result<T, RpcError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "remote call timed out");
                Err(AdapterError::Timeout)
            }
        }
    }
}

impl Default for RequestGateway {
    fn default() -> Self {
        Self::new()
    }
}
