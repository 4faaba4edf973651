//! `telefs://` resource addresses.

use crate::error::{AdapterError, AdapterResult};

/// URL scheme identifying a telefs volume.
pub const SCHEME: &str = "telefs";

/// Port assumed when the resource omits one.
pub const DEFAULT_PORT: u16 = 10001;

/// Turn `telefs://host[:port][/ignored]` into the `host:port` string the
/// connection layer dials.
pub fn server_address(resource: &str) -> AdapterResult<String> {
    let invalid = || AdapterError::InvalidAddress(resource.to_owned());

    let rest = resource
        .strip_prefix(SCHEME)
        .and_then(|r| r.strip_prefix("://"))
        .ok_or_else(invalid)?;
    let authority = rest.split('/').next().unwrap_or("");
    if authority.is_empty() {
        return Err(invalid());
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => {
            if host.is_empty() {
                return Err(invalid());
            }
            let port: u16 = port.parse().map_err(|_| invalid())?;
            Ok(format!("{host}:{port}"))
        }
        None => Ok(format!("{authority}:{DEFAULT_PORT}")),
    }
}
