//! Media reachability abstraction.

use async_trait::async_trait;
use crate::error::EnvError;

/// Checks whether a media location (web address or local file) exists.
///
/// # Implementations
///
/// - **Production**: `HttpProbe` - HTTP `HEAD` for web addresses, file
///   metadata for local paths, both bounded by a timeout
/// - **Simulation**: a scripted set of reachable locations
///
/// # Flow
///
/// ```text
/// Runtime                    Probe                     Server / Disk
///   |                          |                            |
///   |-- probe(url) ----------->|                            |
///   |                          |-- HEAD url (<=1.2s) ------>|
///   |                          |<-------- 200 / 404 --------|
///   |<-- Ok(true) / Ok(false) -|                            |
/// ```
#[async_trait]
pub trait MediaProbe: Send + Sync + 'static {
    /// Probes a single location.
    ///
    /// # Returns
    /// * `Ok(true)` - The location answered / the file exists
    /// * `Ok(false)` - The location definitively does not exist
    /// * `Err(EnvError::Timeout)` - No answer within the probe timeout
    /// * `Err(EnvError::NetworkError)` - Transport failure
    async fn probe(&self, location: &str) -> Result<bool, EnvError>;
}

/// Returns true if the location is a web address rather than a local path.
pub fn is_remote(location: &str) -> bool {
    let scheme_end = location.find("://").unwrap_or(0);
    let scheme = &location[..scheme_end];
    scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
}
