//! Production implementations backed by Tokio and reqwest.

use crate::error::EnvError;
use crate::network::{is_remote, MediaProbe};
use crate::ExhibitContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Default upper bound for a single media probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1200);

/// Production context backed by Tokio.
///
/// Time comes from the system clock.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExhibitContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let _name = name.to_string();
        tokio::spawn(future);
    }
}

/// Probe that answers web addresses with an HTTP `HEAD` and local paths with
/// file metadata.
///
/// Every probe is bounded by `timeout`; a slow server never stalls the caller
/// for longer than that.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    /// Creates a probe with the given timeout.
    pub fn new(timeout: Duration) -> Result<Self, EnvError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EnvError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// Returns the configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe_remote(&self, url: &str) -> Result<bool, EnvError> {
        match self.client.head(url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) if e.is_timeout() => Err(EnvError::Timeout(self.timeout.as_millis() as u64)),
            Err(e) => Err(EnvError::network(e.to_string())),
        }
    }

    async fn probe_local(&self, path: &str) -> Result<bool, EnvError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(EnvError::io(e)),
        }
    }
}

#[async_trait]
impl MediaProbe for HttpProbe {
    async fn probe(&self, location: &str) -> Result<bool, EnvError> {
        let check = async {
            if is_remote(location) {
                self.probe_remote(location).await
            } else {
                self.probe_local(location).await
            }
        };

        tokio::time::timeout(self.timeout, check)
            .await
            .map_err(|_| EnvError::Timeout(self.timeout.as_millis() as u64))?
    }
}
