//! Health check probe logic.
//!
//! Performs HTTP health checks against service endpoints and classifies
//! the outcome. Transport errors are mapped to a DOWN verdict here so
//! callers never see them.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use vigil_state::ServiceStatus;

/// Boxed future alias used by the object-safe probe trait.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of a single health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// The health endpoint returned 2xx.
    Healthy,
    /// The health endpoint answered with a non-2xx status code.
    Unhealthy(u16),
    /// The probe could not complete (connection error, timeout, bad URL).
    Failed(String),
}

impl ProbeResult {
    /// UP for a 2xx response, DOWN for everything else.
    pub fn status(&self) -> ServiceStatus {
        match self {
            Self::Healthy => ServiceStatus::Up,
            Self::Unhealthy(_) | Self::Failed(_) => ServiceStatus::Down,
        }
    }

    /// Human-readable description used as the incident reason.
    pub fn describe(&self) -> String {
        match self {
            Self::Healthy => "health endpoint returned 2xx".to_string(),
            Self::Unhealthy(code) => format!("health endpoint returned HTTP {code}"),
            Self::Failed(reason) => format!("health endpoint unreachable: {reason}"),
        }
    }
}

/// Something that can probe a health URL.
///
/// Implementations must not fail: every transport problem is a
/// [`ProbeResult::Failed`].
pub trait Prober: Send + Sync {
    fn probe<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ProbeResult>;
}

/// Probe timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Time allowed to establish the connection.
    pub connect_timeout: Duration,
    /// Time allowed for the response once connected.
    pub read_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(3),
        }
    }
}

/// Probes over HTTP(S) with a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    /// Build a prober with the given timeouts.
    pub fn new(config: ProbeConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.connect_timeout + config.read_timeout)
            .user_agent(concat!("vigil-probe/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Perform one GET against `url` and classify the response.
    pub async fn http_probe(&self, url: &str) -> ProbeResult {
        match self.client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    ProbeResult::Healthy
                } else {
                    debug!(%status, %url, "health probe non-2xx");
                    ProbeResult::Unhealthy(status.as_u16())
                }
            }
            Err(e) if e.is_timeout() => {
                debug!(%url, "health probe timed out");
                ProbeResult::Failed("timed out".to_string())
            }
            Err(e) if e.is_connect() => {
                debug!(error = %e, %url, "health probe connection failed");
                ProbeResult::Failed("connection failed".to_string())
            }
            Err(e) if e.is_builder() => {
                debug!(error = %e, %url, "health probe url rejected");
                ProbeResult::Failed("invalid health url".to_string())
            }
            Err(e) => {
                debug!(error = %e, %url, "health probe request failed");
                ProbeResult::Failed("request failed".to_string())
            }
        }
    }
}

impl Prober for HttpProber {
    fn probe<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ProbeResult> {
        Box::pin(self.http_probe(url))
    }
}
