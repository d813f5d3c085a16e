//! Shared HTTP connection pool and per-client request accounting

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Settings for the underlying `reqwest` pool. One pool is shared by every
/// resource controller built from the same client.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub tcp_keepalive: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_idle_per_host: 20,
            idle_timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            tcp_keepalive: Some(Duration::from_secs(30)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RequestStats {
    pub sent: u64,
    pub failed: u64,
    pub retried: u64,
    /// Responses answered with HTTP 429
    pub throttled: u64,
    pub last_sent: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Throttled,
}

pub struct HttpPool {
    settings: PoolSettings,
    stats: Arc<RwLock<RequestStats>>,
}

impl HttpPool {
    pub fn new(settings: PoolSettings) -> Self {
        Self {
            settings,
            stats: Arc::new(RwLock::new(RequestStats::default())),
        }
    }

    pub fn client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(self.settings.request_timeout)
            .connect_timeout(self.settings.connect_timeout)
            .pool_idle_timeout(self.settings.idle_timeout)
            .pool_max_idle_per_host(self.settings.max_idle_per_host);

        if let Some(keepalive) = self.settings.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }
        builder.build()
    }

    pub async fn record(&self, outcome: Outcome) {
        let mut stats = self.stats.write().await;
        stats.sent += 1;
        stats.last_sent = Some(Instant::now());
        match outcome {
            Outcome::Success => {}
            Outcome::Failure => stats.failed += 1,
            Outcome::Throttled => {
                stats.failed += 1;
                stats.throttled += 1;
            }
        }
    }

    pub async fn record_retry(&self) {
        self.stats.write().await.retried += 1;
    }

    pub async fn stats(&self) -> RequestStats {
        *self.stats.read().await
    }
}
