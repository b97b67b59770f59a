//! ProbeExecutor - one HTTP GET against a target URL
//!
//! A probe never fails: transport errors (DNS, connect, TLS, timeout) are
//! folded into the result as an error string with no status code.
//!
//! ```text
//! dispatch ──► status ──► body fully read ──► latency
//!                               │
//!                               └── status == 200 ──► SHA-256(body) as hex
//! ```

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{instrument, trace};

use crate::{ProbeOutcome, TargetId, is_reachable};

/// Result of a single probe, before it is tied to a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub status_code: Option<u16>,

    /// Elapsed time until the body was read or the failure was detected
    pub latency_ms: u64,

    pub fingerprint: Option<String>,
    pub error: Option<String>,
}

impl ProbeResult {
    /// A response was received
    pub fn response(status_code: u16, latency_ms: u64, body: &[u8]) -> Self {
        Self {
            status_code: Some(status_code),
            latency_ms,
            fingerprint: (status_code == 200).then(|| fingerprint(body)),
            error: None,
        }
    }

    /// The request failed before a full response was read
    pub fn failure(latency_ms: u64, error: impl Into<String>) -> Self {
        Self {
            status_code: None,
            latency_ms,
            fingerprint: None,
            error: Some(error.into()),
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.status_code.is_some_and(is_reachable)
    }

    pub fn into_outcome(self, target_id: TargetId, checked_at: DateTime<Utc>) -> ProbeOutcome {
        ProbeOutcome {
            target_id,
            checked_at,
            reachable: self.is_reachable(),
            status_code: self.status_code,
            latency_ms: Some(self.latency_ms),
            fingerprint: self.fingerprint,
            error: self.error,
        }
    }
}

/// Lowercase hex SHA-256 of a response body
pub fn fingerprint(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Something that can probe a URL
///
/// The scheduler only talks to this trait, which lets tests drive it with
/// scripted results instead of a network.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeResult;
}

/// Prober backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("site-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client })
    }

    async fn execute_request(&self, url: &str, timeout: Duration) -> anyhow::Result<(u16, Vec<u8>)> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .context("HTTP request failed")?;

        let status_code = response.status().as_u16();

        let body = response
            .bytes()
            .await
            .context("failed to read response body")?;

        Ok((status_code, body.to_vec()))
    }
}

#[async_trait]
impl Prober for HttpProber {
    #[instrument(skip(self))]
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeResult {
        let start = Instant::now();
        let result = self.execute_request(url, timeout).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok((status_code, body)) => {
                trace!("{url} answered {status_code} in {latency_ms}ms ({} bytes)", body.len());
                ProbeResult::response(status_code, latency_ms, &body)
            }
            Err(e) => {
                trace!("{url} failed after {latency_ms}ms: {e:#}");
                ProbeResult::failure(latency_ms, format!("{e:#}"))
            }
        }
    }
}
