//! Status probe - asks an upstream status provider whether a host is up
//!
//! The poll cycle only depends on the [`StatusProbe`] trait. [`McStatusProbe`]
//! implements it against a mcstatus.io style HTTP API:
//!
//! ```text
//! GET {base_url}/status/java/{host}?query=false
//! → {"online": true, "retrieved_at": 1736512496000, "players": {"online": 12}}
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{instrument, trace};

use crate::config::ProbeConfig;

/// Result of a successful probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeStatus {
    pub online: bool,

    /// When the provider sampled the host (epoch milliseconds)
    pub retrieved_at_millis: i64,

    /// Players online; 0 when the host is offline
    pub player_count: u32,
}

/// Fallible, synchronous-per-call status lookup for a single host
///
/// Implementations are responsible for bounding their own call time.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn probe(&self, host: &str) -> Result<ProbeStatus>;
}

#[derive(Debug, Deserialize)]
struct JavaStatus {
    online: bool,
    retrieved_at: i64,
    players: Option<Players>,
}

#[derive(Debug, Deserialize)]
struct Players {
    online: u32,
}

impl From<JavaStatus> for ProbeStatus {
    fn from(status: JavaStatus) -> Self {
        let player_count = match (status.online, status.players) {
            (true, Some(players)) => players.online,
            _ => 0,
        };

        Self {
            online: status.online,
            retrieved_at_millis: status.retrieved_at,
            player_count,
        }
    }
}

/// HTTP probe against the mcstatus.io v2 API
pub struct McStatusProbe {
    /// HTTP client (reused across requests)
    client: reqwest::Client,

    base_url: String,
}

impl McStatusProbe {
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl StatusProbe for McStatusProbe {
    #[instrument(skip(self))]
    async fn probe(&self, host: &str) -> Result<ProbeStatus> {
        let url = format!("{}/status/java/{host}?query=false", self.base_url);

        trace!("requesting status from {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("failed to send HTTP request")?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP error: {}", response.status());
        }

        let body = response
            .text()
            .await
            .context("failed to read response body")?;

        let status: JavaStatus =
            serde_json::from_str(&body).context("failed to parse status JSON")?;

        trace!("successfully parsed status");
        Ok(status.into())
    }
}
