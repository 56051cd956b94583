pub mod fetch;
pub mod simulated;

use crate::lhm::snapshot::{assemble, Snapshot};
use fetch::{fetch_json, FetchError};
use reqwest::Client;
use std::time::Duration;

/// Device url that selects synthetic data instead of a network call.
pub const SIMULATED_DATA_URL: &str = "SIMULATED";

pub const DEFAULT_DEVICE_URL: &str = "http://localhost:8085/data.json";

/// Agents live on the local network, so anything slower is treated as down.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

const USER_AGENT: &str = concat!("lhmsnap/", env!("CARGO_PKG_VERSION"));

/// Turns a device url into a snapshot. Holds no state besides the HTTP pool.
#[derive(Debug, Clone)]
pub struct SnapshotClient {
    client: Client,
    timeout: Duration,
}

impl SnapshotClient {
    /// Fails only when the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self::with_client(client, timeout))
    }

    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn query_snapshot(&self, url: &str) -> Result<Snapshot, FetchError> {
        if url == SIMULATED_DATA_URL {
            return Ok(simulated::simulated_snapshot());
        }
        let payload = fetch_json(&self.client, url, self.timeout).await?;
        Ok(assemble(&payload))
    }
}

/// One-off query with a default client.
pub async fn query_snapshot(url: &str) -> Result<Snapshot, FetchError> {
    SnapshotClient::new(DEFAULT_TIMEOUT)?
        .query_snapshot(url)
        .await
}
