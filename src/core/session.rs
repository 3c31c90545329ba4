//! Shared HTTP session with bounded total and per-host concurrency

use crate::core::config::HttpConfig;
use crate::core::fetch::FetchError;
use reqwest::{Client, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

// Upper bound on buffer space reserved from a size the server declares.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// Capacity to reserve for a body of `declared` bytes.
pub(crate) fn initial_capacity(declared: u64) -> usize {
    declared.min(MAX_PREALLOCATION) as usize
}

pub struct Session {
    client: Client,
    base_url: String,
    total: Arc<Semaphore>,
    per_host: Mutex<HashMap<String, Arc<Semaphore>>>,
    per_host_limit: usize,
    download_timeout: Duration,
}

// Held for the whole request, body included.
struct Permits {
    _host: OwnedSemaphorePermit,
    _total: OwnedSemaphorePermit,
}

impl Session {
    pub fn new(base_url: &str, http: &HttpConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(http.user_agent.as_str())
            .timeout(Duration::from_secs(http.timeout_secs))
            .pool_max_idle_per_host(http.max_connections_per_host)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            total: Arc::new(Semaphore::new(http.max_connections.max(1))),
            per_host: Mutex::new(HashMap::new()),
            per_host_limit: http.max_connections_per_host.max(1),
            download_timeout: Duration::from_secs(http.download_timeout_secs),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins `path` onto the base URL and appends `params` as an encoded query string.
    pub fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, FetchError> {
        let raw = format!("{}{}", self.base_url, path);
        let parsed = if params.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, params)
        };
        parsed.map_err(|e| FetchError::Payload(format!("Invalid URL {raw}: {e}")))
    }

    async fn acquire(&self, url: &Url) -> Result<Permits, FetchError> {
        let host_key = format!(
            "{}:{}",
            url.host_str().unwrap_or_default(),
            url.port_or_known_default().unwrap_or_default()
        );
        let host = {
            let mut per_host = self.per_host.lock().await;
            Arc::clone(
                per_host
                    .entry(host_key)
                    .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_limit))),
            )
        };

        let host_permit = host.acquire_owned().await?;
        let total_permit = Arc::clone(&self.total).acquire_owned().await?;
        Ok(Permits {
            _host: host_permit,
            _total: total_permit,
        })
    }

    pub async fn get_bytes(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        let _permits = self.acquire(&url).await?;
        debug!("GET {}", url);

        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        let body = self.get_bytes(url).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<Vec<u8>, FetchError> {
        let _permits = self.acquire(&url).await?;
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Streams a large body into memory chunk by chunk under the download timeout.
    pub async fn download(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        let _permits = self.acquire(&url).await?;
        debug!("GET {} (streaming)", url);

        let mut response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await?
            .error_for_status()?;

        let declared = response.content_length().unwrap_or(0);
        let mut buffer = Vec::with_capacity(initial_capacity(declared));
        while let Some(chunk) = response.chunk().await? {
            buffer.extend_from_slice(&chunk);
        }
        debug!(bytes = buffer.len(), "Download finished");
        Ok(buffer)
    }
}
