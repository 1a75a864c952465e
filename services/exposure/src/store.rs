use crate::config::KvConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors surfaced by counter store backends.
///
/// Nothing above the tracker ever sees these: the tracker absorbs every
/// variant into zeroed defaults on read and a dropped batch on write.
#[derive(Debug, Error)]
pub enum StoreError {
    /// KV credentials were not configured for this deployment
    #[error("kv credentials not configured")]
    MissingCredentials,
    /// The KV request could not be sent or the response not read
    #[error("kv request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The KV API answered with a non-success status
    #[error("kv returned unexpected status {status}")]
    UnexpectedStatus { status: u16 },
    /// The stored value did not parse as a counter map
    #[error("kv value is not a counter map: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Storage port for the exposure counter map.
///
/// The whole map lives under one well-known key and is read and
/// overwritten wholesale; there is no partial-update call.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Fetch the persisted counter map. `Ok(None)` means the key does not
    /// exist yet, which is a normal first-run state rather than an error.
    async fn read_all(&self) -> Result<Option<HashMap<String, u64>>, StoreError>;

    /// Overwrite the persisted counter map with a full snapshot.
    async fn write_all(&self, counts: &HashMap<String, u64>) -> Result<(), StoreError>;
}

struct KvCredentials {
    account_id: String,
    namespace_id: String,
    api_token: String,
}

/// Counter store backed by a Workers-KV-style REST API.
///
/// The map is stored as a JSON object under `counter_key`; reads are a
/// GET of the raw value, writes a PUT of the full serialized map.
pub struct KvCounterStore {
    client: Client,
    base_url: String,
    counter_key: String,
    credentials: Option<KvCredentials>,
}

impl KvCounterStore {
    /// Create a new KV counter store from configuration.
    ///
    /// Incomplete credentials are tolerated: the store is constructed in a
    /// degraded mode where every call reports `MissingCredentials` and the
    /// service serves zeroed counts.
    pub fn new(config: &KvConfig) -> Self {
        let credentials = match (&config.account_id, &config.namespace_id, &config.api_token) {
            (Some(account_id), Some(namespace_id), Some(api_token)) => Some(KvCredentials {
                account_id: account_id.clone(),
                namespace_id: namespace_id.clone(),
                api_token: api_token.clone(),
            }),
            _ => None,
        };

        match &credentials {
            Some(creds) => info!(
                account_id = %creds.account_id,
                counter_key = %config.counter_key,
                "KV counter store initialized"
            ),
            None => warn!(
                "KV credentials incomplete, exposure counts will serve zeroed defaults"
            ),
        }

        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            counter_key: config.counter_key.clone(),
            credentials,
        }
    }

    fn value_url(&self, credentials: &KvCredentials) -> String {
        format!(
            "{base}/accounts/{account}/storage/kv/namespaces/{namespace}/values/{key}",
            base = self.base_url,
            account = credentials.account_id,
            namespace = credentials.namespace_id,
            key = self.counter_key
        )
    }
}

#[async_trait]
impl CounterStore for KvCounterStore {
    #[instrument(skip(self))]
    async fn read_all(&self) -> Result<Option<HashMap<String, u64>>, StoreError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(StoreError::MissingCredentials)?;

        let response = self
            .client
            .get(self.value_url(credentials))
            .bearer_auth(&credentials.api_token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(counter_key = %self.counter_key, "Counter key not found in KV");
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(StoreError::UnexpectedStatus {
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        let counts: HashMap<String, u64> = serde_json::from_str(&body)?;

        debug!(entries = counts.len(), "Fetched exposure counter map");

        Ok(Some(counts))
    }

    #[instrument(skip(self, counts), fields(entries = counts.len()))]
    async fn write_all(&self, counts: &HashMap<String, u64>) -> Result<(), StoreError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(StoreError::MissingCredentials)?;

        let response = self
            .client
            .put(self.value_url(credentials))
            .bearer_auth(&credentials.api_token)
            .json(counts)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::UnexpectedStatus {
                status: response.status().as_u16(),
            });
        }

        debug!("Persisted exposure counter map");

        Ok(())
    }
}

/// In-memory counter store for unit tests and local development.
#[derive(Default)]
pub struct MemoryCounterStore {
    counts: Mutex<Option<HashMap<String, u64>>>,
}

impl MemoryCounterStore {
    /// Create an empty store (no persisted map, like a fresh KV namespace).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a counter map.
    pub fn seeded(counts: HashMap<String, u64>) -> Self {
        Self {
            counts: Mutex::new(Some(counts)),
        }
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn read_all(&self) -> Result<Option<HashMap<String, u64>>, StoreError> {
        Ok(self.counts.lock().expect("store poisoned").clone())
    }

    async fn write_all(&self, counts: &HashMap<String, u64>) -> Result<(), StoreError> {
        *self.counts.lock().expect("store poisoned") = Some(counts.clone());
        Ok(())
    }
}
