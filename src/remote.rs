//! Remote datastore access.
//!
//! The uploader and the identifier snapshot only talk to the destination
//! through the [`RemoteStore`] trait. [`RestClient`] implements it for a
//! PostgREST-style API (Supabase and friends):
//!
//! | Operation | Request |
//! |-----------|---------|
//! | read a page of identifiers | `GET {url}/{resource}?select={id}&offset={o}&limit={l}` |
//! | write records | `POST {url}/{resource}` with a JSON array body |
//!
//! Both requests carry an `apikey` header and an `Authorization: Bearer`
//! header. Writes also send `Prefer: return=minimal`. Any 2xx status is
//! success; everything else, including timeouts, is a [`RemoteError`].

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::config::{Credentials, RemoteConfig};
use crate::models::{Record, RecordKey};

#[derive(Debug, Error)]
pub enum RemoteError {
    /// Connection failure or timeout.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// One page of the identifier read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdPage {
    /// Rows the server returned, whether or not their identifier was usable.
    pub rows: usize,
    pub keys: Vec<RecordKey>,
}

impl IdPage {
    /// Rows whose identifier was null, missing or not an integer or string.
    pub fn unreadable(&self) -> usize {
        self.rows.saturating_sub(self.keys.len())
    }
}

/// The destination's read and write surface.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch one page of identifiers from `resource`.
    async fn fetch_ids(
        &self,
        resource: &str,
        id_column: &str,
        offset: usize,
        limit: usize,
    ) -> Result<IdPage, RemoteError>;

    /// Write `records` in a single request.
    async fn insert(&self, resource: &str, records: &[Record]) -> Result<(), RemoteError>;
}

/// PostgREST-style HTTP client.
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl RestClient {
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            read_timeout,
            write_timeout,
        })
    }

    /// Build a client from the `[remote]` section, resolving credentials
    /// from the environment.
    pub fn from_config(config: &RemoteConfig) -> anyhow::Result<Self> {
        let credentials = config.credentials()?;
        Ok(Self::new(
            &config.url,
            credentials,
            Duration::from_secs(config.read_timeout_secs),
            Duration::from_secs(config.write_timeout_secs),
        )?)
    }

    fn resource_url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.credentials.api_key)
            .header(
                "Authorization",
                format!("Bearer {}", self.credentials.bearer_token),
            )
    }
}

async fn rejection(response: reqwest::Response) -> RemoteError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    RemoteError::Rejected { status, body }
}

#[async_trait]
impl RemoteStore for RestClient {
    async fn fetch_ids(
        &self,
        resource: &str,
        id_column: &str,
        offset: usize,
        limit: usize,
    ) -> Result<IdPage, RemoteError> {
        let offset = offset.to_string();
        let limit = limit.to_string();
        let response = self
            .authorized(self.client.get(self.resource_url(resource)))
            .query(&[
                ("select", id_column),
                ("offset", offset.as_str()),
                ("limit", limit.as_str()),
            ])
            .timeout(self.read_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let rows: serde_json::Value = response.json().await?;
        let rows = rows
            .as_array()
            .ok_or_else(|| RemoteError::Malformed("expected a JSON array".to_string()))?;

        Ok(IdPage {
            rows: rows.len(),
            keys: rows
                .iter()
                .filter_map(|row| row.get(id_column).and_then(RecordKey::from_json))
                .collect(),
        })
    }

    async fn insert(&self, resource: &str, records: &[Record]) -> Result<(), RemoteError> {
        let response = self
            .authorized(self.client.post(self.resource_url(resource)))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .json(records)
            .timeout(self.write_timeout)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(rejection(response).await)
        }
    }
}
