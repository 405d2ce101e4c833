//! Elasticsearch bulk API client
//!
//! Documents are written with one `_bulk` request per batch, each document
//! preceded by an `index` action line. Per-item statuses from the response
//! are classified as:
//!
//! - 2xx: delivered
//! - 429, 502, 503, 504: transient, the item is retried
//! - anything else: permanent
//!
//! A whole-request 429 or 5xx, or a transport failure, means the endpoint is
//! unavailable and the batch is retried. Any other non-2xx response (bad
//! credentials, unknown path) rejects the write.

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use sniffer_core::{Error, Result};
use tracing::{debug, info};

use crate::client::{Document, ItemStatus, SinkClient, WriteError};

/// Where and how to reach the cluster
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ElasticsearchConfig {
    /// Base URL, e.g. `http://localhost:9200`
    pub url: String,
    /// Target index
    pub index: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            index: "packets".to_string(),
            username: None,
            password: None,
        }
    }
}

/// Bulk-indexing [`SinkClient`] backed by `reqwest`
pub struct ElasticsearchClient {
    http: reqwest::Client,
    bulk_url: String,
    index: String,
    username: Option<String>,
    password: Option<String>,
}

impl ElasticsearchClient {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self> {
        let base = config.url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::invalid_config(
                "sink.url",
                format!("'{}' is not an http(s) URL", config.url),
            ));
        }
        if config.index.is_empty() {
            return Err(Error::invalid_config("sink.index", "must not be empty"));
        }
        if config.password.is_some() && config.username.is_none() {
            return Err(Error::invalid_config(
                "sink.password",
                "requires sink.username",
            ));
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::sink(format!("Failed to build HTTP client: {}", e)))?;

        info!(url = %base, index = %config.index, "Elasticsearch sink configured");

        Ok(Self {
            http,
            bulk_url: format!("{}/_bulk", base),
            index: config.index.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn bulk_url(&self) -> &str {
        &self.bulk_url
    }
}

#[async_trait]
impl SinkClient for ElasticsearchClient {
    async fn write(&self, documents: &[Document]) -> std::result::Result<Vec<ItemStatus>, WriteError> {
        let body = encode_bulk(&self.index, documents);

        let mut request = self
            .http
            .post(&self.bulk_url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| WriteError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(WriteError::Unavailable(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(WriteError::Rejected(format!("HTTP {}: {}", status, detail)));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| WriteError::Unavailable(format!("unreadable bulk response: {}", e)))?;

        Ok(parse_bulk_response(&value, documents.len()))
    }

    async fn close(&self) {
        debug!(url = %self.bulk_url, "Elasticsearch sink closed");
    }
}

/// Build the NDJSON body of a `_bulk` request
pub fn encode_bulk(index: &str, documents: &[Document]) -> Bytes {
    let action = serde_json::json!({ "index": { "_index": index } }).to_string();

    let mut buf = BytesMut::with_capacity(
        documents
            .iter()
            .map(|doc| action.len() + doc.body.len() + 2)
            .sum(),
    );
    for doc in documents {
        buf.put_slice(action.as_bytes());
        buf.put_u8(b'\n');
        buf.put_slice(doc.body.as_bytes());
        buf.put_u8(b'\n');
    }
    buf.freeze()
}

/// Classify one per-item HTTP status
pub fn classify(status: u16, reason: impl Into<String>) -> ItemStatus {
    match status {
        200..=299 => ItemStatus::Ok,
        429 | 502 | 503 | 504 => ItemStatus::Transient(reason.into()),
        _ => ItemStatus::Permanent(reason.into()),
    }
}

/// Extract per-item statuses from a `_bulk` response body
///
/// Always returns `expected` statuses. Items the response does not account
/// for are treated as transient so they are written again.
pub fn parse_bulk_response(body: &Value, expected: usize) -> Vec<ItemStatus> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut statuses: Vec<ItemStatus> = items
        .iter()
        .take(expected)
        .map(|item| {
            // Each item is keyed by its action name
            let result = item
                .as_object()
                .and_then(|action| action.values().next())
                .unwrap_or(&Value::Null);

            let status = result
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok())
                .unwrap_or(0);
            classify(status, item_reason(status, result))
        })
        .collect();

    statuses.resize(
        expected,
        ItemStatus::Transient("no status in bulk response".to_string()),
    );
    statuses
}

fn item_reason(status: u16, result: &Value) -> String {
    let error = result.get("error");
    let kind = error
        .and_then(|e| e.get("type"))
        .and_then(Value::as_str);
    let reason = error
        .and_then(|e| e.get("reason"))
        .and_then(Value::as_str);

    match (kind, reason) {
        (Some(kind), Some(reason)) => format!("{}: {}", kind, reason),
        (Some(kind), None) => kind.to_string(),
        (None, Some(reason)) => reason.to_string(),
        (None, None) => format!("HTTP {}", status),
    }
}
