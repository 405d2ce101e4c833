//! The seam between the batch sink and an external store

use async_trait::async_trait;
use thiserror::Error;

/// A record serialized to the sink's wire form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Record id assigned when the sink accepted the record
    pub id: u64,
    /// JSON body
    pub body: String,
}

/// Per-document outcome of a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Ok,
    /// May succeed if written again
    Transient(String),
    /// Will never succeed
    Permanent(String),
}

/// The write call itself failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The endpoint could not be reached or is overloaded
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    /// The endpoint refused the request as a whole
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl WriteError {
    /// Whether writing the same batch again might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, WriteError::Unavailable(_))
    }
}

/// A batch-oriented client for an external store
///
/// `write` may be called concurrently from several flush workers. `close` is
/// called exactly once, after the last write has completed.
#[async_trait]
pub trait SinkClient: Send + Sync + 'static {
    /// Write a batch and report one status per document, in order
    async fn write(&self, documents: &[Document]) -> Result<Vec<ItemStatus>, WriteError>;

    /// Release connections held by the client
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_error_retryable() {
        assert!(WriteError::Unavailable("connection refused".into()).is_retryable());
        assert!(!WriteError::Rejected("HTTP 401".into()).is_retryable());
    }

    #[test]
    fn test_write_error_display() {
        assert_eq!(
            WriteError::Rejected("HTTP 404".into()).to_string(),
            "write rejected: HTTP 404"
        );
    }
}
