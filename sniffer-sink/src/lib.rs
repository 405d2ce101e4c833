//! Batch sink for decoded packet records
//!
//! This crate takes [`DecodedRecord`](sniffer_core::DecodedRecord)s off a
//! bounded queue, groups them into batches and writes each batch through a
//! [`SinkClient`]. It includes:
//!
//! - `BatchSink`: Size- and age-triggered batching with a bounded flush worker set
//! - `SinkClient`: The async seam to an external store
//! - `ElasticsearchClient`: A `_bulk` API client built on reqwest
//! - `RetryPolicy`: Per-item requeue budget and whole-batch backoff
//! - `DeliveryEvent`: One outcome per accepted record
//!
//! Delivery is at-least-once: a record may be written more than once when a
//! retry overlaps a write the store had in fact accepted.

pub mod batch;
pub mod client;
pub mod elasticsearch;
pub mod outcome;
pub mod retry;
pub mod sink;

pub use batch::BatchPolicy;
pub use client::{Document, ItemStatus, SinkClient, WriteError};
pub use elasticsearch::{ElasticsearchClient, ElasticsearchConfig};
pub use outcome::{DeliveryEvent, DeliveryStats};
pub use retry::RetryPolicy;
pub use sink::{BatchSink, SinkConfig};
