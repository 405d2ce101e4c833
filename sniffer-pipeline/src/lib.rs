//! Pipeline orchestration for the packet sniffer
//!
//! This crate wires a frame source to a batch sink. It includes:
//!
//! - `Pipeline`: Starts a run from a capture source and a sink client
//! - `PipelineHandle`: Shutdown, state, outcome events and the final report
//! - `PipelineConfig`: Queue capacity plus batching, worker and retry settings
//! - `record_queue`: The bounded queue that provides backpressure
//!
//! # Example
//!
//! ```no_run
//! use sniffer_capture::CaptureConfig;
//! use sniffer_pipeline::{Pipeline, PipelineConfig};
//! use sniffer_sink::{ElasticsearchClient, ElasticsearchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ElasticsearchClient::new(&ElasticsearchConfig::default())?;
//!     let mut handle = Pipeline::start_live(
//!         "eth0",
//!         Some("tcp"),
//!         &CaptureConfig::default(),
//!         client,
//!         PipelineConfig::default(),
//!     )?;
//!
//!     let mut events = handle.take_events().expect("events not taken yet");
//!     tokio::spawn(async move { while events.recv().await.is_some() {} });
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown();
//!     let report = handle.wait().await?;
//!     println!("delivered {}", report.delivery.delivered);
//!     Ok(())
//! }
//! ```

pub mod coordinator;
pub mod queue;
pub mod state;

pub use coordinator::{Pipeline, PipelineConfig, PipelineHandle, PipelineReport};
pub use queue::{record_queue, QueueClosed, RecordSender};
pub use state::{PipelineState, StateCell};
