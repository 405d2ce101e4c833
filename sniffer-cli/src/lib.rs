//! CLI for the packet sniffer
//!
//! This crate provides the `sniffer` binary: argument parsing, the YAML
//! configuration file, logging setup and the wiring from a live capture to
//! the Elasticsearch sink.

pub mod args;
pub mod config;
pub mod run;

pub use args::{Cli, Commands};
pub use config::{AppConfig, CaptureSection};
pub use run::{init_logging, list_interfaces, run};
