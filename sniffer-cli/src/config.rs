//! YAML configuration file

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sniffer_capture::CaptureConfig;
use sniffer_pipeline::PipelineConfig;
use sniffer_sink::ElasticsearchConfig;
use std::path::Path;
use tracing::warn;

use crate::args::Cli;

/// Everything the binary reads from `config.yml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureSection,
    pub sink: ElasticsearchConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CaptureSection {
    pub interface: Option<String>,
    pub filter: Option<String>,
    pub snaplen: i32,
    pub promiscuous: bool,
    pub timeout_ms: i32,
    pub buffer_size: i32,
    pub immediate_mode: bool,
}

impl Default for CaptureSection {
    fn default() -> Self {
        let defaults = CaptureConfig::default();
        Self {
            interface: None,
            filter: None,
            snaplen: defaults.snaplen,
            promiscuous: defaults.promiscuous,
            timeout_ms: defaults.timeout_ms,
            buffer_size: defaults.buffer_size,
            immediate_mode: defaults.immediate_mode,
        }
    }
}

impl CaptureSection {
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            snaplen: self.snaplen,
            timeout_ms: self.timeout_ms,
            promiscuous: self.promiscuous,
            buffer_size: self.buffer_size,
            immediate_mode: self.immediate_mode,
        }
    }
}

impl AppConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml_ng::from_str(text).context("invalid configuration")
    }

    /// Read the config file; a missing file means all defaults
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                Self::from_yaml(&text).with_context(|| format!("in {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
        }
    }

    /// Command-line flags win over the file
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(interface) = &cli.interface {
            self.capture.interface = Some(interface.clone());
        }
        if let Some(filter) = &cli.filter {
            self.capture.filter = Some(filter.clone());
        }
    }

    /// The interface to capture on; checks everything needed before starting
    pub fn validate(&self) -> Result<&str> {
        let Some(interface) = self.capture.interface.as_deref().filter(|i| !i.is_empty()) else {
            bail!("no capture interface: set capture.interface or pass --interface");
        };
        if self.capture.snaplen <= 0 {
            bail!("capture.snaplen must be positive");
        }
        if self.capture.timeout_ms <= 0 {
            bail!("capture.timeout_ms must be positive");
        }
        self.pipeline.validate()?;
        Ok(interface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::time::Duration;

    const FULL: &str = r#"
capture:
  interface: eth0
  filter: "tcp"
  snaplen: 1600
  promiscuous: false
  timeout_ms: 250
sink:
  url: "http://es.internal:9200"
  index: traffic
  username: elastic
  password: changeme
pipeline:
  queue_capacity: 2048
  batch: { max_items: 200, max_age_ms: 500 }
  workers: 4
  write_timeout_ms: 3000
  event_buffer: 64
  retry: { max_item_attempts: 5, max_connect_attempts: 2, initial_backoff_ms: 50, max_backoff_ms: 1000 }
"#;

    #[test]
    fn test_full_config() {
        let config = AppConfig::from_yaml(FULL).unwrap();

        assert_eq!(config.capture.interface.as_deref(), Some("eth0"));
        assert_eq!(config.capture.filter.as_deref(), Some("tcp"));
        assert_eq!(config.capture.snaplen, 1600);
        assert!(!config.capture.promiscuous);
        assert!(config.capture.immediate_mode);

        assert_eq!(config.sink.url, "http://es.internal:9200");
        assert_eq!(config.sink.index, "traffic");
        assert_eq!(config.sink.username.as_deref(), Some("elastic"));

        let pipeline = &config.pipeline;
        assert_eq!(pipeline.queue_capacity, 2048);
        assert_eq!(pipeline.event_buffer, 64);
        assert_eq!(pipeline.sink.batch.max_items, 200);
        assert_eq!(pipeline.sink.batch.max_age, Duration::from_millis(500));
        assert_eq!(pipeline.sink.workers, 4);
        assert_eq!(pipeline.sink.write_timeout, Duration::from_secs(3));
        assert_eq!(pipeline.sink.retry.max_item_attempts, 5);
        assert_eq!(pipeline.sink.retry.initial_backoff, Duration::from_millis(50));

        assert_eq!(config.validate().unwrap(), "eth0");
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_yaml("capture:\n  interface: wlan0\n").unwrap();

        assert_eq!(config.capture.capture_config().snaplen, 65535);
        assert_eq!(config.sink, ElasticsearchConfig::default());
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_interface() {
        let config = AppConfig::from_yaml("sink:\n  index: packets\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("no capture interface"));
    }

    #[test]
    fn test_queue_smaller_than_batch_rejected() {
        let config = AppConfig::from_yaml(
            "capture: { interface: eth0 }\npipeline: { queue_capacity: 10, batch: { max_items: 50 } }\n",
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config = AppConfig::from_yaml(FULL).unwrap();
        let cli = Cli::try_parse_from(["sniffer", "-i", "eth9", "-f", "udp"]).unwrap();

        config.apply_overrides(&cli);

        assert_eq!(config.capture.interface.as_deref(), Some("eth9"));
        assert_eq!(config.capture.filter.as_deref(), Some("udp"));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(AppConfig::from_yaml("pipeline: [1, 2").is_err());
        assert!(AppConfig::from_yaml("pipeline: { workers: many }").is_err());
    }

    #[test]
    fn test_load_missing_file_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/sniffer/config.yml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
