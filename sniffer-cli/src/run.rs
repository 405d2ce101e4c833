//! Process wiring: logging, the pipeline run and its outcome stream

use anyhow::{Context, Result};
use sniffer_capture::list_interfaces as interfaces;
use sniffer_pipeline::{Pipeline, PipelineReport};
use sniffer_sink::{DeliveryEvent, ElasticsearchClient};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, trace, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

use crate::config::AppConfig;

/// Install the global subscriber; `RUST_LOG` directives refine `level`
pub fn init_logging(level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Print the interfaces a capture could be opened on
pub fn list_interfaces() {
    for iface in interfaces() {
        let mac = iface
            .mac
            .map(|mac| mac.to_string())
            .unwrap_or_else(|| "-".to_string());
        let ips: Vec<String> = iface.ips.iter().map(|ip| ip.to_string()).collect();
        println!(
            "{:<16} {:<4} {:<17} {}",
            iface.name,
            if iface.is_up { "up" } else { "down" },
            mac,
            ips.join(", ")
        );
    }
}

/// Capture until Ctrl-C or a fatal error, then drain and report
pub async fn run(config: AppConfig) -> Result<PipelineReport> {
    let interface = config.validate()?.to_string();
    let client = ElasticsearchClient::new(&config.sink)?;

    let mut handle = Pipeline::start_live(
        &interface,
        config.capture.filter.as_deref(),
        &config.capture.capture_config(),
        client,
        config.pipeline.clone(),
    )
    .with_context(|| format!("cannot start capture on {}", interface))?;

    info!(run = %handle.run_id(), interface = %interface, "Sniffing");

    let events = handle
        .take_events()
        .map(log_events)
        .context("outcome stream already taken")?;

    let shutdown = handle.shutdown_token();
    tokio::spawn(async move {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("Interrupt received, draining"),
                    Err(e) => warn!(error = %e, "Cannot listen for Ctrl-C, stopping"),
                }
                shutdown.cancel();
            }
            _ = shutdown.cancelled() => {}
        }
    });

    let report = handle.wait().await;
    let failed = events.await.unwrap_or_default();

    let report = report?;
    info!(
        run = %report.run_id,
        delivered = report.delivery.delivered,
        failed,
        "Run finished"
    );
    eprintln!("{}", report.capture.format());
    Ok(report)
}

/// Log each outcome; resolves to the number of failed records
fn log_events(mut events: mpsc::Receiver<DeliveryEvent>) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut failed = 0;
        while let Some(event) = events.recv().await {
            match event {
                DeliveryEvent::Delivered { id } => trace!(id, "Delivered"),
                DeliveryEvent::Failed { id, reason, record } => {
                    failed += 1;
                    warn!(
                        id,
                        reason = %reason,
                        captured_at = %record.captured_at,
                        "Record not delivered"
                    );
                }
            }
        }
        failed
    })
}
