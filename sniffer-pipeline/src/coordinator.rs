//! Pipeline coordinator: capture thread → bounded queue → batch sink
//!
//! The coordinator owns one blocking capture task, one batch sink task and
//! the shutdown token connecting them. Shutdown, or the capture ending on
//! its own, stops capture reading; dropping the producer side of the queue
//! then tells the sink to flush what it holds and exit.

use serde::Deserialize;
use sniffer_capture::{CaptureConfig, CaptureSource, CaptureStats, FilterStatus, FrameSource, NextFrame};
use sniffer_core::{Error, Result};
use sniffer_packet::decode;
use sniffer_sink::{BatchSink, DeliveryEvent, DeliveryStats, SinkClient, SinkConfig};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn, Instrument};
use uuid::Uuid;

use crate::queue::{record_queue, RecordSender};
use crate::state::{PipelineState, StateCell};

/// Queue, outcome channel and sink settings for one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Records held between capture and sink; must be at least `batch.max_items`
    pub queue_capacity: usize,
    /// Outcome events buffered before flush workers wait on the consumer
    pub event_buffer: usize,
    #[serde(flatten)]
    pub sink: SinkConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 4096,
            event_buffer: 1024,
            sink: SinkConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.sink.validate()?;
        if self.queue_capacity < self.sink.batch.max_items {
            return Err(Error::invalid_config(
                "queue_capacity",
                format!(
                    "{} is smaller than batch.max_items ({})",
                    self.queue_capacity, self.sink.batch.max_items
                ),
            ));
        }
        if self.event_buffer == 0 {
            return Err(Error::invalid_config("event_buffer", "must be at least 1"));
        }
        Ok(())
    }
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub capture: CaptureStats,
    pub delivery: DeliveryStats,
}

/// How the capture task ended
struct CaptureExit {
    stats: CaptureStats,
    error: Option<Error>,
}

/// Entry point for starting pipeline runs
pub struct Pipeline;

impl Pipeline {
    /// Open a live capture and start a pipeline on it
    ///
    /// The configuration is validated before the device is touched. Failure
    /// to open the device is returned and nothing is started.
    pub fn start_live(
        interface: &str,
        filter: Option<&str>,
        capture: &CaptureConfig,
        client: impl SinkClient,
        config: PipelineConfig,
    ) -> Result<PipelineHandle> {
        config.validate()?;

        let source = CaptureSource::open_with_config(interface, filter, capture)?;
        if let FilterStatus::Rejected { expression, reason } = source.filter_status() {
            warn!(
                interface,
                filter = %expression,
                reason = %reason,
                "Running without capture filter"
            );
        }

        Self::start(source, client, config)
    }

    /// Start a pipeline reading from `source` and writing through `client`
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S>(source: S, client: impl SinkClient, config: PipelineConfig) -> Result<PipelineHandle>
    where
        S: FrameSource + 'static,
    {
        config.validate()?;

        let run_id = Uuid::now_v7();
        let span = tracing::info_span!("pipeline", run = %run_id);
        let state = StateCell::new();
        let shutdown = CancellationToken::new();

        let (events_tx, events_rx) = mpsc::channel(config.event_buffer);
        let (queue_tx, queue_rx) = record_queue(config.queue_capacity)?;
        let sink = BatchSink::new(client, config.sink.clone(), events_tx)?;

        state.advance(PipelineState::Running);
        info!(
            parent: &span,
            queue_capacity = config.queue_capacity,
            max_items = config.sink.batch.max_items,
            workers = config.sink.workers,
            "Pipeline started"
        );

        let capture_task = {
            let state = state.clone();
            let shutdown = shutdown.clone();
            let span = span.clone();
            tokio::task::spawn_blocking(move || {
                let _entered = span.enter();
                capture_loop(source, queue_tx, &shutdown, &state)
            })
        };

        let sink_task = {
            let shutdown = shutdown.clone();
            tokio::spawn(
                async move {
                    let result = sink.run(queue_rx).await;
                    if result.is_err() {
                        // Nothing can be delivered any more; stop reading frames
                        shutdown.cancel();
                    }
                    result
                }
                .instrument(span.clone()),
            )
        };

        let supervisor = tokio::spawn(
            supervise(run_id, capture_task, sink_task, state.clone()).instrument(span),
        );

        Ok(PipelineHandle {
            run_id,
            state,
            shutdown,
            events: Some(events_rx),
            supervisor,
        })
    }
}

/// Handle to a running pipeline
pub struct PipelineHandle {
    run_id: Uuid,
    state: StateCell,
    shutdown: CancellationToken,
    events: Option<mpsc::Receiver<DeliveryEvent>>,
    supervisor: JoinHandle<Result<PipelineReport>>,
}

impl PipelineHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    /// Take the outcome event stream
    ///
    /// There is one event per record the sink accepted. The stream must be
    /// consumed: once `event_buffer` events are waiting, flushes wait too.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<DeliveryEvent>> {
        self.events.take()
    }

    /// A token that stops the pipeline when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop capturing and drain. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.state.advance(PipelineState::Draining) {
            info!(run = %self.run_id, "Shutdown requested, draining");
        }
        self.shutdown.cancel();
    }

    /// Wait for the run to stop
    ///
    /// Returns the report once every accepted record has had its outcome
    /// reported, or the fatal error that ended the run. A capture device
    /// error is returned only after buffered records were drained.
    pub async fn wait(mut self) -> Result<PipelineReport> {
        // Nobody will read events; don't let flushes wait on them
        drop(self.events.take());

        match self.supervisor.await {
            Ok(result) => result,
            Err(e) => Err(Error::pipeline(format!("pipeline supervisor failed: {}", e))),
        }
    }
}

/// Read, decode and enqueue until shutdown, end of capture or sink exit
fn capture_loop<S: FrameSource>(
    mut source: S,
    queue: RecordSender,
    shutdown: &CancellationToken,
    state: &StateCell,
) -> CaptureExit {
    let mut error = None;

    while !shutdown.is_cancelled() {
        match source.next_frame() {
            Ok(NextFrame::Frame(frame)) => {
                let record = decode(&frame);
                if !record.decode_warnings.is_empty() {
                    trace!(warnings = ?record.decode_warnings, "Frame decoded with warnings");
                }
                if queue.available() == 0 {
                    debug!("Record queue full, capture waiting on the sink");
                }
                if queue.push_blocking(record).is_err() {
                    debug!("Record queue closed, stopping capture");
                    break;
                }
            }
            Ok(NextFrame::Idle) => continue,
            Ok(NextFrame::Closed) => {
                info!("Capture source closed");
                break;
            }
            Err(e) => {
                error!(error = %e, "Capture failed");
                error = Some(e);
                break;
            }
        }
    }

    if state.advance(PipelineState::Draining) {
        info!("Capture stopped, draining");
    }

    // Driver counters are only readable while the device is open
    let stats = source.stats();
    source.close();
    debug!(frames = stats.frames_captured, bytes = stats.bytes_captured, "Capture task finished");

    // The queue sender drops here, which lets the sink drain and exit
    drop(queue);
    CaptureExit { stats, error }
}

async fn supervise(
    run_id: Uuid,
    capture_task: JoinHandle<CaptureExit>,
    sink_task: JoinHandle<Result<DeliveryStats>>,
    state: StateCell,
) -> Result<PipelineReport> {
    let sink_result = match sink_task.await {
        Ok(result) => result,
        Err(e) => Err(Error::pipeline(format!("sink task failed: {}", e))),
    };
    let capture_exit = match capture_task.await {
        Ok(exit) => exit,
        Err(e) => CaptureExit {
            stats: CaptureStats::default(),
            error: Some(Error::pipeline(format!("capture task failed: {}", e))),
        },
    };

    state.advance(PipelineState::Draining);
    state.advance(PipelineState::Stopped);

    let delivery = sink_result?;
    if let Some(e) = capture_exit.error {
        return Err(e);
    }

    info!(
        frames = capture_exit.stats.frames_captured,
        dropped = capture_exit.stats.frames_dropped(),
        delivered = delivery.delivered,
        failed = delivery.failed,
        "Pipeline stopped"
    );

    Ok(PipelineReport {
        run_id,
        capture: capture_exit.stats,
        delivery,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sniffer_core::{LinkType, RawFrame};
    use sniffer_capture::DeviceStats;
    use sniffer_sink::{BatchPolicy, Document, ItemStatus, RetryPolicy, WriteError};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Frame source driven by a script; `Idle` forever once the script runs out
    struct ScriptedSource {
        script: VecDeque<Result<NextFrame>>,
        produced: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<NextFrame>>) -> Self {
            Self {
                script: script.into(),
                produced: Arc::new(AtomicUsize::new(0)),
                closed: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn frames(count: usize) -> Vec<Result<NextFrame>> {
            (0..count)
                .map(|n| {
                    Ok(NextFrame::Frame(RawFrame::new(
                        "test0",
                        LinkType::Ethernet,
                        vec![n as u8; 64],
                    )))
                })
                .collect()
        }
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<NextFrame> {
            match self.script.pop_front() {
                Some(next) => {
                    if matches!(next, Ok(NextFrame::Frame(_))) {
                        self.produced.fetch_add(1, Ordering::SeqCst);
                    }
                    next
                }
                None => {
                    std::thread::sleep(Duration::from_millis(5));
                    Ok(NextFrame::Idle)
                }
            }
        }

        fn stats(&mut self) -> CaptureStats {
            let produced = self.produced.load(Ordering::SeqCst) as u64;
            // Like a pcap handle, counters vanish with the device
            let device = (self.closed.load(Ordering::SeqCst) == 0).then_some(DeviceStats {
                received: produced + 7,
                dropped: 5,
                if_dropped: 2,
            });
            CaptureStats {
                frames_captured: produced,
                device,
                ..Default::default()
            }
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Clone, Default)]
    struct MemoryClient {
        writes: Arc<Mutex<Vec<Vec<u64>>>>,
        reject: bool,
    }

    #[async_trait]
    impl SinkClient for MemoryClient {
        async fn write(
            &self,
            documents: &[Document],
        ) -> std::result::Result<Vec<ItemStatus>, WriteError> {
            if self.reject {
                return Err(WriteError::Rejected("HTTP 401".into()));
            }
            self.writes
                .lock()
                .push(documents.iter().map(|d| d.id).collect());
            Ok(vec![ItemStatus::Ok; documents.len()])
        }

        async fn close(&self) {}
    }

    fn config(queue_capacity: usize, max_items: usize, workers: usize) -> PipelineConfig {
        PipelineConfig {
            queue_capacity,
            event_buffer: 1024,
            sink: SinkConfig {
                batch: BatchPolicy {
                    max_items,
                    max_age: Duration::from_secs(3600),
                },
                workers,
                write_timeout: Duration::from_secs(1),
                retry: RetryPolicy {
                    initial_backoff: Duration::from_millis(1),
                    max_backoff: Duration::from_millis(5),
                    ..Default::default()
                },
            },
        }
    }

    async fn collect(mut events: mpsc::Receiver<DeliveryEvent>) -> Vec<DeliveryEvent> {
        let mut collected = Vec::new();
        while let Some(event) = events.recv().await {
            collected.push(event);
        }
        collected
    }

    #[test]
    fn test_config_defaults_and_validation() {
        let config = PipelineConfig::default();
        assert_eq!(config.queue_capacity, 4096);
        assert_eq!(config.sink.batch.max_items, 500);
        assert!(config.validate().is_ok());

        let config = PipelineConfig {
            queue_capacity: 100,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig { ref name, .. }) if name == "queue_capacity"
        ));
    }

    #[test]
    fn test_config_from_json_flattens_sink_settings() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"queue_capacity": 1000, "workers": 4, "batch": {"max_items": 100}}"#,
        )
        .unwrap();

        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.sink.workers, 4);
        assert_eq!(config.sink.batch.max_items, 100);
        assert_eq!(config.sink.batch.max_age, Duration::from_secs(1));
        assert_eq!(config.event_buffer, 1024);
    }

    #[tokio::test]
    async fn test_invalid_config_starts_nothing() {
        let source = ScriptedSource::new(ScriptedSource::frames(1));
        let result = Pipeline::start(source, MemoryClient::default(), config(2, 10, 1));
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_drains_every_enqueued_record() {
        const N: usize = 10;
        let source = ScriptedSource::new(ScriptedSource::frames(N));
        let produced = Arc::clone(&source.produced);
        let closed = Arc::clone(&source.closed);
        let client = MemoryClient::default();

        let mut handle = Pipeline::start(source, client.clone(), config(64, 500, 2)).unwrap();
        let events = tokio::spawn(collect(handle.take_events().unwrap()));
        assert_eq!(handle.state(), PipelineState::Running);

        while produced.load(Ordering::SeqCst) < N {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // Nothing is flushed before the drain: the batch is neither full nor old
        assert!(client.writes.lock().is_empty());

        handle.shutdown();
        assert_eq!(handle.state(), PipelineState::Draining);
        let report = handle.wait().await.unwrap();
        let events = events.await.unwrap();

        assert_eq!(events.len(), N);
        assert!(events.iter().all(DeliveryEvent::is_delivered));
        assert_eq!(report.delivery.accepted, N as u64);
        assert_eq!(report.delivery.delivered, N as u64);
        assert_eq!(report.capture.frames_captured, N as u64);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_source_end_drains_and_stops() {
        let mut script = ScriptedSource::frames(5);
        script.push(Ok(NextFrame::Closed));
        let client = MemoryClient::default();

        let mut handle =
            Pipeline::start(ScriptedSource::new(script), client.clone(), config(64, 500, 1))
                .unwrap();
        let events = handle.take_events().unwrap();
        let state = handle.state.clone();

        let report = handle.wait().await.unwrap();

        assert_eq!(state.get(), PipelineState::Stopped);
        assert_eq!(collect(events).await.len(), 5);
        assert_eq!(report.delivery.delivered, 5);
        assert_eq!(*client.writes.lock(), vec![vec![0, 1, 2, 3, 4]]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_batches_preserve_capture_order() {
        let mut script = ScriptedSource::frames(10);
        script.push(Ok(NextFrame::Closed));
        let client = MemoryClient::default();

        let handle =
            Pipeline::start(ScriptedSource::new(script), client.clone(), config(16, 4, 1))
                .unwrap();
        handle.wait().await.unwrap();

        assert_eq!(
            *client.writes.lock(),
            vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9]]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_device_error_reported_after_drain() {
        let mut script = ScriptedSource::frames(3);
        script.push(Err(Error::capture("device went away")));

        let mut handle =
            Pipeline::start(ScriptedSource::new(script), MemoryClient::default(), config(64, 500, 1))
                .unwrap();
        let events = handle.take_events().unwrap();

        let result = handle.wait().await;

        assert!(matches!(result, Err(Error::Capture(_))));
        let events = collect(events).await;
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(DeliveryEvent::is_delivered));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sink_rejection_stops_capture() {
        let source = ScriptedSource::new(ScriptedSource::frames(3));
        let closed = Arc::clone(&source.closed);
        let client = MemoryClient {
            reject: true,
            ..Default::default()
        };

        let mut handle = Pipeline::start(source, client, config(64, 1, 1)).unwrap();
        let events = tokio::spawn(collect(handle.take_events().unwrap()));
        let state = handle.state.clone();

        let result = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("pipeline did not stop");

        assert!(matches!(result, Err(Error::SinkRejected(_))));
        assert_eq!(state.get(), PipelineState::Stopped);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(events.await.unwrap().iter().all(|e| !e.is_delivered()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_report_keeps_device_drop_counters() {
        let source = ScriptedSource::new(ScriptedSource::frames(4));
        let produced = Arc::clone(&source.produced);

        let mut handle = Pipeline::start(source, MemoryClient::default(), config(64, 500, 1)).unwrap();
        let _events = handle.take_events();
        while produced.load(Ordering::SeqCst) < 4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        handle.shutdown();
        let report = handle.wait().await.unwrap();

        let device = report.capture.device.expect("device counters missing");
        assert_eq!(device.received, 11);
        assert_eq!(report.capture.frames_dropped(), 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_is_idempotent() {
        let source = ScriptedSource::new(Vec::new());
        let mut handle = Pipeline::start(source, MemoryClient::default(), config(8, 4, 1)).unwrap();
        let _events = handle.take_events();

        handle.shutdown();
        handle.shutdown();
        assert!(handle.shutdown_token().is_cancelled());

        let report = handle.wait().await.unwrap();
        assert_eq!(report.delivery, DeliveryStats::default());
    }
}
