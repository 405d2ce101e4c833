//! Batch sink: forms batches from the record queue and flushes them
//!
//! One task owns the current batch and dispatches flushes to at most
//! `workers` concurrent flush tasks. Items a flush reports as transiently
//! failed come back to the batching task and are written again ahead of
//! newly queued records. The sink stops taking from the queue while a full
//! batch is waiting for a free worker, so a slow store slows the producer.
//!
//! When the queue closes the sink drains: everything already accepted is
//! flushed, every accepted record gets exactly one [`DeliveryEvent`], and the
//! client is closed once.

use serde::Deserialize;
use sniffer_core::{DecodedRecord, Error, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::batch::{Batch, BatchPolicy, Pending};
use crate::client::{Document, ItemStatus, SinkClient, WriteError};
use crate::outcome::{DeliveryEvent, DeliveryStats};
use crate::retry::{millis, RetryPolicy};

/// Batching, concurrency and retry settings for a [`BatchSink`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub batch: BatchPolicy,
    /// Flushes allowed in flight at once
    pub workers: usize,
    /// Bound on a single write call
    #[serde(rename = "write_timeout_ms", with = "millis")]
    pub write_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            batch: BatchPolicy::default(),
            workers: 2,
            write_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

impl SinkConfig {
    pub fn validate(&self) -> Result<()> {
        self.batch.validate()?;
        self.retry.validate()?;
        if self.workers == 0 {
            return Err(Error::invalid_config("workers", "must be at least 1"));
        }
        if self.write_timeout.is_zero() {
            return Err(Error::invalid_config("write_timeout_ms", "must be positive"));
        }
        Ok(())
    }
}

/// What a finished flush hands back to the batching task
struct FlushOutcome {
    batch_id: Uuid,
    stats: DeliveryStats,
    requeue: Vec<Pending>,
    fatal: Option<Error>,
}

/// Accumulates records into batches and writes them through a [`SinkClient`]
pub struct BatchSink {
    client: Arc<dyn SinkClient>,
    config: SinkConfig,
    events: mpsc::Sender<DeliveryEvent>,
}

impl BatchSink {
    /// Create a sink that owns `client` and reports outcomes on `events`
    pub fn new(
        client: impl SinkClient,
        config: SinkConfig,
        events: mpsc::Sender<DeliveryEvent>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: Arc::new(client),
            config,
            events,
        })
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Consume records from `queue` until it closes, then drain
    ///
    /// Returns the delivery counters, or the fatal error that stopped the
    /// sink. Either way the client has been closed and every accepted record
    /// has had its outcome reported.
    pub async fn run(self, mut queue: mpsc::Receiver<DecodedRecord>) -> Result<DeliveryStats> {
        let policy = self.config.batch.clone();
        let mut stats = DeliveryStats::default();
        let mut current = Batch::new();
        let mut backlog: VecDeque<Pending> = VecDeque::new();
        let mut workers: JoinSet<FlushOutcome> = JoinSet::new();
        let mut next_id: u64 = 0;
        let mut queue_open = true;
        let mut fatal: Option<Error> = None;

        info!(
            max_items = policy.max_items,
            max_age_ms = policy.max_age.as_millis() as u64,
            workers = self.config.workers,
            "Batch sink started"
        );

        loop {
            if fatal.is_some() {
                // Stop accepting; fail whatever is buffered and wait out in-flight flushes
                if queue_open {
                    queue.close();
                    queue_open = false;
                    // Records already in the channel are failed along with the rest
                    while let Ok(record) = queue.try_recv() {
                        backlog.push_back(Pending::new(next_id, record));
                        next_id += 1;
                        stats.accepted += 1;
                    }
                }
                let reason = fatal
                    .as_ref()
                    .map(|e| format!("sink stopped: {}", e))
                    .unwrap_or_default();
                let buffered = std::mem::take(&mut current)
                    .into_items()
                    .into_iter()
                    .chain(backlog.drain(..));
                for item in buffered {
                    stats.failed += 1;
                    self.emit(DeliveryEvent::Failed {
                        id: item.id,
                        reason: reason.clone(),
                        record: item.record,
                    })
                    .await;
                }

                match workers.join_next().await {
                    Some(joined) => {
                        self.absorb(joined, &mut stats, &mut backlog, &mut fatal);
                        continue;
                    }
                    None => break,
                }
            }

            // Retries go out ahead of newly queued records
            while !current.is_full(&policy) {
                match backlog.pop_front() {
                    Some(item) => current.push(item),
                    None => break,
                }
            }

            let can_dispatch = workers.len() < self.config.workers;
            let flush_due = !current.is_empty()
                && (current.is_full(&policy) || current.is_expired(&policy) || !queue_open);

            if flush_due && can_dispatch {
                let batch = std::mem::take(&mut current);
                self.dispatch(&mut workers, batch);
                continue;
            }

            if !queue_open && current.is_empty() && backlog.is_empty() && workers.is_empty() {
                break;
            }

            let accepting = queue_open && !current.is_full(&policy);
            let deadline = current.deadline(&policy);

            tokio::select! {
                received = queue.recv(), if accepting => match received {
                    Some(record) => {
                        current.push(Pending::new(next_id, record));
                        next_id += 1;
                        stats.accepted += 1;
                    }
                    None => {
                        queue_open = false;
                        debug!(buffered = current.len() + backlog.len(), "Queue closed, draining");
                    }
                },
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    self.absorb(joined, &mut stats, &mut backlog, &mut fatal);
                }
                _ = sleep_until(deadline), if deadline.is_some() && can_dispatch => {}
                else => {
                    fatal = Some(Error::pipeline("batch sink has nothing to wait on"));
                }
            }
        }

        self.client.close().await;

        info!(
            accepted = stats.accepted,
            delivered = stats.delivered,
            failed = stats.failed,
            retried = stats.retried,
            "Batch sink stopped"
        );

        match fatal {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }

    fn dispatch(&self, workers: &mut JoinSet<FlushOutcome>, batch: Batch) {
        debug!(batch = %batch.id(), items = batch.len(), "Dispatching flush");
        let client = Arc::clone(&self.client);
        let config = self.config.clone();
        let events = self.events.clone();
        workers.spawn(flush(client, config, events, batch));
    }

    fn absorb(
        &self,
        joined: std::result::Result<FlushOutcome, tokio::task::JoinError>,
        stats: &mut DeliveryStats,
        backlog: &mut VecDeque<Pending>,
        fatal: &mut Option<Error>,
    ) {
        match joined {
            Ok(outcome) => {
                stats.merge(&outcome.stats);
                if !outcome.requeue.is_empty() {
                    debug!(
                        batch = %outcome.batch_id,
                        items = outcome.requeue.len(),
                        "Requeueing transiently failed items"
                    );
                }
                backlog.extend(outcome.requeue);
                if let Some(e) = outcome.fatal {
                    error!(batch = %outcome.batch_id, error = %e, "Flush failed fatally");
                    fatal.get_or_insert(e);
                }
            }
            Err(e) => {
                error!(error = %e, "Flush task failed");
                fatal.get_or_insert(Error::pipeline(format!("flush task failed: {}", e)));
            }
        }
    }

    async fn emit(&self, event: DeliveryEvent) {
        send_event(&self.events, event).await;
    }
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn send_event(events: &mpsc::Sender<DeliveryEvent>, event: DeliveryEvent) {
    if events.send(event).await.is_err() {
        debug!("Delivery event receiver dropped");
    }
}

/// Write one batch, retrying the whole call while the store is unreachable
async fn flush(
    client: Arc<dyn SinkClient>,
    config: SinkConfig,
    events: mpsc::Sender<DeliveryEvent>,
    batch: Batch,
) -> FlushOutcome {
    let batch_id = batch.id();
    let mut outcome = FlushOutcome {
        batch_id,
        stats: DeliveryStats::default(),
        requeue: Vec::new(),
        fatal: None,
    };

    let mut items = Vec::with_capacity(batch.len());
    let mut documents = Vec::with_capacity(batch.len());
    for item in batch.into_items() {
        match serde_json::to_string(&item.record) {
            Ok(body) => {
                documents.push(Document { id: item.id, body });
                items.push(item);
            }
            Err(e) => {
                let err = Error::Serialization(e.to_string());
                warn!(batch = %batch_id, id = item.id, error = %err, "Record not serializable");
                outcome.stats.failed += 1;
                send_event(
                    &events,
                    DeliveryEvent::Failed {
                        id: item.id,
                        reason: err.to_string(),
                        record: item.record,
                    },
                )
                .await;
            }
        }
    }

    if documents.is_empty() {
        return outcome;
    }

    let retry = &config.retry;
    let mut attempt = 0;
    let statuses = loop {
        attempt += 1;
        let error = match tokio::time::timeout(config.write_timeout, client.write(&documents)).await
        {
            Ok(Ok(statuses)) => break statuses,
            Ok(Err(e)) => e,
            Err(_) => WriteError::Unavailable(format!(
                "write timed out after {}ms",
                config.write_timeout.as_millis()
            )),
        };

        if !error.is_retryable() {
            error!(batch = %batch_id, error = %error, "Sink rejected write");
            outcome.fatal = Some(Error::SinkRejected(error.to_string()));
        } else if attempt >= retry.max_connect_attempts {
            error!(batch = %batch_id, attempts = attempt, error = %error, "Sink unreachable");
            outcome.fatal = Some(Error::SinkUnreachable {
                attempts: attempt,
                reason: error.to_string(),
            });
        } else {
            let delay = retry.backoff(attempt);
            warn!(
                batch = %batch_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Write failed, retrying batch"
            );
            tokio::time::sleep(delay).await;
            continue;
        }

        for item in items {
            outcome.stats.failed += 1;
            send_event(
                &events,
                DeliveryEvent::Failed {
                    id: item.id,
                    reason: error.to_string(),
                    record: item.record,
                },
            )
            .await;
        }
        return outcome;
    };

    outcome.stats.batches += 1;

    let mut statuses = statuses.into_iter();
    for mut item in items {
        let status = statuses
            .next()
            .unwrap_or_else(|| ItemStatus::Transient("no status returned".to_string()));

        match status {
            ItemStatus::Ok => {
                outcome.stats.delivered += 1;
                send_event(&events, DeliveryEvent::Delivered { id: item.id }).await;
            }
            ItemStatus::Transient(reason) => {
                item.attempts += 1;
                if item.attempts >= retry.max_item_attempts {
                    warn!(batch = %batch_id, id = item.id, reason = %reason, "Giving up on item");
                    outcome.stats.failed += 1;
                    send_event(
                        &events,
                        DeliveryEvent::Failed {
                            id: item.id,
                            reason: format!("gave up after {} attempts: {}", item.attempts, reason),
                            record: item.record,
                        },
                    )
                    .await;
                } else {
                    outcome.stats.retried += 1;
                    outcome.requeue.push(item);
                }
            }
            ItemStatus::Permanent(reason) => {
                debug!(batch = %batch_id, id = item.id, reason = %reason, "Item rejected");
                outcome.stats.failed += 1;
                send_event(
                    &events,
                    DeliveryEvent::Failed {
                        id: item.id,
                        reason,
                        record: item.record,
                    },
                )
                .await;
            }
        }
    }

    debug!(
        batch = %batch_id,
        delivered = outcome.stats.delivered,
        failed = outcome.stats.failed,
        requeued = outcome.requeue.len(),
        "Flush complete"
    );
    outcome
}
