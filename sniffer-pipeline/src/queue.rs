//! Bounded record queue between the capture thread and the batch sink

use sniffer_core::{DecodedRecord, Error, Result};
use tokio::sync::mpsc;

/// Producer side, used from the blocking capture thread
#[derive(Debug, Clone)]
pub struct RecordSender {
    inner: mpsc::Sender<DecodedRecord>,
}

/// The consumer went away; the record was not queued
#[derive(Debug)]
pub struct QueueClosed(pub DecodedRecord);

impl RecordSender {
    /// Queue a record, blocking the calling thread while the queue is full
    ///
    /// Must not be called from async code.
    pub fn push_blocking(&self, record: DecodedRecord) -> std::result::Result<(), QueueClosed> {
        self.inner
            .blocking_send(record)
            .map_err(|mpsc::error::SendError(record)| QueueClosed(record))
    }

    /// Free slots right now
    pub fn available(&self) -> usize {
        self.inner.capacity()
    }
}

/// Allocate a queue holding at most `capacity` records
pub fn record_queue(capacity: usize) -> Result<(RecordSender, mpsc::Receiver<DecodedRecord>)> {
    if capacity == 0 {
        return Err(Error::invalid_config("queue_capacity", "must be at least 1"));
    }
    let (tx, rx) = mpsc::channel(capacity);
    Ok((RecordSender { inner: tx }, rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn record() -> DecodedRecord {
        DecodedRecord::new(Utc::now())
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(record_queue(0), Err(Error::InvalidConfig { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_push_blocks_when_full() {
        const CAPACITY: usize = 4;
        let (tx, mut rx) = record_queue(CAPACITY).unwrap();
        let pushed = Arc::new(AtomicUsize::new(0));

        let producer = {
            let pushed = Arc::clone(&pushed);
            tokio::task::spawn_blocking(move || {
                for _ in 0..=CAPACITY {
                    tx.push_blocking(record()).unwrap();
                    pushed.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        // Stalled consumer: the extra record stays blocked
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(pushed.load(Ordering::SeqCst), CAPACITY);

        // One slot drains, the blocked push completes
        rx.recv().await.unwrap();
        producer.await.unwrap();
        assert_eq!(pushed.load(Ordering::SeqCst), CAPACITY + 1);
    }

    #[tokio::test]
    async fn test_push_after_consumer_dropped() {
        let (tx, rx) = record_queue(1).unwrap();
        drop(rx);

        let result = tokio::task::spawn_blocking(move || {
            tx.push_blocking(record())
        })
        .await
        .unwrap();

        assert!(matches!(result, Err(QueueClosed(_))));
    }

    #[tokio::test]
    async fn test_available_slots() {
        let (tx, _rx) = record_queue(2).unwrap();
        assert_eq!(tx.available(), 2);

        let tx = tokio::task::spawn_blocking(move || {
            tx.push_blocking(record()).unwrap();
            tx
        })
        .await
        .unwrap();
        assert_eq!(tx.available(), 1);
    }
}
