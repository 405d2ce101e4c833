//! Delivery outcomes reported to the pipeline owner

use serde::Serialize;
use sniffer_core::DecodedRecord;

/// Final outcome of one accepted record
#[derive(Debug, Clone)]
pub enum DeliveryEvent {
    /// The sink acknowledged the record
    Delivered { id: u64 },
    /// The record will not be delivered; it is handed back for dead-lettering
    Failed {
        id: u64,
        reason: String,
        record: DecodedRecord,
    },
}

impl DeliveryEvent {
    pub fn id(&self) -> u64 {
        match self {
            DeliveryEvent::Delivered { id } | DeliveryEvent::Failed { id, .. } => *id,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryEvent::Delivered { .. })
    }
}

/// Aggregate delivery counters for one sink run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    /// Records taken off the queue
    pub accepted: u64,
    pub delivered: u64,
    pub failed: u64,
    /// Item requeues after a transient failure
    pub retried: u64,
    /// Write calls that completed, including retries
    pub batches: u64,
}

impl DeliveryStats {
    /// Accepted records without an outcome yet
    pub fn outstanding(&self) -> u64 {
        self.accepted
            .saturating_sub(self.delivered)
            .saturating_sub(self.failed)
    }

    pub fn merge(&mut self, other: &DeliveryStats) {
        self.accepted += other.accepted;
        self.delivered += other.delivered;
        self.failed += other.failed;
        self.retried += other.retried;
        self.batches += other.batches;
    }
}
