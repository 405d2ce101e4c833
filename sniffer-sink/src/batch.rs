//! Batch formation

use serde::Deserialize;
use sniffer_core::{DecodedRecord, Error, Result};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::retry::millis;

/// When a batch is flushed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BatchPolicy {
    /// Flush as soon as the batch holds this many records
    pub max_items: usize,
    /// Flush this long after the first record was added
    #[serde(rename = "max_age_ms", with = "millis")]
    pub max_age: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            max_items: 500,
            max_age: Duration::from_secs(1),
        }
    }
}

impl BatchPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_items == 0 {
            return Err(Error::invalid_config("batch.max_items", "must be at least 1"));
        }
        if self.max_age.is_zero() {
            return Err(Error::invalid_config("batch.max_age_ms", "must be positive"));
        }
        Ok(())
    }
}

/// A record accepted by the sink and awaiting its outcome
#[derive(Debug, Clone)]
pub struct Pending {
    pub id: u64,
    pub record: DecodedRecord,
    /// Write attempts that reported this record as transiently failed
    pub attempts: u32,
}

impl Pending {
    pub fn new(id: u64, record: DecodedRecord) -> Self {
        Self {
            id,
            record,
            attempts: 0,
        }
    }
}

/// Records flushed together in one write
#[derive(Debug)]
pub struct Batch {
    id: Uuid,
    items: Vec<Pending>,
    opened_at: Option<Instant>,
}

impl Batch {
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            items: Vec::new(),
            opened_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Append an item; the first item starts the age timer
    pub fn push(&mut self, item: Pending) {
        if self.items.is_empty() {
            self.opened_at = Some(Instant::now());
        }
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self, policy: &BatchPolicy) -> bool {
        self.items.len() >= policy.max_items
    }

    /// When the batch must be flushed by age, if it holds anything
    pub fn deadline(&self, policy: &BatchPolicy) -> Option<Instant> {
        self.opened_at.map(|opened| opened + policy.max_age)
    }

    pub fn is_expired(&self, policy: &BatchPolicy) -> bool {
        self.deadline(policy)
            .is_some_and(|deadline| deadline <= Instant::now())
    }

    pub fn into_items(self) -> Vec<Pending> {
        self.items
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn pending(id: u64) -> Pending {
        Pending::new(id, DecodedRecord::new(Utc::now()))
    }

    #[test]
    fn test_policy_defaults() {
        let policy = BatchPolicy::default();
        assert_eq!(policy.max_items, 500);
        assert_eq!(policy.max_age, Duration::from_secs(1));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_policy_validate() {
        let policy = BatchPolicy {
            max_items: 0,
            ..Default::default()
        };
        assert!(policy.validate().is_err());

        let policy = BatchPolicy {
            max_age: Duration::ZERO,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_empty_batch_has_no_deadline() {
        let batch = Batch::new();
        let policy = BatchPolicy::default();

        assert!(batch.is_empty());
        assert!(batch.deadline(&policy).is_none());
        assert!(!batch.is_expired(&policy));
    }

    #[test]
    fn test_batch_fills_in_order() {
        let policy = BatchPolicy {
            max_items: 3,
            max_age: Duration::from_secs(60),
        };
        let mut batch = Batch::new();

        for id in 0..3 {
            assert!(!batch.is_full(&policy));
            batch.push(pending(id));
        }

        assert!(batch.is_full(&policy));
        assert!(!batch.is_expired(&policy));
        let ids: Vec<u64> = batch.into_items().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_batch_expires() {
        let policy = BatchPolicy {
            max_items: 10,
            max_age: Duration::from_millis(10),
        };
        let mut batch = Batch::new();
        batch.push(pending(0));

        std::thread::sleep(Duration::from_millis(20));
        assert!(batch.is_expired(&policy));
    }

    #[test]
    fn test_batch_ids_are_unique() {
        assert_ne!(Batch::new().id(), Batch::new().id());
    }
}
