//! Bounded-parallel admission for PromQL evaluations.
//!
//! Modeled as a capacity-K semaphore whose owned permits are the opaque
//! tokens: holding a `QuerySlot` is holding a slot, dropping it releases the
//! slot exactly once, even through a panic.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    /// Construction with a capacity below one is unrecoverable.
    #[error("max concurrent queries cannot be lower than 1")]
    InvalidCapacity,

    #[error("when waiting for query concurrency slot: context cancelled")]
    Cancelled,

    #[error("no empty query slot on query tracker")]
    NoSlot,
}

#[derive(Debug)]
pub struct QueryTracker {
    semaphore: Arc<Semaphore>,
    slots: Arc<Mutex<Vec<Option<String>>>>,
    capacity: usize,
}

impl QueryTracker {
    pub fn new(max_concurrent: usize) -> Result<Self, TrackerError> {
        if max_concurrent < 1 {
            return Err(TrackerError::InvalidCapacity);
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            slots: Arc::new(Mutex::new(vec![None; max_concurrent])),
            capacity: max_concurrent,
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.capacity
    }

    /// Wait for a free slot. Blocks until one is available or `cancel` fires,
    /// in which case the waiter unblocks with an error and takes nothing.
    pub async fn insert(
        &self,
        cancel: &CancellationToken,
        query: &str,
    ) -> Result<QuerySlot, TrackerError> {
        let permit = tokio::select! {
            permit = self.semaphore.clone().acquire_owned() => {
                permit.map_err(|_| TrackerError::Cancelled)?
            }
            _ = cancel.cancelled() => return Err(TrackerError::Cancelled),
        };

        let mut slots = lock_slots(&self.slots);
        let idx = slots
            .iter()
            .position(Option::is_none)
            .ok_or(TrackerError::NoSlot)?;
        slots[idx] = Some(query.to_string());
        drop(slots);

        Ok(QuerySlot {
            idx,
            slots: self.slots.clone(),
            _permit: permit,
        })
    }

    /// Release a slot. Equivalent to dropping the token; provided so callers
    /// can make the release explicit.
    pub fn delete(&self, slot: QuerySlot) {
        drop(slot);
    }

    /// Release long-lived resources. The tracker holds none, so this is a
    /// placeholder kept for interface parity.
    pub fn close(&self) -> Result<(), TrackerError> {
        Ok(())
    }

    /// The query texts currently holding slots.
    pub fn active_queries(&self) -> Vec<String> {
        lock_slots(&self.slots)
            .iter()
            .flatten()
            .cloned()
            .collect()
    }
}

/// An opaque token proving a slot is held. Dropping it frees the slot.
#[derive(Debug)]
pub struct QuerySlot {
    idx: usize,
    slots: Arc<Mutex<Vec<Option<String>>>>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for QuerySlot {
    fn drop(&mut self) {
        lock_slots(&self.slots)[self.idx] = None;
    }
}

fn lock_slots(
    slots: &Mutex<Vec<Option<String>>>,
) -> std::sync::MutexGuard<'_, Vec<Option<String>>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn capacity_below_one_fails_hard() {
        assert_eq!(
            QueryTracker::new(0).unwrap_err(),
            TrackerError::InvalidCapacity
        );
    }

    #[tokio::test]
    async fn up_to_capacity_inserts_succeed_immediately() {
        let tracker = QueryTracker::new(2).unwrap();
        let cancel = CancellationToken::new();

        let first = tracker.insert(&cancel, "q1").await.unwrap();
        let _second = tracker.insert(&cancel, "q2").await.unwrap();

        assert_eq!(tracker.active_queries().len(), 2);
        tracker.delete(first);
        assert_eq!(tracker.active_queries().len(), 1);
    }

    #[tokio::test]
    async fn the_capacity_plus_one_insert_blocks_until_a_delete() {
        let tracker = Arc::new(QueryTracker::new(1).unwrap());
        let cancel = CancellationToken::new();

        let held = tracker.insert(&cancel, "holder").await.unwrap();

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            tracker.insert(&cancel, "waiter"),
        )
        .await;
        assert!(blocked.is_err(), "insert should still be waiting");

        let waiter = {
            let tracker = tracker.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { tracker.insert(&cancel, "waiter").await })
        };

        tracker.delete(held);
        let slot = tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("waiter should be unblocked")
            .unwrap()
            .unwrap();
        drop(slot);
    }

    #[tokio::test]
    async fn cancellation_unblocks_a_waiter_with_an_error() {
        let tracker = Arc::new(QueryTracker::new(1).unwrap());
        let cancel = CancellationToken::new();

        let _held = tracker.insert(&cancel, "holder").await.unwrap();

        let waiter_cancel = CancellationToken::new();
        let waiter = {
            let tracker = tracker.clone();
            let token = waiter_cancel.clone();
            tokio::spawn(async move { tracker.insert(&token, "waiter").await })
        };

        waiter_cancel.cancel();
        let result = tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("waiter should return promptly")
            .unwrap();
        assert_eq!(result.unwrap_err(), TrackerError::Cancelled);

        // The cancelled waiter took no slot.
        assert_eq!(tracker.active_queries(), vec!["holder".to_string()]);
    }

    #[tokio::test]
    async fn a_dropped_slot_is_released_exactly_once() {
        let tracker = QueryTracker::new(1).unwrap();
        let cancel = CancellationToken::new();

        for round in 0..3 {
            let slot = tracker
                .insert(&cancel, &format!("query-{round}"))
                .await
                .unwrap();
            drop(slot);
        }
        assert!(tracker.active_queries().is_empty());
    }

    #[test]
    fn max_concurrent_reports_the_configured_capacity() {
        let tracker = QueryTracker::new(7).unwrap();
        assert_eq!(tracker.max_concurrent(), 7);
    }
}
