//! Bounded worker pool
//!
//! Caps how many executions run at the same time.

#![allow(dead_code)]

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting gate over concurrent executions
///
/// Acquire a slot before running; the slot releases itself on drop.
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a free slot
    ///
    /// The semaphore is never closed, so acquisition only fails on
    /// programmer error.
    pub async fn acquire(&self) -> WorkerSlot {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("worker pool semaphore closed");
        WorkerSlot { _permit: permit }
    }

    /// Take a slot only if one is free right now
    pub fn try_acquire(&self) -> Option<WorkerSlot> {
        self.permits
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| WorkerSlot { _permit: permit })
    }
}

/// Held execution slot; dropping it frees the slot
pub struct WorkerSlot {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_floor() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.capacity(), 1);
    }

    #[test]
    fn test_acquire_release() {
        let pool = WorkerPool::new(2);
        assert_eq!(pool.available(), 2);

        let slot = tokio_test::block_on(pool.acquire());
        assert_eq!(pool.available(), 1);

        drop(slot);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_try_acquire_exhaustion() {
        let pool = WorkerPool::new(1);

        let held = pool.try_acquire();
        assert!(held.is_some());
        assert!(pool.try_acquire().is_none());

        drop(held);
        assert!(pool.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_waiters_unblock_on_release() {
        let pool = Arc::new(WorkerPool::new(1));
        let slot = pool.acquire().await;

        let pool2 = pool.clone();
        let waiter = tokio::spawn(async move {
            let _slot = pool2.acquire().await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(slot);
        waiter.await.unwrap();
        assert_eq!(pool.available(), 1);
    }
}
