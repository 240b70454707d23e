//! Worker slots for concurrent request executions.
//!
//! [`WorkerPool`] caps the number of in-flight executions using a tokio semaphore. Each
//! [`WorkerPermit`] holds one slot for the lifetime of an execution and returns it on drop.
//! The pool is owned by the [`RateScheduler`](crate::schedule::RateScheduler), which is the only
//! authority deciding how many executions may start.
//!
//! Unlike a request limiter, the pool emits no metrics of its own and never reports an error:
//! a full pool yields `None` from [`WorkerPool::try_acquire`], and saturation is an ordinary
//! scheduling outcome.

use std::sync::Arc;

use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// Limits concurrent executions and tracks the in-flight count.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    released: Arc<Notify>,
}

impl WorkerPool {
    /// Creates a new pool with the given number of worker slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            released: Arc::new(Notify::new()),
        }
    }

    /// Tries to take a free worker slot.
    ///
    /// Returns `None` when all slots are in use.
    pub fn try_acquire(&self) -> Option<WorkerPermit> {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;

        Some(WorkerPermit {
            permit: Some(permit),
            released: Arc::clone(&self.released),
        })
    }

    /// Total number of worker slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held by executions.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Number of slots available for new executions.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits until all slots have been returned.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.released.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// RAII guard for a worker slot.
///
/// Dropping the permit releases the slot and wakes tasks in [`WorkerPool::wait_idle`].
#[derive(Debug)]
pub struct WorkerPermit {
    permit: Option<OwnedSemaphorePermit>,
    released: Arc<Notify>,
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        drop(self.permit.take());
        self.released.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn slots_add_up_to_capacity() {
        let pool = WorkerPool::new(3);
        let mut permits = Vec::new();

        for expected in 1..=3 {
            permits.push(pool.try_acquire().unwrap());
            assert_eq!(pool.in_flight(), expected);
            assert_eq!(pool.in_flight() + pool.available(), pool.capacity());
        }
        assert!(pool.try_acquire().is_none());

        permits.pop();
        assert_eq!(pool.in_flight(), 2);
        assert!(pool.try_acquire().is_some());
    }

    #[test]
    fn empty_pool_never_grants() {
        // a ramp that never rises above zero workers
        let pool = WorkerPool::new(0);
        assert!(pool.try_acquire().is_none());
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn clones_share_slots() {
        let pool = WorkerPool::new(1);
        let clone = pool.clone();

        let permit = clone.try_acquire().unwrap();
        assert_eq!(pool.in_flight(), 1);
        assert!(pool.try_acquire().is_none());

        drop(permit);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn wait_idle_waits_for_last_permit() {
        let pool = WorkerPool::new(2);
        let first = pool.try_acquire().unwrap();
        let second = pool.try_acquire().unwrap();

        let mut idle = Box::pin(pool.wait_idle());
        assert!(futures::poll!(&mut idle).is_pending());

        drop(second);
        assert!(futures::poll!(&mut idle).is_pending());

        drop(first);
        assert!(futures::poll!(&mut idle).is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_idle_follows_spawned_tasks() {
        let pool = WorkerPool::new(4);
        for millis in [10, 20, 30] {
            let permit = pool.try_acquire().unwrap();
            tokio::spawn(async move {
                let _permit = permit;
                tokio::time::sleep(Duration::from_millis(millis)).await;
            });
        }

        let start = tokio::time::Instant::now();
        pool.wait_idle().await;
        assert_eq!(pool.in_flight(), 0);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn idle_pool_resolves_immediately() {
        let pool = WorkerPool::new(5);
        let idle = Box::pin(pool.wait_idle());
        assert!(futures::poll!(idle).is_ready());
    }
}
