//! Bounded worker pool for CPU-bound build work.
//!
//! Jobs run on tokio's blocking threads, gated by a semaphore so at most
//! `size` jobs execute at once. Submitting never blocks the caller; the
//! returned future waits for a free worker and then for the job itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

/// Why a pooled job produced no value.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("job exceeded its {}ms budget", .0.as_millis())]
    Timeout(Duration),

    #[error("job panicked: {0}")]
    Panicked(String),

    #[error("worker pool is shut down")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
    timeout: Option<Duration>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
            timeout: None,
        }
    }

    /// Available parallelism minus one unit reserved for the coordinator.
    pub fn default_size() -> usize {
        num_cpus::get().saturating_sub(1).max(1)
    }

    /// Pool sized from `workers`, or [`WorkerPool::default_size`] when unset.
    pub fn with_workers(workers: Option<usize>) -> Self {
        Self::new(workers.unwrap_or_else(Self::default_size))
    }

    /// Abandon jobs that run longer than `timeout`.
    ///
    /// The budget starts once a worker picks the job up, so time spent
    /// queueing never counts against it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `job` on a worker.
    ///
    /// A timed-out job keeps its worker until it returns; its result is
    /// discarded.
    pub async fn run<T, F>(&self, job: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        });

        let joined = match self.timeout {
            Some(budget) => tokio::time::timeout(budget, handle)
                .await
                .map_err(|_| PoolError::Timeout(budget))?,
            None => handle.await,
        };

        joined.map_err(|e| PoolError::Panicked(e.to_string()))
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(Self::default_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::task::JoinSet;

    #[test]
    fn size_is_at_least_one() {
        assert_eq!(WorkerPool::new(0).size(), 1);
        assert!(WorkerPool::default_size() >= 1);
        assert_eq!(WorkerPool::with_workers(Some(3)).size(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn runs_jobs_and_returns_values() {
        let pool = WorkerPool::new(2);
        assert_eq!(pool.run(|| 21 * 2).await.unwrap(), 42);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn never_exceeds_its_size() {
        let pool = WorkerPool::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut jobs = JoinSet::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            jobs.spawn(async move {
                pool.run(move || {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            });
        }
        while let Some(joined) = jobs.join_next().await {
            joined.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_jobs_time_out() {
        let pool = WorkerPool::new(1).with_timeout(Duration::from_millis(20));
        let result = pool
            .run(|| std::thread::sleep(Duration::from_millis(500)))
            .await;
        assert!(matches!(result, Err(PoolError::Timeout(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn panics_become_errors() {
        let pool = WorkerPool::new(1);
        let result: Result<(), _> = pool.run(|| panic!("boom")).await;
        assert!(matches!(result, Err(PoolError::Panicked(_))));
    }
}
