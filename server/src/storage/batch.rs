//! Size-limited, retried, concurrency-bounded batch writes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

use super::error::StorageError;
use super::kv::{KeyValueBackend, WriteRequest};

/// Permits handed out when no explicit pool size is configured.
pub const DEFAULT_PARALLEL_OPERATIONS: usize = 128;

/// Retry budget for one chunk's unprocessed items.
const BACKOFF_BUDGET: Duration = Duration::from_secs(600);

const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_MAX_INTERVAL: Duration = Duration::from_secs(60);

/// Bounded counting semaphore gating concurrent batch-write chunks,
/// shared process-wide across all tables.
#[derive(Clone)]
pub struct PermitPool {
    sem: Arc<Semaphore>,
}

impl PermitPool {
    pub fn new(permits: usize) -> Self {
        let permits = if permits < 1 {
            DEFAULT_PARALLEL_OPERATIONS
        } else {
            permits
        };
        Self {
            sem: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Returns when a permit has been acquired. The permit is released
    /// when dropped, on every exit path.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        match self.sem.clone().acquire_owned().await {
            Ok(permit) => permit,
            // The semaphore is never closed.
            Err(_) => unreachable!("permit pool semaphore closed"),
        }
    }

    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }
}

/// Jittered exponential backoff with an elapsed-time budget; `None`
/// from `next_delay` means the budget is spent.
struct Backoff {
    current: Duration,
    elapsed: Duration,
    budget: Duration,
}

impl Backoff {
    fn new(budget: Duration) -> Self {
        Self {
            current: BACKOFF_BASE,
            elapsed: Duration::ZERO,
            budget,
        }
    }

    fn next_delay(&mut self) -> Option<Duration> {
        if self.elapsed >= self.budget {
            return None;
        }
        let base = self.current.as_millis() as u64;
        let jitter = rand::random::<u64>() % (base / 4 + 1);
        let delay = Duration::from_millis(base + jitter).min(self.budget - self.elapsed);
        self.elapsed += delay;
        self.current = (self.current * 2).min(BACKOFF_MAX_INTERVAL);
        Some(delay)
    }
}

/// A failed write: the error plus every request that was not accepted
/// by the backend (the failed chunk's remainder and all unattempted
/// chunks).
#[derive(Debug)]
pub struct BatchFailure {
    pub error: StorageError,
    pub unresolved: Vec<WriteRequest>,
}

pub struct WriteBatcher {
    backend: Arc<dyn KeyValueBackend>,
    pool: PermitPool,
    budget: Duration,
}

impl WriteBatcher {
    pub fn new(backend: Arc<dyn KeyValueBackend>, pool: PermitPool) -> Self {
        Self {
            backend,
            pool,
            budget: BACKOFF_BUDGET,
        }
    }

    /// Overrides the per-chunk retry budget; tests shrink it.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Writes `requests` to `table` in backend-limit-sized chunks,
    /// retrying each chunk's unprocessed subset until the backoff
    /// budget runs out. One permit is held per chunk in flight.
    pub async fn write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<(), BatchFailure> {
        let limit = self.backend.batch_limit().max(1);
        let mut chunks: Vec<Vec<WriteRequest>> = Vec::new();
        let mut requests = requests;
        while !requests.is_empty() {
            let rest = requests.split_off(requests.len().min(limit));
            chunks.push(std::mem::replace(&mut requests, rest));
        }

        for (index, chunk) in chunks.iter().enumerate() {
            let permit = self.pool.acquire().await;
            let result = self.write_chunk(table, chunk.clone()).await;
            drop(permit);

            if let Err((error, mut unresolved)) = result {
                for chunk in &chunks[index + 1..] {
                    unresolved.extend(chunk.iter().cloned());
                }
                warn!(
                    table,
                    unresolved = unresolved.len(),
                    %error,
                    "batch write failed"
                );
                return Err(BatchFailure { error, unresolved });
            }
        }
        Ok(())
    }

    async fn write_chunk(
        &self,
        table: &str,
        mut batch: Vec<WriteRequest>,
    ) -> Result<(), (StorageError, Vec<WriteRequest>)> {
        let mut backoff = Backoff::new(self.budget);
        loop {
            match self.backend.batch_write(table, batch.clone()).await {
                Err(err) => return Err((err.into(), batch)),
                Ok(unprocessed) if unprocessed.is_empty() => return Ok(()),
                Ok(unprocessed) => match backoff.next_delay() {
                    Some(delay) => {
                        batch = unprocessed;
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        let error = StorageError::Timeout {
                            unresolved: unprocessed.len(),
                        };
                        return Err((error, unprocessed));
                    }
                },
            }
        }
    }
}
