//! Bounded-concurrency query wrapper
//!
//! A fixed number of query slots sits in front of the pool. Each attempt
//! holds a slot only while its query runs; on pool exhaustion the slot is
//! released, the caller sleeps `backoff * attempt` and tries again. After
//! `max_retries` the caller gets [`DbError::Busy`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use enrollalert_core::config::DatabaseSection;
use sqlx::PgPool;
use tokio::sync::Semaphore;

use super::error::{is_retryable, DbError};

/// Retry settings for [`QueryGuard`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
    /// How long to wait for a free query slot per attempt
    pub acquire_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &DatabaseSection) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
            acquire_timeout: Duration::from_millis(config.acquire_timeout_ms),
        }
    }

    /// Linear backoff before attempt `attempt + 1`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DatabaseSection::default())
    }
}

/// Semaphore-limited retry loop, independent of any particular pool
#[derive(Debug)]
pub struct QueryGuard {
    slots: Semaphore,
    policy: RetryPolicy,
}

impl QueryGuard {
    pub fn new(concurrency: usize, policy: RetryPolicy) -> Self {
        Self {
            slots: Semaphore::new(concurrency.max(1)),
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Free query slots right now.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Run `op` under a query slot, retrying retryable failures.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let reason = match tokio::time::timeout(
                self.policy.acquire_timeout,
                self.slots.acquire(),
            )
            .await
            {
                Err(_) => "no free query slot".to_string(),
                Ok(Err(_closed)) => return Err(DbError::Busy { attempts: attempt }),
                Ok(Ok(permit)) => {
                    let result = op().await;
                    drop(permit);
                    match result {
                        Ok(value) => return Ok(value),
                        Err(err) if is_retryable(&err) => err.to_string(),
                        Err(err) => return Err(DbError::Sqlx(err)),
                    }
                }
            };

            if attempt > self.policy.max_retries {
                tracing::warn!(attempts = attempt, %reason, "database busy, giving up");
                return Err(DbError::Busy { attempts: attempt });
            }

            let delay = self.policy.delay_after(attempt);
            tracing::warn!(attempt, ?delay, %reason, "database busy, backing off");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Pool plus query guard, shared by every repository
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
    guard: Arc<QueryGuard>,
}

impl Database {
    pub fn new(pool: PgPool, concurrency: usize, policy: RetryPolicy) -> Self {
        Self {
            pool,
            guard: Arc::new(QueryGuard::new(concurrency, policy)),
        }
    }

    pub fn from_config(pool: PgPool, config: &DatabaseSection) -> Self {
        Self::new(
            pool,
            config.query_concurrency,
            RetryPolicy::from_config(config),
        )
    }

    /// Raw pool, for migrations and tests. Request paths use [`Database::run`].
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn guard(&self) -> &QueryGuard {
        &self.guard
    }

    /// Run a query closure against the pool under the guard.
    ///
    /// The closure may run more than once, so it must only capture
    /// references or cheap clones.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, DbError>
    where
        F: FnMut(PgPool) -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let pool = &self.pool;
        self.guard.run(|| op(pool.clone())).await
    }
}
