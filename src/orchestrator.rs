//! Retry, memoization and concurrency limits around units of crawl work.
//!
//! The pipeline only sees [`Orchestrator::submit`]. [`TaskRunner`] is the production
//! implementation; [`Inline`] runs work once and remembers nothing.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

use crate::config::OrchestratorConfig;
use crate::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    CategoryPage,
    ListingPage,
    ProductPage,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::CategoryPage => "find_category_pages",
            Stage::ListingPage => "find_product_pages",
            Stage::ProductPage => "extract_product_info",
        }
    }
}

/// Cache key for one unit of work: the stage plus the URL it runs against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub stage: Stage,
    pub url: String,
}

impl TaskKey {
    pub fn new(stage: Stage, url: impl Into<String>) -> Self {
        Self {
            stage,
            url: url.into(),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.stage.as_str(), self.url)
    }
}

pub trait Orchestrator: Send + Sync {
    /// Runs `work` under this orchestrator's policy; `work` may be called more than once.
    fn submit<T, F, Fut>(&self, key: TaskKey, work: F) -> impl Future<Output = Result<T>> + Send
    where
        T: Clone + Serialize + DeserializeOwned + Send + 'static,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send;
}

/// Runs each unit of work exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Orchestrator for Inline {
    fn submit<T, F, Fut>(&self, _key: TaskKey, work: F) -> impl Future<Output = Result<T>> + Send
    where
        T: Clone + Serialize + DeserializeOwned + Send + 'static,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
    {
        async move { work().await }
    }
}

struct CachedResult {
    value: serde_json::Value,
    expires_at: DateTime<Utc>,
}

pub struct TaskRunner {
    config: OrchestratorConfig,
    permits: Arc<Semaphore>,
    cache: RwLock<HashMap<TaskKey, CachedResult>>,
}

impl TaskRunner {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(config.max_concurrent)),
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Entries held in the cache; expired ones stay until the next store or lookup evicts them.
    pub async fn cached_entries(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &TaskKey) -> Option<T> {
        let mut cache = self.cache.write().await;
        let entry = cache.get(key)?;
        if entry.expires_at <= Utc::now() {
            cache.remove(key);
            return None;
        }
        serde_json::from_value(entry.value.clone()).ok()
    }

    async fn store(&self, key: TaskKey, value: serde_json::Value) {
        let now = Utc::now();
        let ttl = ChronoDuration::seconds(self.config.cache_ttl_secs as i64);
        let mut cache = self.cache.write().await;
        cache.retain(|_, entry| entry.expires_at > now);
        cache.insert(
            key,
            CachedResult {
                value,
                expires_at: now + ttl,
            },
        );
    }
}

/// Delays of roughly 2, 4, 8... times `base_ms`, jittered.
fn backoff(base_ms: u64, attempts: usize) -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(2)
        .factor(base_ms.max(1))
        .map(jitter)
        .take(attempts)
}

impl Orchestrator for TaskRunner {
    fn submit<T, F, Fut>(&self, key: TaskKey, work: F) -> impl Future<Output = Result<T>> + Send
    where
        T: Clone + Serialize + DeserializeOwned + Send + 'static,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
    {
        async move {
            if let Some(hit) = self.lookup::<T>(&key).await {
                tracing::debug!("Cache hit for {}", key);
                return Ok(hit);
            }

            let task_timeout = Duration::from_secs(self.config.task_timeout_secs);
            let attempt = || {
                let permits = Arc::clone(&self.permits);
                let key = &key;
                let work = &work;
                async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|e| AppError::Internal(format!("Task permits closed: {}", e)))?;
                    tokio::time::timeout(task_timeout, work())
                        .await
                        .map_err(|_| AppError::TaskTimeout {
                            key: key.to_string(),
                        })?
                }
            };

            let result = RetryIf::start(
                backoff(self.config.retry_base_delay_ms, self.config.retry_attempts),
                attempt,
                |e: &AppError| {
                    let retry = e.is_transient();
                    if retry {
                        tracing::warn!("Retrying {} after transient failure: {}", key, e);
                    }
                    retry
                },
            )
            .await?;

            // Serialize before awaiting the lock so no borrow of the result is held across it
            match serde_json::to_value(&result) {
                Ok(value) => self.store(key, value).await,
                Err(e) => tracing::warn!("Not caching result for {}: {}", key, e),
            }
            Ok(result)
        }
    }
}
