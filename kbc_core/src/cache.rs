//! TTL-bounded memoization of fetched schedules.
//!
//! Council sites are slow and grumpy, and their data changes at most daily,
//! so fetch results are parked in an external key-value store for 24 hours.
//! The store owns expiry entirely; nothing here tracks time. A store outage
//! degrades to a live fetch, never to a failed request.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::AsyncCommands;

use crate::error::StoreError;
use crate::schedule::ScheduleEntry;

/// Schedules go stale after the councils' own daily refresh cadence.
pub const SCHEDULE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The get/put-with-TTL capability the core consumes.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
}

/// Redis-backed store used in production.
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let pool = PoolConfig::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self
            .pool
            .get()
            .await
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        Ok(connection.get(key).await?)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut connection = self
            .pool
            .get()
            .await
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        connection.set_ex::<_, _, ()>(key, value, ttl.as_secs()).await?;
        Ok(())
    }
}

/// In-memory store for tests and one-shot CLI runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }
}

/// Schedule-shaped façade over a [`KeyValueStore`].
pub struct ScheduleCache {
    store: Arc<dyn KeyValueStore>,
}

impl ScheduleCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(source: &str, property: &str) -> String {
        format!("bins:{source}:{property}")
    }

    pub async fn get(&self, source: &str, property: &str) -> Option<Vec<ScheduleEntry>> {
        let key = Self::key(source, property);
        match self.store.get(&key).await {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(entries) => Some(entries),
                Err(err) => {
                    tracing::warn!(key, error = %err, "discarding undecodable cache payload");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(key, error = %err, "cache read failed, forcing live fetch");
                None
            }
        }
    }

    /// Cache a fetch result. Empty results are never cached: an empty scrape
    /// is a possibly-transient failure and must not poison the next request.
    pub async fn put(&self, source: &str, property: &str, entries: &[ScheduleEntry]) {
        if entries.is_empty() {
            return;
        }
        let key = Self::key(source, property);
        let payload = match serde_json::to_string(entries) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to encode cache payload");
                return;
            }
        };
        if let Err(err) = self.store.put(&key, &payload, SCHEDULE_TTL).await {
            tracing::warn!(key, error = %err, "cache write failed");
        }
    }
}
