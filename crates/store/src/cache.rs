use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::StoreError;

/// TTL-backed key-value store. Values are opaque strings; callers serialize
/// their own payloads. Consumers treat any error as a miss.
#[async_trait]
pub trait TtlCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration)
        -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct InMemoryTtlCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl InMemoryTtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops expired entries; useful for long-lived processes.
    pub async fn purge_expired(&self) {
        let now = Utc::now();
        self.entries.write().await.retain(|_, entry| entry.expires_at > now);
    }
}

#[async_trait]
impl TtlCache for InMemoryTtlCache {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Utc::now() => Ok(Some(entry.value.clone())),
            _ => Ok(None),
        }
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl)
                .map_err(|error| StoreError::Decode(format!("ttl out of range: {error}")))?;
        self.entries.write().await.insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
