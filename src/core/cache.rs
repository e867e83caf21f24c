//! Read-through cache for views shared between students.
//!
//! Invalidation contract: whoever writes to a source collection invalidates the matching
//! [`CacheKey`] right after the write succeeds.
//!
//! | Source collection            | Key                    | Invalidated by                         |
//! |------------------------------|------------------------|----------------------------------------|
//! | users                        | `Users`                | account admin, password change, rollup |
//! | sentence catalog             | `Catalog`              | book import                            |
//! | items of one sentence book   | `BookItems(dataset)`   | book import, item save, item delete    |
//!
//! Entries also expire after the configured TTL, which bounds staleness when a write path
//! fails between its store write and its invalidation call.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::redis::RedisHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CacheKey {
    Users,
    Catalog,
    BookItems(String),
}

impl CacheKey {
    fn redis_key(&self, namespace: &str) -> String {
        match self {
            Self::Users => format!("view:{namespace}:users"),
            Self::Catalog => format!("view:{namespace}:catalog"),
            Self::BookItems(dataset_id) => format!("view:{namespace}:book:{dataset_id}"),
        }
    }
}

#[derive(Clone)]
pub(crate) struct ViewCache {
    redis: RedisHandle,
    namespace: String,
    ttl_seconds: u64,
}

impl ViewCache {
    pub(crate) fn new(redis: RedisHandle, namespace: impl Into<String>, ttl_seconds: u64) -> Self {
        Self { redis, namespace: namespace.into(), ttl_seconds }
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let redis_key = key.redis_key(&self.namespace);
        let raw = match self.redis.get_string(&redis_key).await {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(error = %err, key = %redis_key, "View cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(error = %err, key = %redis_key, "Dropping undecodable cache entry");
                self.invalidate(key).await;
                None
            }
        }
    }

    pub(crate) async fn put<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let redis_key = key.redis_key(&self.namespace);
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, key = %redis_key, "View cache encode failed");
                return;
            }
        };

        if let Err(err) = self.redis.set_string(&redis_key, &raw, self.ttl_seconds).await {
            tracing::warn!(error = %err, key = %redis_key, "View cache write failed");
        }
    }

    pub(crate) async fn invalidate(&self, key: &CacheKey) {
        let redis_key = key.redis_key(&self.namespace);
        if let Err(err) = self.redis.delete(&redis_key).await {
            tracing::warn!(error = %err, key = %redis_key, "View cache invalidation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_per_app() {
        assert_eq!(CacheKey::Users.redis_key("app"), "view:app:users");
        assert_eq!(CacheKey::Catalog.redis_key("app"), "view:app:catalog");
        assert_eq!(
            CacheKey::BookItems("junior_100".to_string()).redis_key("other"),
            "view:other:book:junior_100"
        );
    }

    #[tokio::test]
    async fn disconnected_cache_always_misses() {
        let cache = ViewCache::new(RedisHandle::new("redis://127.0.0.1:1/0".to_string()), "app", 60);
        cache.put(&CacheKey::Users, &vec!["Esme".to_string()]).await;
        let cached: Option<Vec<String>> = cache.get(&CacheKey::Users).await;
        assert!(cached.is_none());
        cache.invalidate(&CacheKey::Users).await;
    }
}
