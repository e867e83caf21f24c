use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{cmd, AsyncCommands, Client, RedisError};
use tokio::sync::RwLock;

/// Optional Redis connection. Every call degrades to a permissive no-op while disconnected,
/// so the service keeps working (uncached, unthrottled) without Redis.
#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone)]
pub(crate) enum RedisHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let client = Client::open(self.url.clone())?;
        let manager = ConnectionManager::new(client).await?;
        let mut guard = self.manager.write().await;
        *guard = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        let mut guard = self.manager.write().await;
        *guard = None;
    }

    async fn manager(&self) -> Option<ConnectionManager> {
        self.manager.read().await.clone()
    }

    pub(crate) async fn health(&self) -> RedisHealth {
        let Some(mut manager) = self.manager().await else {
            return RedisHealth::Disconnected;
        };

        match cmd("PING").query_async::<_, String>(&mut manager).await {
            Ok(_) => RedisHealth::Healthy,
            Err(err) => RedisHealth::Unhealthy(err.to_string()),
        }
    }

    pub(crate) async fn rate_limit(
        &self,
        key: &str,
        limit: u64,
        window_seconds: u64,
    ) -> Result<bool, RedisError> {
        let Some(mut manager) = self.manager().await else {
            return Ok(true);
        };

        let script = redis::Script::new(
            r#"
            local current = redis.call("INCR", KEYS[1])
            if current == 1 then
                redis.call("EXPIRE", KEYS[1], ARGV[1])
            end
            return current
        "#,
        );

        let current: i64 =
            script.key(key).arg(window_seconds as i64).invoke_async(&mut manager).await?;

        Ok(current <= limit as i64)
    }

    pub(crate) async fn get_string(&self, key: &str) -> Result<Option<String>, RedisError> {
        let Some(mut manager) = self.manager().await else {
            return Ok(None);
        };
        manager.get(key).await
    }

    pub(crate) async fn set_string(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), RedisError> {
        let Some(mut manager) = self.manager().await else {
            return Ok(());
        };
        manager.set_ex(key, value, ttl_seconds).await
    }

    pub(crate) async fn delete(&self, key: &str) -> Result<(), RedisError> {
        let Some(mut manager) = self.manager().await else {
            return Ok(());
        };
        manager.del(key).await
    }

    pub(crate) async fn exists(&self, key: &str) -> Result<bool, RedisError> {
        let Some(mut manager) = self.manager().await else {
            return Ok(false);
        };
        manager.exists(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::{RedisHandle, RedisHealth};

    fn disconnected() -> RedisHandle {
        RedisHandle::new("redis://127.0.0.1:1/0".to_string())
    }

    #[tokio::test]
    async fn disconnected_handle_is_permissive() {
        let redis = disconnected();

        assert!(matches!(redis.health().await, RedisHealth::Disconnected));
        assert!(redis.rate_limit("rl:test", 0, 60).await.expect("rate limit"));
        assert_eq!(redis.get_string("missing").await.expect("get"), None);
        assert!(!redis.exists("missing").await.expect("exists"));
        redis.set_string("key", "value", 10).await.expect("set");
        redis.delete("key").await.expect("delete");
    }
}
