use super::CacheEngine;
use redis::Commands;
use std::sync::Mutex;
use std::time::Duration;

/// Cache engine backed by a Redis server, shared across processes.
///
/// Commands run over one synchronous connection. Command failures are logged
/// and reported as "absent" or `false`.
pub struct RedisCacheEngine {
    connection: Mutex<redis::Connection>,
    prefix: String,
}

impl RedisCacheEngine {
    /// Connect to `url` (e.g. `redis://127.0.0.1/`), namespacing keys with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns the Redis error if the URL is invalid or the connection fails.
    pub fn open(url: &str, prefix: impl Into<String>) -> redis::RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let connection = client.get_connection()?;
        Ok(Self {
            connection: Mutex::new(connection),
            prefix: prefix.into(),
        })
    }

    fn key(&self, id: &str) -> String {
        format!("{}{id}", self.prefix)
    }

    fn with_connection<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut redis::Connection) -> redis::RedisResult<T>,
    ) -> Option<T> {
        let mut connection = self
            .connection
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match f(&mut connection) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(operation, error = %e, "Redis cache command failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for RedisCacheEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheEngine")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl CacheEngine for RedisCacheEngine {
    fn contains(&self, id: &str) -> bool {
        let key = self.key(id);
        self.with_connection("exists", |conn| conn.exists::<_, bool>(key))
            .unwrap_or(false)
    }

    fn fetch(&self, id: &str) -> Option<String> {
        let key = self.key(id);
        self.with_connection("get", |conn| conn.get::<_, Option<String>>(key))
            .flatten()
    }

    fn save(&self, id: &str, data: &str, lifetime: Duration) -> bool {
        let key = self.key(id);
        self.with_connection("set", |conn| {
            if lifetime.is_zero() {
                conn.set::<_, _, ()>(key, data)
            } else {
                conn.set_ex::<_, _, ()>(key, data, lifetime.as_secs().max(1))
            }
        })
        .is_some()
    }

    fn delete(&self, id: &str) -> bool {
        let key = self.key(id);
        self.with_connection("del", |conn| conn.del::<_, ()>(key))
            .is_some()
    }
}
