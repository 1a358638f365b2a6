//! Key/value cache abstraction used by the cache subscriber.
//!
//! Two layers:
//!
//! - [`CacheEngine`]: the narrow capability a concrete store must offer
//!   (`contains`/`fetch`/`save`/`delete`). In-memory, file and Redis engines
//!   are provided.
//! - [`CacheAdapter`]: the uniform `has`/`get`/`set`/`remove` contract the
//!   pipeline talks to. [`EngineCacheAdapter`] bridges any engine to it.
//!
//! # Failure semantics
//!
//! Cache failures are never fatal. `set`/`remove` return the engine's
//! boolean result unchanged; a failed `set` simply means "not cached" and is
//! observable only through a later `has` returning `false`.
//!
//! # Example
//!
//! ```
//! use courier_core::cache::{CacheAdapter, EngineCacheAdapter, InMemoryCacheEngine};
//! use std::time::Duration;
//!
//! let cache = EngineCacheAdapter::new(InMemoryCacheEngine::new());
//! assert!(cache.set("id", "data", Duration::from_secs(123)));
//! assert_eq!(cache.get("id").as_deref(), Some("data"));
//! assert!(cache.remove("id"));
//! assert!(!cache.has("id"));
//! ```

mod file;
mod memory;
#[cfg(feature = "redis")]
mod redis_engine;

pub use file::FileCacheEngine;
pub use memory::InMemoryCacheEngine;
#[cfg(feature = "redis")]
pub use redis_engine::RedisCacheEngine;

use std::sync::Arc;
use std::time::Duration;

/// Capability required from a concrete cache store.
///
/// A zero `lifetime` means the entry never expires. Implementations must not
/// report expired entries from `contains`.
pub trait CacheEngine: Send + Sync {
    /// Whether a live entry exists for `id`.
    fn contains(&self, id: &str) -> bool;

    /// Read the entry for `id`.
    fn fetch(&self, id: &str) -> Option<String>;

    /// Store `data` under `id`. Returns whether the store succeeded.
    fn save(&self, id: &str, data: &str, lifetime: Duration) -> bool;

    /// Delete the entry for `id`. Returns whether the delete succeeded.
    fn delete(&self, id: &str) -> bool;
}

impl<E: CacheEngine + ?Sized> CacheEngine for Arc<E> {
    fn contains(&self, id: &str) -> bool {
        (**self).contains(id)
    }

    fn fetch(&self, id: &str) -> Option<String> {
        (**self).fetch(id)
    }

    fn save(&self, id: &str, data: &str, lifetime: Duration) -> bool {
        (**self).save(id, data, lifetime)
    }

    fn delete(&self, id: &str) -> bool {
        (**self).delete(id)
    }
}

/// Uniform cache contract used by the pipeline.
pub trait CacheAdapter: Send + Sync {
    /// Whether `key` is cached.
    fn has(&self, key: &str) -> bool;

    /// The cached value, or `None` when `key` is absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Cache `value` under `key` for `ttl`. Returns the engine's result.
    fn set(&self, key: &str, value: &str, ttl: Duration) -> bool;

    /// Remove `key`. Returns the engine's result.
    fn remove(&self, key: &str) -> bool;
}

/// [`CacheAdapter`] over any [`CacheEngine`].
#[derive(Debug, Clone, Default)]
pub struct EngineCacheAdapter<E> {
    engine: E,
}

impl<E: CacheEngine> EngineCacheAdapter<E> {
    /// Wrap an engine.
    #[must_use]
    pub const fn new(engine: E) -> Self {
        Self { engine }
    }

    /// The wrapped engine.
    #[must_use]
    pub const fn engine(&self) -> &E {
        &self.engine
    }
}

impl<E: CacheEngine> CacheAdapter for EngineCacheAdapter<E> {
    fn has(&self, key: &str) -> bool {
        self.engine.contains(key)
    }

    fn get(&self, key: &str) -> Option<String> {
        // Engines may not distinguish a missing key from an empty value,
        // so existence is checked before fetching.
        if !self.engine.contains(key) {
            return None;
        }
        self.engine.fetch(key)
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> bool {
        let saved = self.engine.save(key, value, ttl);
        if !saved {
            tracing::warn!(key, "Cache engine rejected save");
        }
        saved
    }

    fn remove(&self, key: &str) -> bool {
        let removed = self.engine.delete(key);
        if !removed {
            tracing::warn!(key, "Cache engine rejected delete");
        }
        removed
    }
}
