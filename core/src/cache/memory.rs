use super::CacheEngine;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct Entry {
    data: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// Process-local cache engine with per-entry expiry.
///
/// Expired entries are invisible immediately and are purged on the next save.
#[derive(Debug, Default)]
pub struct InMemoryCacheEngine {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryCacheEngine {
    /// Create an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_entry(&self, id: &str) -> Option<Entry> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries
            .get(id)
            .filter(|entry| !entry.is_expired(Instant::now()))
            .cloned()
    }
}

impl CacheEngine for InMemoryCacheEngine {
    fn contains(&self, id: &str) -> bool {
        self.live_entry(id).is_some()
    }

    fn fetch(&self, id: &str) -> Option<String> {
        self.live_entry(id).map(|entry| entry.data)
    }

    fn save(&self, id: &str, data: &str, lifetime: Duration) -> bool {
        let now = Instant::now();
        let expires_at = if lifetime.is_zero() {
            None
        } else {
            now.checked_add(lifetime)
        };

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.retain(|_, entry| !entry.is_expired(now));
        entries.insert(
            id.to_string(),
            Entry {
                data: data.to_string(),
                expires_at,
            },
        );
        true
    }

    fn delete(&self, id: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(id);
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn save_fetch_delete() {
        let engine = InMemoryCacheEngine::new();
        assert!(!engine.contains("id"));

        assert!(engine.save("id", "data", Duration::from_secs(60)));
        assert!(engine.contains("id"));
        assert_eq!(engine.fetch("id").as_deref(), Some("data"));

        assert!(engine.delete("id"));
        assert!(!engine.contains("id"));
        assert!(engine.delete("id"));
    }

    #[test]
    fn entries_expire() {
        let engine = InMemoryCacheEngine::new();
        engine.save("id", "data", Duration::from_millis(20));
        assert!(engine.contains("id"));

        sleep(Duration::from_millis(40));

        assert!(!engine.contains("id"));
        assert!(engine.fetch("id").is_none());
    }

    #[test]
    fn zero_lifetime_never_expires() {
        let engine = InMemoryCacheEngine::new();
        engine.save("id", "", Duration::ZERO);

        sleep(Duration::from_millis(5));

        assert!(engine.contains("id"));
        assert_eq!(engine.fetch("id").as_deref(), Some(""));
    }

    #[test]
    fn save_purges_expired_entries() {
        let engine = InMemoryCacheEngine::new();
        engine.save("old", "data", Duration::from_millis(10));
        sleep(Duration::from_millis(20));

        engine.save("new", "data", Duration::ZERO);
        assert_eq!(engine.len(), 1);
    }
}
