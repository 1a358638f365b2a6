//! Contract tests for [`EngineCacheAdapter`] against a call-recording engine.

#![allow(clippy::unwrap_used)]

use courier_core::cache::{CacheAdapter, EngineCacheAdapter};
use courier_testing::{MockCacheEngine, SaveCall};
use std::time::Duration;

#[test]
fn has_delegates_to_contains() {
    let engine = MockCacheEngine::new().with_entry("id", "data");
    let cache = EngineCacheAdapter::new(engine.clone());

    assert!(cache.has("id"));
    assert!(!cache.has("other"));
    assert_eq!(engine.contains_calls(), vec!["id", "other"]);
}

#[test]
fn get_returns_cached_value() {
    let engine = MockCacheEngine::new().with_entry("id", "data");
    let cache = EngineCacheAdapter::new(engine.clone());

    assert_eq!(cache.get("id").as_deref(), Some("data"));
    assert_eq!(engine.contains_calls(), vec!["id"]);
    assert_eq!(engine.fetch_calls(), vec!["id"]);
}

#[test]
fn get_never_fetches_absent_key() {
    let engine = MockCacheEngine::new();
    let cache = EngineCacheAdapter::new(engine.clone());

    assert!(cache.get("id").is_none());
    assert_eq!(engine.contains_calls(), vec!["id"]);
    assert!(engine.fetch_calls().is_empty());
}

#[test]
fn set_saves_with_lifetime() {
    let engine = MockCacheEngine::new();
    let cache = EngineCacheAdapter::new(engine.clone());

    assert!(cache.set("id", "data", Duration::from_secs(123)));
    assert_eq!(
        engine.save_calls(),
        vec![SaveCall {
            id: "id".to_string(),
            data: "data".to_string(),
            lifetime: Duration::from_secs(123),
        }]
    );
    assert!(cache.has("id"));
}

#[test]
fn set_reports_engine_failure() {
    let engine = MockCacheEngine::new().rejecting_saves();
    let cache = EngineCacheAdapter::new(engine.clone());

    assert!(!cache.set("id", "data", Duration::from_secs(123)));
    assert_eq!(engine.save_calls().len(), 1);
    assert!(!cache.has("id"));
}

#[test]
fn remove_deletes_key() {
    let engine = MockCacheEngine::new().with_entry("id", "data");
    let cache = EngineCacheAdapter::new(engine.clone());

    assert!(cache.remove("id"));
    assert_eq!(engine.delete_calls(), vec!["id"]);
    assert!(engine.is_empty());
}

#[test]
fn remove_reports_engine_failure() {
    let engine = MockCacheEngine::new()
        .with_entry("id", "data")
        .rejecting_deletes();
    let cache = EngineCacheAdapter::new(engine.clone());

    assert!(!cache.remove("id"));
    assert!(cache.has("id"));
}
