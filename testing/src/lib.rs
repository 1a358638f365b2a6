//! # Courier Testing
//!
//! Testing utilities and mocks for the Courier HTTP interception pipeline.
//!
//! This crate provides:
//! - [`MockHttpAdapter`]: scripted transport with per-URL outcomes and delays
//! - [`MockCacheEngine`]: cache engine that counts every call it receives
//! - [`RecordingTimer`]: timer that logs every start/stop/discard
//! - [`RecordingSubscriber`]: subscriber that logs the events it observes
//! - [`init_test_tracing`]: tracing output for test runs
//!
//! ## Example
//!
//! ```ignore
//! use courier_testing::MockHttpAdapter;
//! use courier_runtime::EventDrivenAdapter;
//!
//! #[tokio::test]
//! async fn test_cached_get() {
//!     let transport = Arc::new(MockHttpAdapter::new());
//!     transport.respond("https://example.com/todos", 200, "[]");
//!
//!     let pipeline = EventDrivenAdapter::builder(transport.clone()).build();
//!     let response = pipeline.send_request(request).await?;
//!     assert_eq!(transport.send_count(), 1);
//! }
//! ```

pub mod mocks;

pub use mocks::{
    MockCacheEngine, MockHttpAdapter, RecordingSubscriber, RecordingTimer, SaveCall, TimerCall,
};

/// Install a `tracing` subscriber writing to the test harness output.
///
/// Honors `RUST_LOG`; defaults to `debug` for courier crates. Safe to call
/// from every test, only the first call installs the subscriber.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("courier_core=debug,courier_runtime=debug")
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
