//! # Courier Runtime
//!
//! Dispatcher, pipeline and stock subscribers for the Courier HTTP
//! interception pipeline.
//!
//! ## Core Components
//!
//! - **EventDispatcher**: ordered `(kind, priority, subscriber)` table built
//!   once and iterated on every event
//! - **EventDrivenAdapter**: wraps an [`HttpAdapter`] and fires the lifecycle
//!   events around single and batched requests
//! - **Subscribers**: history (timing + journal), cache, retry, status code,
//!   logging and metrics
//! - **PipelineConfig**: TOML/environment configuration wiring the stock
//!   subscribers
//!
//! ## Example
//!
//! ```ignore
//! use courier_runtime::{EventDrivenAdapter, PipelineConfig};
//!
//! let config = PipelineConfig::from_env()?;
//! let pipeline = EventDrivenAdapter::from_config(transport, &config, None)?;
//!
//! let responses = pipeline.send_requests(vec![first, second]).await?;
//! for entry in pipeline.journal().map(|j| j.entries()).unwrap_or_default() {
//!     println!("{} took {:?}", entry.request().url(), entry.elapsed());
//! }
//! ```
//!
//! [`HttpAdapter`]: courier_core::HttpAdapter

/// Pipeline configuration
pub mod config;

/// Ordered subscription table
pub mod dispatcher;

/// Prometheus metrics for observability
pub mod metrics;

/// The event-driven adapter
pub mod pipeline;

/// Backoff policy for retries
pub mod retry;

/// Stock subscribers
pub mod subscribers;

pub use config::{ConfigError, PipelineConfig};
pub use dispatcher::EventDispatcher;
pub use pipeline::EventDrivenAdapter;
pub use retry::{Backoff, RetryPolicy};
