//! # Courier Core
//!
//! Core types for the Courier HTTP interception pipeline.
//!
//! Courier lets independent concerns (response caching, history journaling
//! with timing, retries, logging) observe and rewrite HTTP traffic flowing
//! through a client without the client knowing about any of them. This crate
//! holds the vocabulary those concerns share; the dispatcher, the pipeline
//! and the stock subscribers live in `courier-runtime`.
//!
//! ## Core Concepts
//!
//! - **Request / Response**: identity-bearing messages with a mutable
//!   parameter bag ([`message`])
//! - **PipelineEvent**: the mutable envelope fired at each lifecycle phase
//!   ([`event`])
//! - **Subscriber**: cross-cutting logic attached to lifecycle events by
//!   priority ([`subscriber`])
//! - **HttpAdapter**: the transport the pipeline wraps ([`adapter`])
//! - **Cache / Timer / Journal**: collaborators used by the stock
//!   subscribers ([`cache`], [`timer`], [`journal`])
//!
//! ## Lifecycle
//!
//! ```text
//!  send_request(R)
//!        │
//!        ▼
//!  REQUEST_CREATED ──(cache hit)──┐
//!        │                        │
//!        ▼                        │
//!    transport                    │
//!     │      │                    │
//!     ▼      ▼                    ▼
//!  ERRORED  SENT ◄────────────────┘
//!     │      │
//!  (retry)   ▼
//!     │   response
//!     └──► REQUEST_CREATED
//! ```

pub mod adapter;
pub mod cache;
pub mod error;
pub mod event;
pub mod journal;
pub mod message;
pub mod subscriber;
pub mod timer;

pub use adapter::HttpAdapter;
pub use error::{MultiRequestError, PipelineError, Result, TransportError};
pub use event::{EventKind, PipelineEvent, ScheduledRetry};
pub use journal::{BoundedJournal, Journal, JournalEntry};
pub use message::{HttpMethod, Parameter, Parameters, Request, RequestId, Response};
pub use subscriber::{Subscriber, Subscription};
pub use timer::{StopwatchTimer, Timer};
