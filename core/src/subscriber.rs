//! The subscriber contract.
//!
//! A subscriber declares the event kinds it handles, each with a numeric
//! priority (higher runs first), and receives every matching
//! [`PipelineEvent`] by mutable reference. Handlers run synchronously; the
//! dispatcher calls the next subscriber only after the current one returns.
//!
//! Returning `Err` from a handler aborts the remaining dispatch for that
//! event and surfaces the error to the caller of the pipeline.
//!
//! # Example
//!
//! ```
//! use courier_core::event::{EventKind, PipelineEvent};
//! use courier_core::subscriber::{Subscriber, Subscription};
//! use courier_core::Result;
//!
//! struct UserAgent;
//!
//! impl Subscriber for UserAgent {
//!     fn name(&self) -> &'static str {
//!         "user_agent"
//!     }
//!
//!     fn subscribed_events(&self) -> Vec<Subscription> {
//!         vec![Subscription::new(EventKind::RequestCreated, 50)]
//!     }
//!
//!     fn on_request_created(&self, event: &mut PipelineEvent) -> Result<()> {
//!         if let Some(request) = event.take_request() {
//!             event.set_request(request.with_header("User-Agent", "courier"));
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use crate::error::Result;
use crate::event::{EventKind, PipelineEvent};
use crate::message::RequestId;

/// One entry of a subscriber's registration table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Subscription {
    /// The event kind handled
    pub kind: EventKind,
    /// Higher priorities run first
    pub priority: i32,
}

impl Subscription {
    /// Create a subscription.
    #[must_use]
    pub const fn new(kind: EventKind, priority: i32) -> Self {
        Self { kind, priority }
    }
}

/// Cross-cutting logic attached to lifecycle events.
///
/// Implementors override the `on_*` hooks for the kinds listed in
/// [`Subscriber::subscribed_events`]; the provided [`Subscriber::handle`]
/// routes an event to the matching hook.
pub trait Subscriber: Send + Sync {
    /// Name used in logs and by `EventDispatcher::listeners`.
    fn name(&self) -> &'static str;

    /// Event kinds this subscriber handles, with their priorities.
    fn subscribed_events(&self) -> Vec<Subscription>;

    /// Handle `REQUEST_CREATED`.
    ///
    /// # Errors
    ///
    /// An error aborts dispatch and is returned to the caller.
    fn on_request_created(&self, _event: &mut PipelineEvent) -> Result<()> {
        Ok(())
    }

    /// Handle `REQUEST_SENT`.
    ///
    /// # Errors
    ///
    /// An error aborts dispatch and is returned to the caller.
    fn on_request_sent(&self, _event: &mut PipelineEvent) -> Result<()> {
        Ok(())
    }

    /// Handle `REQUEST_ERRORED`.
    ///
    /// # Errors
    ///
    /// An error aborts dispatch and is returned to the caller.
    fn on_request_errored(&self, _event: &mut PipelineEvent) -> Result<()> {
        Ok(())
    }

    /// Handle `MULTI_REQUEST_CREATED`.
    ///
    /// # Errors
    ///
    /// An error aborts dispatch and is returned to the caller.
    fn on_multi_request_created(&self, _event: &mut PipelineEvent) -> Result<()> {
        Ok(())
    }

    /// Handle `MULTI_REQUEST_SENT`.
    ///
    /// # Errors
    ///
    /// An error aborts dispatch and is returned to the caller.
    fn on_multi_request_sent(&self, _event: &mut PipelineEvent) -> Result<()> {
        Ok(())
    }

    /// Handle `MULTI_REQUEST_ERRORED`.
    ///
    /// # Errors
    ///
    /// An error aborts dispatch and is returned to the caller.
    fn on_multi_request_errored(&self, _event: &mut PipelineEvent) -> Result<()> {
        Ok(())
    }

    /// Release whatever was kept for `ids`.
    ///
    /// Called after a send aborted with a dispatch or precondition error, so
    /// the listed requests will see no further `*_SENT` or `*_ERRORED` event.
    /// Ids the subscriber never saw, or already finished, must be ignored.
    fn on_abandoned(&self, _ids: &[RequestId]) {}

    /// Route an event to the hook matching its kind.
    ///
    /// # Errors
    ///
    /// Propagates the hook's error.
    fn handle(&self, event: &mut PipelineEvent) -> Result<()> {
        match event.kind() {
            EventKind::RequestCreated => self.on_request_created(event),
            EventKind::RequestSent => self.on_request_sent(event),
            EventKind::RequestErrored => self.on_request_errored(event),
            EventKind::MultiRequestCreated => self.on_multi_request_created(event),
            EventKind::MultiRequestSent => self.on_multi_request_sent(event),
            EventKind::MultiRequestErrored => self.on_multi_request_errored(event),
        }
    }
}
