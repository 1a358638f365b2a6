//! Structured logging of completed and failed exchanges.

use courier_core::event::{EventKind, PipelineEvent};
use courier_core::message::{Request, Response};
use courier_core::subscriber::{Subscriber, Subscription};
use courier_core::{Result, TransportError};

/// Priority of every logger subscription.
pub const LOGGER_PRIORITY: i32 = 0;

/// Emits one `tracing` event per response or error.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerSubscriber;

impl LoggerSubscriber {
    /// Create the subscriber.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn log_response(response: &Response) {
        let request = response.request();
        tracing::info!(
            method = request.map(|r| r.method().as_str()),
            url = request.map(Request::url),
            status = response.status(),
            elapsed_ms = request.and_then(Request::elapsed).map(|d| d.as_millis()),
            cache_hit = response.is_cache_hit(),
            "Request sent"
        );
    }

    fn log_error(error: &TransportError) {
        let request = error.request();
        tracing::warn!(
            method = request.method().as_str(),
            url = request.url(),
            status = error.response().map(Response::status),
            retry_count = request.retry_count(),
            error = error.message(),
            "Request errored"
        );
    }
}

impl Subscriber for LoggerSubscriber {
    fn name(&self) -> &'static str {
        "logger"
    }

    fn subscribed_events(&self) -> Vec<Subscription> {
        vec![
            Subscription::new(EventKind::RequestSent, LOGGER_PRIORITY),
            Subscription::new(EventKind::RequestErrored, LOGGER_PRIORITY),
            Subscription::new(EventKind::MultiRequestSent, LOGGER_PRIORITY),
            Subscription::new(EventKind::MultiRequestErrored, LOGGER_PRIORITY),
        ]
    }

    fn on_request_sent(&self, event: &mut PipelineEvent) -> Result<()> {
        if let Some(response) = event.response() {
            Self::log_response(response);
        }
        Ok(())
    }

    fn on_request_errored(&self, event: &mut PipelineEvent) -> Result<()> {
        if let Some(error) = event.error() {
            Self::log_error(error);
        }
        Ok(())
    }

    fn on_multi_request_sent(&self, event: &mut PipelineEvent) -> Result<()> {
        event.responses().iter().for_each(Self::log_response);
        Ok(())
    }

    fn on_multi_request_errored(&self, event: &mut PipelineEvent) -> Result<()> {
        event.errors().iter().for_each(Self::log_error);
        Ok(())
    }
}
