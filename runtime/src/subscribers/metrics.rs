//! Feeds request outcomes into the `metrics` facade.

use crate::metrics::RequestMetrics;
use courier_core::event::{EventKind, PipelineEvent};
use courier_core::message::{Request, Response};
use courier_core::subscriber::{Subscriber, Subscription};
use courier_core::{Result, TransportError};

/// Priority of every metrics subscription. After history has stopped the
/// timers, before retries consume errors.
pub const METRICS_PRIORITY: i32 = -50;

/// Counts responses, errors, cache hits and retries; records durations.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSubscriber;

impl MetricsSubscriber {
    /// Create the subscriber.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn observe_response(response: &Response) {
        let request = response.request();
        let method = request.map_or("UNKNOWN", |r| r.method().as_str());
        RequestMetrics::record_response(
            method,
            response.status(),
            request.and_then(Request::elapsed),
        );
        if response.is_cache_hit() {
            RequestMetrics::record_cache_hit();
        }
    }

    fn observe_error(error: &TransportError) {
        RequestMetrics::record_error(error.request().method().as_str());
    }

    fn observe_created(request: &Request) {
        if request.retry_count() > 0 {
            RequestMetrics::record_retry();
        }
    }
}

impl Subscriber for MetricsSubscriber {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn subscribed_events(&self) -> Vec<Subscription> {
        EventKind::ALL
            .iter()
            .map(|kind| Subscription::new(*kind, METRICS_PRIORITY))
            .collect()
    }

    fn on_request_created(&self, event: &mut PipelineEvent) -> Result<()> {
        if let Some(request) = event.request() {
            Self::observe_created(request);
        }
        Ok(())
    }

    fn on_request_sent(&self, event: &mut PipelineEvent) -> Result<()> {
        if let Some(response) = event.response() {
            Self::observe_response(response);
        }
        Ok(())
    }

    fn on_request_errored(&self, event: &mut PipelineEvent) -> Result<()> {
        if let Some(error) = event.error() {
            Self::observe_error(error);
        }
        Ok(())
    }

    fn on_multi_request_created(&self, event: &mut PipelineEvent) -> Result<()> {
        event.requests().iter().for_each(Self::observe_created);
        Ok(())
    }

    fn on_multi_request_sent(&self, event: &mut PipelineEvent) -> Result<()> {
        event.responses().iter().for_each(Self::observe_response);
        Ok(())
    }

    fn on_multi_request_errored(&self, event: &mut PipelineEvent) -> Result<()> {
        event.errors().iter().for_each(Self::observe_error);
        Ok(())
    }
}
