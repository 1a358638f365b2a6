//! Schedules retries for failed requests.

use crate::retry::RetryPolicy;
use courier_core::event::{EventKind, PipelineEvent};
use courier_core::message::{Request, RETRY_COUNT_PARAMETER};
use courier_core::subscriber::{Subscriber, Subscription};
use courier_core::{Result, TransportError};
use std::time::Duration;

/// Priority of every retry subscription. Lowest of the stock subscribers so
/// loggers and metrics see the error before it is consumed.
pub const RETRY_PRIORITY: i32 = -150;

/// Retries failed requests according to a [`RetryPolicy`].
///
/// A retried request keeps its identity and carries an incremented
/// `"retry_count"` parameter; the error it replaces is removed from the
/// event.
#[derive(Debug, Clone, Default)]
pub struct RetrySubscriber {
    policy: RetryPolicy,
}

impl RetrySubscriber {
    /// Retry with `policy`.
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The policy in use.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The request to resend and its delay, or `None` when retries are
    /// exhausted.
    fn plan(&self, error: &TransportError) -> Option<(Request, Duration)> {
        let request = error.request();
        let attempt = request.retry_count();

        if !self.policy.should_retry(attempt) {
            if attempt > 0 {
                tracing::error!(
                    request_id = %request.id(),
                    url = request.url(),
                    attempt,
                    error = %error,
                    "Request failed after max retries"
                );
            }
            return None;
        }

        let delay = self.policy.delay_for_attempt(attempt);
        tracing::info!(
            request_id = %request.id(),
            url = request.url(),
            attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            error = %error,
            "Request failed, retrying"
        );

        let retried = request
            .clone()
            .with_parameter(RETRY_COUNT_PARAMETER, i64::from(attempt + 1));
        Some((retried, delay))
    }
}

impl Subscriber for RetrySubscriber {
    fn name(&self) -> &'static str {
        "retry"
    }

    fn subscribed_events(&self) -> Vec<Subscription> {
        vec![
            Subscription::new(EventKind::RequestErrored, RETRY_PRIORITY),
            Subscription::new(EventKind::MultiRequestErrored, RETRY_PRIORITY),
        ]
    }

    fn on_request_errored(&self, event: &mut PipelineEvent) -> Result<()> {
        if event.has_response() {
            return Ok(());
        }
        let Some((request, delay)) = event.error().and_then(|error| self.plan(error)) else {
            return Ok(());
        };
        event.take_error();
        event.schedule_retry(request, delay);
        Ok(())
    }

    fn on_multi_request_errored(&self, event: &mut PipelineEvent) -> Result<()> {
        let mut remaining = Vec::new();
        for error in event.take_errors() {
            match self.plan(&error) {
                Some((request, delay)) => event.schedule_retry(request, delay),
                None => remaining.push(error),
            }
        }
        event.set_errors(remaining);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use courier_core::message::{HttpMethod, Response};

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(max_retries)
            .initial_delay(Duration::from_millis(10))
            .build()
    }

    fn errored(request: Request) -> PipelineEvent {
        PipelineEvent::request_errored(TransportError::new(request, "connection reset"))
    }

    #[test]
    fn schedules_retry_with_incremented_count() {
        let request = Request::new(HttpMethod::Get, "https://example.com");
        let mut event = errored(request.clone());

        RetrySubscriber::new(policy(2)).handle(&mut event).unwrap();

        assert!(!event.has_error());
        let retries = event.take_retries();
        assert_eq!(retries.len(), 1);
        assert_eq!(retries[0].request.id(), request.id());
        assert_eq!(retries[0].request.retry_count(), 1);
        assert_eq!(retries[0].delay, Duration::from_millis(10));
    }

    #[test]
    fn exhausted_retries_keep_the_error() {
        let request = Request::new(HttpMethod::Get, "https://example.com")
            .with_parameter(RETRY_COUNT_PARAMETER, 2_i64);
        let mut event = errored(request);

        RetrySubscriber::new(policy(2)).handle(&mut event).unwrap();

        assert!(event.has_error());
        assert!(event.retries().is_empty());
    }

    #[test]
    fn recovered_request_is_not_retried() {
        let request = Request::new(HttpMethod::Get, "https://example.com");
        let mut event = errored(request);
        event.set_response(Response::new(200, "fallback"));

        RetrySubscriber::new(policy(2)).handle(&mut event).unwrap();

        assert!(event.retries().is_empty());
    }

    #[test]
    fn multi_retries_only_eligible_errors() {
        let fresh = Request::new(HttpMethod::Get, "https://example.com/a");
        let spent = Request::new(HttpMethod::Get, "https://example.com/b")
            .with_parameter(RETRY_COUNT_PARAMETER, 1_i64);
        let mut event = PipelineEvent::multi_request_errored(vec![
            TransportError::new(fresh.clone(), "reset"),
            TransportError::new(spent.clone(), "reset"),
        ]);

        RetrySubscriber::new(policy(1)).handle(&mut event).unwrap();

        assert_eq!(event.retries().len(), 1);
        assert_eq!(event.retries()[0].request.id(), fresh.id());
        assert_eq!(event.errors().len(), 1);
        assert_eq!(event.errors()[0].request().id(), spent.id());
    }
}
