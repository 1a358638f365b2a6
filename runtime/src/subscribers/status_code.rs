//! Turns HTTP error statuses into transport errors.

use courier_core::event::{EventKind, PipelineEvent};
use courier_core::message::Response;
use courier_core::subscriber::{Subscriber, Subscription};
use courier_core::{Result, TransportError};

/// Priority of every status code subscription. Runs after the cache and
/// history subscribers have seen the response.
pub const STATUS_CODE_PRIORITY: i32 = -200;

/// Rejects responses with a status of 400 or above.
///
/// The rejected response is moved into a [`TransportError`], which sends the
/// request down the `*_ERRORED` path where it can be retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusCodeSubscriber;

impl StatusCodeSubscriber {
    /// Create the subscriber.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn reject(response: Response) -> std::result::Result<Response, TransportError> {
        if response.status() < 400 {
            return Ok(response);
        }
        match response.request().cloned() {
            Some(request) => {
                let message = format!("HTTP status {}", response.status());
                Err(TransportError::new(request, message).with_response(response))
            }
            None => Ok(response),
        }
    }
}

impl Subscriber for StatusCodeSubscriber {
    fn name(&self) -> &'static str {
        "status_code"
    }

    fn subscribed_events(&self) -> Vec<Subscription> {
        vec![
            Subscription::new(EventKind::RequestSent, STATUS_CODE_PRIORITY),
            Subscription::new(EventKind::MultiRequestSent, STATUS_CODE_PRIORITY),
        ]
    }

    fn on_request_sent(&self, event: &mut PipelineEvent) -> Result<()> {
        let Some(response) = event.take_response() else {
            return Ok(());
        };
        match Self::reject(response) {
            Ok(response) => event.set_response(response),
            Err(error) => {
                tracing::debug!(status = error.response().map(Response::status), "Response rejected");
                event.set_error(error);
            }
        }
        Ok(())
    }

    fn on_multi_request_sent(&self, event: &mut PipelineEvent) -> Result<()> {
        let mut accepted = Vec::with_capacity(event.responses().len());
        for response in event.take_responses() {
            match Self::reject(response) {
                Ok(response) => accepted.push(response),
                Err(error) => event.add_error(error),
            }
        }
        event.set_responses(accepted);
        Ok(())
    }
}
