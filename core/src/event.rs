//! Lifecycle events fired around transport calls.
//!
//! A [`PipelineEvent`] is a single mutable envelope handed to every
//! subscriber of its [`EventKind`] in priority order. Subscribers may replace
//! the request(s), response(s) or error(s) it carries; later subscribers see
//! the replacement. Once dispatch finishes, the pipeline reads the final
//! payload back out of the event.
//!
//! # Kinds and payloads
//!
//! | Kind                    | Payload on creation                |
//! |-------------------------|------------------------------------|
//! | `REQUEST_CREATED`       | `request`                          |
//! | `REQUEST_SENT`          | `request`, `response`              |
//! | `REQUEST_ERRORED`       | `request`, `error`                 |
//! | `MULTI_REQUEST_CREATED` | `requests`                         |
//! | `MULTI_REQUEST_SENT`    | `responses`                        |
//! | `MULTI_REQUEST_ERRORED` | `errors`                           |
//!
//! Any subscriber may additionally set a `response` on a created event
//! (short-circuit), an `error` on a sent event (reject), or schedule a
//! [`ScheduledRetry`] on an errored event.

use crate::error::{PipelineError, Result, TransportError};
use crate::message::{Request, RequestId, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lifecycle phase an event is addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A single request is about to be sent.
    RequestCreated,
    /// A single request produced a response.
    RequestSent,
    /// A single request failed.
    RequestErrored,
    /// A batch of requests is about to be sent.
    MultiRequestCreated,
    /// Some requests of a batch produced responses.
    MultiRequestSent,
    /// Some requests of a batch failed.
    MultiRequestErrored,
}

impl EventKind {
    /// All kinds, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::RequestCreated,
        Self::RequestSent,
        Self::RequestErrored,
        Self::MultiRequestCreated,
        Self::MultiRequestSent,
        Self::MultiRequestErrored,
    ];

    /// Stable event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RequestCreated => "REQUEST_CREATED",
            Self::RequestSent => "REQUEST_SENT",
            Self::RequestErrored => "REQUEST_ERRORED",
            Self::MultiRequestCreated => "MULTI_REQUEST_CREATED",
            Self::MultiRequestSent => "MULTI_REQUEST_SENT",
            Self::MultiRequestErrored => "MULTI_REQUEST_ERRORED",
        }
    }

    /// Whether the kind belongs to batch execution.
    #[must_use]
    pub const fn is_multi(self) -> bool {
        matches!(
            self,
            Self::MultiRequestCreated | Self::MultiRequestSent | Self::MultiRequestErrored
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A retry requested by a subscriber while handling an errored event.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledRetry {
    /// The request to send again (same identity as the failed one)
    pub request: Request,
    /// How long to wait before resending
    pub delay: Duration,
}

/// Mutable payload container passed through the subscribers of one kind.
#[derive(Clone, Debug)]
pub struct PipelineEvent {
    kind: EventKind,
    request: Option<Request>,
    response: Option<Response>,
    error: Option<TransportError>,
    requests: Vec<Request>,
    responses: Vec<Response>,
    errors: Vec<TransportError>,
    retries: Vec<ScheduledRetry>,
}

impl PipelineEvent {
    fn empty(kind: EventKind) -> Self {
        Self {
            kind,
            request: None,
            response: None,
            error: None,
            requests: Vec::new(),
            responses: Vec::new(),
            errors: Vec::new(),
            retries: Vec::new(),
        }
    }

    /// `REQUEST_CREATED` for `request`.
    #[must_use]
    pub fn request_created(request: Request) -> Self {
        let mut event = Self::empty(EventKind::RequestCreated);
        event.request = Some(request);
        event
    }

    /// `REQUEST_SENT` for `request` and the `response` it produced.
    #[must_use]
    pub fn request_sent(request: Request, response: Response) -> Self {
        let mut event = Self::empty(EventKind::RequestSent);
        event.request = Some(request);
        event.response = Some(response);
        event
    }

    /// `REQUEST_ERRORED` for a failed request.
    #[must_use]
    pub fn request_errored(error: TransportError) -> Self {
        let mut event = Self::empty(EventKind::RequestErrored);
        event.request = Some(error.request().clone());
        event.error = Some(error);
        event
    }

    /// `MULTI_REQUEST_CREATED` for a batch.
    #[must_use]
    pub fn multi_request_created(requests: Vec<Request>) -> Self {
        let mut event = Self::empty(EventKind::MultiRequestCreated);
        event.requests = requests;
        event
    }

    /// `MULTI_REQUEST_SENT` for the responses of a batch.
    #[must_use]
    pub fn multi_request_sent(responses: Vec<Response>) -> Self {
        let mut event = Self::empty(EventKind::MultiRequestSent);
        event.responses = responses;
        event
    }

    /// `MULTI_REQUEST_ERRORED` for the failures of a batch.
    #[must_use]
    pub fn multi_request_errored(errors: Vec<TransportError>) -> Self {
        let mut event = Self::empty(EventKind::MultiRequestErrored);
        event.errors = errors;
        event
    }

    /// Lifecycle phase of the event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    // Single request payload

    /// The request, if the event carries one.
    #[must_use]
    pub const fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    /// The request, or a precondition error if the event carries none.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingPayload`] when no request is present.
    pub fn require_request(&self) -> Result<&Request> {
        self.request.as_ref().ok_or(PipelineError::MissingPayload {
            kind: self.kind,
            field: "request",
        })
    }

    /// Replace the request.
    pub fn set_request(&mut self, request: Request) {
        self.request = Some(request);
    }

    /// Take the request out of the event.
    pub fn take_request(&mut self) -> Option<Request> {
        self.request.take()
    }

    /// The response, if the event carries one.
    #[must_use]
    pub const fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Whether a response is present.
    #[must_use]
    pub const fn has_response(&self) -> bool {
        self.response.is_some()
    }

    /// Replace (or inject) the response.
    pub fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    /// Take the response out of the event.
    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }

    /// The error, if the event carries one.
    #[must_use]
    pub const fn error(&self) -> Option<&TransportError> {
        self.error.as_ref()
    }

    /// Whether an error is present.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Replace (or raise) the error.
    pub fn set_error(&mut self, error: TransportError) {
        self.error = Some(error);
    }

    /// Take the error out of the event.
    pub fn take_error(&mut self) -> Option<TransportError> {
        self.error.take()
    }

    // Batch payload

    /// Requests of the batch.
    #[must_use]
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Replace the requests of the batch.
    pub fn set_requests(&mut self, requests: Vec<Request>) {
        self.requests = requests;
    }

    /// Take the requests out of the event.
    pub fn take_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.requests)
    }

    /// Remove one request from the batch by identity.
    pub fn remove_request(&mut self, id: RequestId) -> Option<Request> {
        let index = self.requests.iter().position(|request| request.id() == id)?;
        Some(self.requests.remove(index))
    }

    /// Responses of the batch.
    #[must_use]
    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    /// Replace the responses of the batch.
    pub fn set_responses(&mut self, responses: Vec<Response>) {
        self.responses = responses;
    }

    /// Append a response to the batch.
    pub fn add_response(&mut self, response: Response) {
        self.responses.push(response);
    }

    /// Take the responses out of the event.
    pub fn take_responses(&mut self) -> Vec<Response> {
        std::mem::take(&mut self.responses)
    }

    /// Errors of the batch.
    #[must_use]
    pub fn errors(&self) -> &[TransportError] {
        &self.errors
    }

    /// Replace the errors of the batch.
    pub fn set_errors(&mut self, errors: Vec<TransportError>) {
        self.errors = errors;
    }

    /// Append an error to the batch.
    pub fn add_error(&mut self, error: TransportError) {
        self.errors.push(error);
    }

    /// Take the errors out of the event.
    pub fn take_errors(&mut self) -> Vec<TransportError> {
        std::mem::take(&mut self.errors)
    }

    // Retries

    /// Ask the pipeline to send `request` again after `delay`.
    pub fn schedule_retry(&mut self, request: Request, delay: Duration) {
        self.retries.push(ScheduledRetry { request, delay });
    }

    /// Retries scheduled so far.
    #[must_use]
    pub fn retries(&self) -> &[ScheduledRetry] {
        &self.retries
    }

    /// Take the scheduled retries out of the event.
    pub fn take_retries(&mut self) -> Vec<ScheduledRetry> {
        std::mem::take(&mut self.retries)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::message::HttpMethod;

    #[test]
    fn kind_names() {
        assert_eq!(EventKind::RequestCreated.to_string(), "REQUEST_CREATED");
        assert_eq!(EventKind::MultiRequestErrored.as_str(), "MULTI_REQUEST_ERRORED");
        assert!(EventKind::MultiRequestSent.is_multi());
        assert!(!EventKind::RequestSent.is_multi());
    }

    #[test]
    fn errored_event_carries_request() {
        let request = Request::new(HttpMethod::Get, "https://example.com");
        let event = PipelineEvent::request_errored(TransportError::new(request.clone(), "boom"));

        assert_eq!(event.kind(), EventKind::RequestErrored);
        assert_eq!(event.request(), Some(&request));
        assert!(event.has_error());
    }

    #[test]
    fn missing_request_is_precondition() {
        let event = PipelineEvent::multi_request_sent(Vec::new());
        let error = event.require_request().unwrap_err();
        assert!(error.is_precondition());
        assert_eq!(error.to_string(), "MULTI_REQUEST_SENT event carries no request");
    }

    #[test]
    fn remove_request_by_identity() {
        let first = Request::new(HttpMethod::Get, "https://example.com/1");
        let second = Request::new(HttpMethod::Get, "https://example.com/2");
        let mut event = PipelineEvent::multi_request_created(vec![first.clone(), second.clone()]);

        assert_eq!(event.remove_request(second.id()), Some(second));
        assert_eq!(event.requests(), &[first]);
        assert_eq!(event.remove_request(RequestId::new()), None);
    }

    #[test]
    fn retries_are_drained() {
        let request = Request::new(HttpMethod::Get, "https://example.com");
        let mut event = PipelineEvent::request_errored(TransportError::new(request.clone(), "boom"));
        event.schedule_retry(request, Duration::from_millis(5));

        assert_eq!(event.retries().len(), 1);
        assert_eq!(event.take_retries().len(), 1);
        assert!(event.retries().is_empty());
    }
}
