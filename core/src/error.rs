//! Error types shared by the pipeline.
//!
//! Two families of failure travel through the pipeline and must not be
//! confused:
//!
//! - **Transport outcomes** ([`TransportError`]): the request could not be
//!   completed. These are routed through the `*_ERRORED` events so
//!   subscribers can observe, retry or recover them.
//! - **Precondition violations** (timer stopped without a start, response
//!   without a back-reference, ...): the pipeline is wired incorrectly. These
//!   abort dispatch immediately and surface to the caller.

use crate::event::EventKind;
use crate::message::{Request, RequestId, Response};
use thiserror::Error;

/// A request that could not be completed by the transport, or whose
/// response was rejected by a subscriber.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{} {} failed: {message}", .request.method(), .request.url())]
pub struct TransportError {
    request: Box<Request>,
    response: Option<Box<Response>>,
    message: String,
}

impl TransportError {
    /// Create an error for a request that produced no response.
    #[must_use]
    pub fn new(request: Request, message: impl Into<String>) -> Self {
        Self {
            request: Box::new(request),
            response: None,
            message: message.into(),
        }
    }

    /// Attach the response that caused the error.
    #[must_use]
    pub fn with_response(mut self, response: Response) -> Self {
        self.response = Some(Box::new(response));
        self
    }

    /// The failing request.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Replace the failing request (keeps the message and response).
    #[must_use]
    pub fn with_request(mut self, request: Request) -> Self {
        self.request = Box::new(request);
        self
    }

    /// The response that caused the error, if any.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        self.response.as_deref()
    }

    /// Human readable reason.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Partial outcome of a batch in which at least one request failed.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiRequestError {
    /// Responses of the requests that succeeded, in batch order
    pub responses: Vec<Response>,
    /// Errors of the requests that failed
    pub errors: Vec<TransportError>,
}

impl MultiRequestError {
    /// Number of requests in the batch.
    #[must_use]
    pub fn total(&self) -> usize {
        self.responses.len() + self.errors.len()
    }
}

/// Errors surfaced by the pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// A timer was stopped for a request it never started.
    #[error("Timer was never started for request {0}")]
    TimerNotStarted(RequestId),

    /// A timer was started twice for the same request.
    #[error("Timer already started for request {0}")]
    TimerAlreadyStarted(RequestId),

    /// A response reached a subscriber without a back-reference to its request.
    #[error("Response carries no back-reference to its request")]
    MissingBackReference,

    /// A response referenced a request the subscriber never saw created.
    #[error("No pending request with id {0}")]
    UnknownRequest(RequestId),

    /// An event was dispatched without the payload its kind requires.
    #[error("{kind} event carries no {field}")]
    MissingPayload {
        /// Kind of the event
        kind: EventKind,
        /// Name of the missing field
        field: &'static str,
    },

    /// The transport returned a different number of results than requests sent.
    #[error("Transport returned {received} results for {sent} requests")]
    TransportMismatch {
        /// Requests handed to the transport
        sent: usize,
        /// Results returned by the transport
        received: usize,
    },

    /// A single request failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Some requests of a batch failed.
    #[error("{} of {} requests failed", .0.errors.len(), .0.total())]
    Multi(MultiRequestError),

    /// A third-party subscriber failed.
    #[error("Subscriber '{subscriber}' failed: {reason}")]
    Subscriber {
        /// Name of the subscriber
        subscriber: String,
        /// Reason given by the subscriber
        reason: String,
    },
}

impl PipelineError {
    /// Whether the error signals a wiring defect rather than a failed request.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::TimerNotStarted(_)
                | Self::TimerAlreadyStarted(_)
                | Self::MissingBackReference
                | Self::UnknownRequest(_)
                | Self::MissingPayload { .. }
                | Self::TransportMismatch { .. }
        )
    }
}

/// Result alias used throughout the pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;
