//! The transport boundary.
//!
//! [`HttpAdapter`] is implemented by whatever actually performs network I/O
//! (a reqwest client, a socket pool, a test double). The pipeline wraps an
//! adapter; the adapter never knows about subscribers.
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the
//! pipeline can hold an `Arc<dyn HttpAdapter>`.

use crate::error::TransportError;
use crate::message::{Request, Response};
use std::future::Future;
use std::pin::Pin;

/// Future returned by [`HttpAdapter::send`].
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<Response, TransportError>> + Send + 'a>>;

/// Future returned by [`HttpAdapter::send_all`].
pub type SendAllFuture<'a> =
    Pin<Box<dyn Future<Output = Vec<Result<Response, TransportError>>> + Send + 'a>>;

/// Something that sends HTTP requests.
pub trait HttpAdapter: Send + Sync {
    /// Name of the transport, used in logs.
    fn name(&self) -> &'static str;

    /// Send one request.
    fn send(&self, request: Request) -> SendFuture<'_>;

    /// Send a batch of requests.
    ///
    /// The returned results are index-aligned with `requests`. The default
    /// implementation drives every [`HttpAdapter::send`] concurrently.
    fn send_all(&self, requests: Vec<Request>) -> SendAllFuture<'_> {
        let pending: Vec<_> = requests.into_iter().map(|request| self.send(request)).collect();
        Box::pin(futures::future::join_all(pending))
    }
}
