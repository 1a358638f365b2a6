//! The event-driven adapter that wraps a transport.
//!
//! [`EventDrivenAdapter`] fires the lifecycle events around every transport
//! call and applies whatever the subscribers leave in the event: a replaced
//! request, an injected response, an error or a scheduled retry.
//!
//! # Example
//!
//! ```no_run
//! use courier_core::message::{HttpMethod, Request};
//! use courier_core::HttpAdapter;
//! use courier_runtime::subscribers::{HistorySubscriber, LoggerSubscriber};
//! use courier_runtime::EventDrivenAdapter;
//! use std::sync::Arc;
//!
//! # async fn example(transport: Arc<dyn HttpAdapter>) -> courier_core::Result<()> {
//! let pipeline = EventDrivenAdapter::builder(transport)
//!     .history(HistorySubscriber::default())
//!     .subscriber(LoggerSubscriber::new())
//!     .build();
//!
//! let response = pipeline
//!     .send_request(Request::new(HttpMethod::Get, "https://example.com/todos"))
//!     .await?;
//! assert_eq!(pipeline.journal().map(|j| j.len()), Some(1));
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

use crate::config::{ConfigError, PipelineConfig};
use crate::dispatcher::{EventDispatcher, EventDispatcherBuilder};
use crate::subscribers::{
    CacheSubscriber, HistorySubscriber, LoggerSubscriber, MetricsSubscriber, RetrySubscriber,
    StatusCodeSubscriber,
};
use courier_core::cache::{CacheAdapter, EngineCacheAdapter, InMemoryCacheEngine};
use courier_core::event::{EventKind, PipelineEvent, ScheduledRetry};
use courier_core::journal::Journal;
use courier_core::message::{Request, RequestId, Response};
use courier_core::subscriber::Subscriber;
use courier_core::{HttpAdapter, MultiRequestError, PipelineError, Result, TransportError};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A transport wrapped in the subscriber pipeline.
pub struct EventDrivenAdapter {
    transport: Arc<dyn HttpAdapter>,
    dispatcher: EventDispatcher,
    journal: Option<Arc<dyn Journal>>,
}

/// Outcome of one round of a batch.
struct BatchRound {
    responses: Vec<Response>,
    errors: Vec<TransportError>,
    retries: Vec<ScheduledRetry>,
}

impl EventDrivenAdapter {
    /// Wrap `transport` with an already built dispatcher.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpAdapter>, dispatcher: EventDispatcher) -> Self {
        Self {
            transport,
            dispatcher,
            journal: None,
        }
    }

    /// Start building a pipeline around `transport`.
    #[must_use]
    pub fn builder(transport: Arc<dyn HttpAdapter>) -> EventDrivenAdapterBuilder {
        EventDrivenAdapterBuilder {
            transport,
            dispatcher: EventDispatcher::builder(),
            journal: None,
        }
    }

    /// Build a pipeline with the subscribers enabled in `config`.
    ///
    /// When caching is enabled and no `cache` is given, an in-memory engine
    /// is used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `config` is invalid.
    pub fn from_config(
        transport: Arc<dyn HttpAdapter>,
        config: &PipelineConfig,
        cache: Option<Arc<dyn CacheAdapter>>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let mut builder = Self::builder(transport);
        if config.history.enabled {
            builder = builder.history(HistorySubscriber::with_limit(config.history.journal_limit));
        }
        if config.logging.enabled {
            builder = builder.subscriber(LoggerSubscriber::new());
        }
        if config.metrics.enabled {
            builder = builder.subscriber(MetricsSubscriber::new());
        }
        if config.cache.enabled {
            let cache: Arc<dyn CacheAdapter> = match cache {
                Some(cache) => cache,
                None => Arc::new(EngineCacheAdapter::new(InMemoryCacheEngine::new())),
            };
            builder = builder.subscriber(
                CacheSubscriber::new(cache, config.cache.lifetime())
                    .force_cache(config.cache.force_cache)
                    .vary_headers(config.cache.vary_headers.iter().cloned()),
            );
        }
        if config.retry.enabled {
            builder = builder.subscriber(RetrySubscriber::new(config.retry.policy()));
        }
        if config.status_code.enabled {
            builder = builder.subscriber(StatusCodeSubscriber::new());
        }

        let adapter = builder.build();
        tracing::debug!(?adapter, "Pipeline built from configuration");
        Ok(adapter)
    }

    /// The dispatcher firing lifecycle events.
    #[must_use]
    pub const fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// The journal of the registered history subscriber, if any.
    #[must_use]
    pub fn journal(&self) -> Option<Arc<dyn Journal>> {
        self.journal.clone()
    }

    /// Send one request through the pipeline.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Transport`] when the request failed and no
    ///   subscriber retried or recovered it
    /// - any error a subscriber returned during dispatch
    pub async fn send_request(&self, mut request: Request) -> Result<Response> {
        loop {
            let failure = match self.attempt(request).await? {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            let id = failure.request().id();
            let fallback = failure.clone();
            let mut errored = PipelineEvent::request_errored(failure);
            if let Err(error) = self.dispatcher.dispatch(&mut errored) {
                self.dispatcher.abandon(&[id]);
                return Err(error);
            }

            if let Some(retry) = errored.take_retries().into_iter().next() {
                if !retry.delay.is_zero() {
                    tokio::time::sleep(retry.delay).await;
                }
                request = retry.request;
                continue;
            }
            if let Some(recovered) = errored.take_response() {
                return Ok(recovered);
            }
            return Err(errored.take_error().unwrap_or(fallback).into());
        }
    }

    /// One pass through `REQUEST_CREATED`, the transport and `REQUEST_SENT`.
    ///
    /// The outer `Result` carries dispatch errors, the inner one the
    /// transport outcome. On a dispatch error the request is abandoned so
    /// subscribers drop what they started for it.
    async fn attempt(
        &self,
        request: Request,
    ) -> Result<std::result::Result<Response, TransportError>> {
        let id = request.id();
        let outcome = self.exchange(request).await;
        if outcome.is_err() {
            self.dispatcher.abandon(&[id]);
        }
        outcome
    }

    async fn exchange(
        &self,
        request: Request,
    ) -> Result<std::result::Result<Response, TransportError>> {
        let mut created = PipelineEvent::request_created(request);
        self.dispatcher.dispatch(&mut created)?;

        if let Some(error) = created.take_error() {
            return Ok(Err(error));
        }
        let request = created.require_request()?.clone();

        let response = match created.take_response() {
            Some(injected) => injected,
            None => match self.transport.send(request.clone()).await {
                Ok(response) => response,
                Err(error) => return Ok(Err(error)),
            },
        };

        let response = response.with_request(request.clone());
        let mut sent = PipelineEvent::request_sent(request, response);
        self.dispatcher.dispatch(&mut sent)?;

        if let Some(error) = sent.take_error() {
            return Ok(Err(error));
        }
        let response = sent.take_response().ok_or(PipelineError::MissingPayload {
            kind: EventKind::RequestSent,
            field: "response",
        })?;
        Ok(Ok(response))
    }

    /// Send a batch through the pipeline.
    ///
    /// Responses are returned in the order of the requests they answer,
    /// whatever order the transport or the subscribers produced them in.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Multi`] when at least one request failed; it holds
    ///   every response and every remaining error
    /// - [`PipelineError::TransportMismatch`] when the transport returned a
    ///   different number of results than requests
    /// - any error a subscriber returned during dispatch
    pub async fn send_requests(&self, requests: Vec<Request>) -> Result<Vec<Response>> {
        let positions: HashMap<RequestId, usize> = requests
            .iter()
            .enumerate()
            .map(|(index, request)| (request.id(), index))
            .collect();

        let mut responses = Vec::with_capacity(requests.len());
        let mut errors = Vec::new();
        let mut batch = requests;

        while !batch.is_empty() {
            let round = self.run_batch(batch, &positions).await?;
            responses.extend(round.responses);
            errors.extend(round.errors);

            let delay = round
                .retries
                .iter()
                .map(|retry| retry.delay)
                .max()
                .unwrap_or(Duration::ZERO);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            batch = round.retries.into_iter().map(|retry| retry.request).collect();
        }

        sort_responses(&mut responses, &positions);
        sort_errors(&mut errors, &positions);

        if errors.is_empty() {
            Ok(responses)
        } else {
            Err(PipelineError::Multi(MultiRequestError { responses, errors }))
        }
    }

    /// One round of a batch. On error every request of the round is
    /// abandoned.
    async fn run_batch(
        &self,
        batch: Vec<Request>,
        positions: &HashMap<RequestId, usize>,
    ) -> Result<BatchRound> {
        let ids: Vec<RequestId> = batch.iter().map(Request::id).collect();
        let round = self.run_round(batch, positions).await;
        if round.is_err() {
            self.dispatcher.abandon(&ids);
        }
        round
    }

    async fn run_round(
        &self,
        batch: Vec<Request>,
        positions: &HashMap<RequestId, usize>,
    ) -> Result<BatchRound> {
        let mut created = PipelineEvent::multi_request_created(batch);
        self.dispatcher.dispatch(&mut created)?;

        let to_send = created.take_requests();
        let mut responses = created.take_responses();
        let mut errors = created.take_errors();

        if !to_send.is_empty() {
            let results = self.transport.send_all(to_send.clone()).await;
            if results.len() != to_send.len() {
                return Err(PipelineError::TransportMismatch {
                    sent: to_send.len(),
                    received: results.len(),
                });
            }
            for (request, result) in to_send.into_iter().zip(results) {
                match result {
                    Ok(response) => responses.push(response.with_request(request)),
                    Err(error) => errors.push(error),
                }
            }
        }

        if !responses.is_empty() {
            sort_responses(&mut responses, positions);
            let mut sent = PipelineEvent::multi_request_sent(responses);
            self.dispatcher.dispatch(&mut sent)?;
            responses = sent.take_responses();
            errors.extend(sent.take_errors());
        }

        let mut retries = Vec::new();
        if !errors.is_empty() {
            sort_errors(&mut errors, positions);
            let fallback = errors.clone();
            let mut errored = PipelineEvent::multi_request_errored(errors);
            self.dispatcher.dispatch(&mut errored)?;
            errors = errored.take_errors();
            responses.extend(errored.take_responses());
            retries = errored.take_retries();
            restore_unresolved(&mut errors, fallback, &responses, &retries);
        }

        Ok(BatchRound {
            responses,
            errors,
            retries,
        })
    }
}

/// Put back the original error of every failed request that a subscriber
/// removed without scheduling a retry or adding a response for it.
fn restore_unresolved(
    errors: &mut Vec<TransportError>,
    original: Vec<TransportError>,
    responses: &[Response],
    retries: &[ScheduledRetry],
) {
    let resolved: HashSet<RequestId> = errors
        .iter()
        .map(|error| error.request().id())
        .chain(responses.iter().filter_map(|r| r.request().map(Request::id)))
        .chain(retries.iter().map(|retry| retry.request.id()))
        .collect();

    for error in original {
        let id = error.request().id();
        if !resolved.contains(&id) {
            tracing::debug!(request_id = %id, "Restoring error removed without retry or recovery");
            errors.push(error);
        }
    }
}

fn position(positions: &HashMap<RequestId, usize>, request: Option<&Request>) -> usize {
    request
        .and_then(|request| positions.get(&request.id()).copied())
        .unwrap_or(usize::MAX)
}

fn sort_responses(responses: &mut [Response], positions: &HashMap<RequestId, usize>) {
    responses.sort_by_key(|response| position(positions, response.request()));
}

fn sort_errors(errors: &mut [TransportError], positions: &HashMap<RequestId, usize>) {
    errors.sort_by_key(|error| position(positions, Some(error.request())));
}

impl fmt::Debug for EventDrivenAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDrivenAdapter")
            .field("transport", &self.transport.name())
            .field("dispatcher", &self.dispatcher)
            .field("history", &self.journal.is_some())
            .finish()
    }
}

/// Builder for [`EventDrivenAdapter`].
pub struct EventDrivenAdapterBuilder {
    transport: Arc<dyn HttpAdapter>,
    dispatcher: EventDispatcherBuilder,
    journal: Option<Arc<dyn Journal>>,
}

impl EventDrivenAdapterBuilder {
    /// Register a subscriber.
    #[must_use]
    pub fn subscriber<S: Subscriber + 'static>(mut self, subscriber: S) -> Self {
        self.dispatcher = self.dispatcher.subscriber(subscriber);
        self
    }

    /// Register a subscriber the caller keeps a handle to.
    #[must_use]
    pub fn shared(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.dispatcher = self.dispatcher.shared(subscriber);
        self
    }

    /// Register a history subscriber and expose its journal through
    /// [`EventDrivenAdapter::journal`].
    #[must_use]
    pub fn history(mut self, history: HistorySubscriber) -> Self {
        self.journal = Some(history.journal());
        self.subscriber(history)
    }

    /// Build the pipeline.
    #[must_use]
    pub fn build(self) -> EventDrivenAdapter {
        EventDrivenAdapter {
            transport: self.transport,
            dispatcher: self.dispatcher.build(),
            journal: self.journal,
        }
    }
}
