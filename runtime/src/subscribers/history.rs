//! Timing and journaling of completed exchanges.
//!
//! Per request the subscriber walks `CREATED → STARTED → STOPPED`:
//!
//! - on `*_CREATED` every request is started on the [`Timer`] and replaced in
//!   the event by its started version, which is also kept in a pending index
//!   keyed by [`RequestId`];
//! - on `*_SENT` every response is paired with its started request through
//!   the response's `"request"` back-reference, the timer is stopped, the
//!   `(stopped request, response)` pair is journaled and the response is
//!   rewritten to point at the stopped request;
//! - on `*_ERRORED` the timer and pending entry of each failed request are
//!   discarded so a retry can start it again. The same happens when a send
//!   is abandoned after another subscriber aborted dispatch.
//!
//! Batch pairing never relies on list position: responses may be reordered
//! by other subscribers and are still matched by identity.

use courier_core::event::{EventKind, PipelineEvent};
use courier_core::journal::{BoundedJournal, Journal};
use courier_core::message::{Request, RequestId, Response};
use courier_core::subscriber::{Subscriber, Subscription};
use courier_core::timer::{StopwatchTimer, Timer};
use courier_core::{PipelineError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Priority of every history subscription.
pub const HISTORY_PRIORITY: i32 = 100;

/// Records timed `(request, response)` pairs into a [`Journal`].
pub struct HistorySubscriber {
    timer: Arc<dyn Timer>,
    journal: Arc<dyn Journal>,
    pending: Mutex<HashMap<RequestId, Request>>,
}

impl HistorySubscriber {
    /// Create a subscriber over the given collaborators.
    #[must_use]
    pub fn new(timer: Arc<dyn Timer>, journal: Arc<dyn Journal>) -> Self {
        Self {
            timer,
            journal,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Create a subscriber with a stopwatch timer and a journal of `limit`
    /// entries.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self::new(
            Arc::new(StopwatchTimer::new()),
            Arc::new(BoundedJournal::new(limit)),
        )
    }

    /// The journal entries are recorded into.
    #[must_use]
    pub fn journal(&self) -> Arc<dyn Journal> {
        Arc::clone(&self.journal)
    }

    /// The timer measuring requests.
    #[must_use]
    pub fn timer(&self) -> Arc<dyn Timer> {
        Arc::clone(&self.timer)
    }

    /// Number of started requests not yet sent or errored.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn start(&self, request: Request) -> Result<Request> {
        let started = self.timer.start(request)?;
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(started.id(), started.clone());
        tracing::debug!(request_id = %started.id(), url = started.url(), "Request started");
        Ok(started)
    }

    /// Stop `request`, journal it with `response` and return the response
    /// pointing at the stopped request.
    fn complete(&self, request: Request, response: Response) -> Result<(Request, Response)> {
        let stopped = self.timer.stop(request)?;
        let response = response.with_request(stopped.clone());
        self.journal.record(stopped.clone(), response.clone());
        tracing::debug!(
            request_id = %stopped.id(),
            elapsed_ms = stopped.elapsed().map(|d| d.as_millis()),
            "Exchange journaled"
        );
        Ok((stopped, response))
    }

    fn forget(&self, id: RequestId) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if self.timer.discard(id) {
            tracing::debug!(request_id = %id, "Abandoned timer discarded");
        }
    }
}

impl Default for HistorySubscriber {
    fn default() -> Self {
        Self::with_limit(courier_core::journal::DEFAULT_JOURNAL_LIMIT)
    }
}

impl fmt::Debug for HistorySubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistorySubscriber")
            .field("journal_len", &self.journal.len())
            .field("journal_limit", &self.journal.limit())
            .field("pending", &self.pending())
            .finish()
    }
}

impl Subscriber for HistorySubscriber {
    fn name(&self) -> &'static str {
        "history"
    }

    fn subscribed_events(&self) -> Vec<Subscription> {
        EventKind::ALL
            .iter()
            .map(|kind| Subscription::new(*kind, HISTORY_PRIORITY))
            .collect()
    }

    fn on_request_created(&self, event: &mut PipelineEvent) -> Result<()> {
        let request = event
            .take_request()
            .ok_or(PipelineError::MissingPayload {
                kind: EventKind::RequestCreated,
                field: "request",
            })?;
        let started = self.start(request)?;
        event.set_request(started);
        Ok(())
    }

    fn on_request_sent(&self, event: &mut PipelineEvent) -> Result<()> {
        let response = event.take_response().ok_or(PipelineError::MissingPayload {
            kind: EventKind::RequestSent,
            field: "response",
        })?;
        let started = response
            .request()
            .cloned()
            .ok_or(PipelineError::MissingBackReference)?;

        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&started.id());

        let (stopped, response) = self.complete(started, response)?;
        event.set_request(stopped);
        event.set_response(response);
        Ok(())
    }

    fn on_request_errored(&self, event: &mut PipelineEvent) -> Result<()> {
        if let Some(request) = event.request() {
            self.forget(request.id());
        }
        Ok(())
    }

    fn on_multi_request_created(&self, event: &mut PipelineEvent) -> Result<()> {
        let started = event
            .take_requests()
            .into_iter()
            .map(|request| self.start(request))
            .collect::<Result<Vec<_>>>()?;
        event.set_requests(started);
        Ok(())
    }

    fn on_multi_request_sent(&self, event: &mut PipelineEvent) -> Result<()> {
        let responses = event.take_responses();
        let mut completed = Vec::with_capacity(responses.len());

        for response in responses {
            let id = response
                .request()
                .map(Request::id)
                .ok_or(PipelineError::MissingBackReference)?;
            let started = self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id)
                .ok_or(PipelineError::UnknownRequest(id))?;

            let (_, response) = self.complete(started, response)?;
            completed.push(response);
        }

        event.set_responses(completed);
        Ok(())
    }

    fn on_multi_request_errored(&self, event: &mut PipelineEvent) -> Result<()> {
        for error in event.errors() {
            self.forget(error.request().id());
        }
        Ok(())
    }

    fn on_abandoned(&self, ids: &[RequestId]) {
        for id in ids {
            self.forget(*id);
        }
    }
}
