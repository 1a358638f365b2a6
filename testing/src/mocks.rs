//! Mock collaborators for pipeline tests.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks in tests

use courier_core::adapter::{HttpAdapter, SendFuture};
use courier_core::cache::CacheEngine;
use courier_core::event::{EventKind, PipelineEvent};
use courier_core::message::{Request, RequestId, Response};
use courier_core::subscriber::{Subscriber, Subscription};
use courier_core::timer::{StopwatchTimer, Timer};
use courier_core::{PipelineError, Result, TransportError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Cache engine
// ============================================================================

/// One recorded call to [`CacheEngine::save`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveCall {
    /// Key saved
    pub id: String,
    /// Data saved
    pub data: String,
    /// Lifetime requested
    pub lifetime: Duration,
}

#[derive(Debug, Default)]
struct CacheEngineState {
    entries: HashMap<String, String>,
    contains_calls: Vec<String>,
    fetch_calls: Vec<String>,
    save_calls: Vec<SaveCall>,
    delete_calls: Vec<String>,
    reject_saves: bool,
    reject_deletes: bool,
}

/// Cache engine that stores entries in memory and records every call.
///
/// Lifetimes are recorded but not enforced.
///
/// # Example
///
/// ```
/// use courier_testing::MockCacheEngine;
/// use courier_core::cache::{CacheAdapter, EngineCacheAdapter};
///
/// let engine = MockCacheEngine::new();
/// let cache = EngineCacheAdapter::new(engine.clone());
///
/// assert!(cache.get("id").is_none());
/// assert_eq!(engine.contains_calls(), vec!["id".to_string()]);
/// assert!(engine.fetch_calls().is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct MockCacheEngine {
    state: Arc<Mutex<CacheEngineState>>,
}

impl MockCacheEngine {
    /// Create an empty engine that accepts every write.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry without recording a save.
    #[must_use]
    pub fn with_entry(self, id: &str, data: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .entries
            .insert(id.to_string(), data.to_string());
        self
    }

    /// Make every save report failure (nothing is stored).
    #[must_use]
    pub fn rejecting_saves(self) -> Self {
        self.state.lock().unwrap().reject_saves = true;
        self
    }

    /// Make every delete report failure (nothing is removed).
    #[must_use]
    pub fn rejecting_deletes(self) -> Self {
        self.state.lock().unwrap().reject_deletes = true;
        self
    }

    /// Keys passed to `contains`, in call order.
    #[must_use]
    pub fn contains_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().contains_calls.clone()
    }

    /// Keys passed to `fetch`, in call order.
    #[must_use]
    pub fn fetch_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().fetch_calls.clone()
    }

    /// Calls to `save`, in call order.
    #[must_use]
    pub fn save_calls(&self) -> Vec<SaveCall> {
        self.state.lock().unwrap().save_calls.clone()
    }

    /// Keys passed to `delete`, in call order.
    #[must_use]
    pub fn delete_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().delete_calls.clone()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheEngine for MockCacheEngine {
    fn contains(&self, id: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        state.contains_calls.push(id.to_string());
        state.entries.contains_key(id)
    }

    fn fetch(&self, id: &str) -> Option<String> {
        let mut state = self.state.lock().unwrap();
        state.fetch_calls.push(id.to_string());
        state.entries.get(id).cloned()
    }

    fn save(&self, id: &str, data: &str, lifetime: Duration) -> bool {
        let mut state = self.state.lock().unwrap();
        state.save_calls.push(SaveCall {
            id: id.to_string(),
            data: data.to_string(),
            lifetime,
        });
        if state.reject_saves {
            return false;
        }
        state.entries.insert(id.to_string(), data.to_string());
        true
    }

    fn delete(&self, id: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        state.delete_calls.push(id.to_string());
        if state.reject_deletes {
            return false;
        }
        state.entries.remove(id);
        true
    }
}

// ============================================================================
// Transport
// ============================================================================

#[derive(Clone, Debug)]
enum Outcome {
    Respond { status: u16, body: String },
    Fail(String),
}

#[derive(Debug)]
struct Route {
    queued: VecDeque<Outcome>,
    fallback: Outcome,
    delay: Duration,
}

impl Route {
    fn new(fallback: Outcome) -> Self {
        Self {
            queued: VecDeque::new(),
            fallback,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Default)]
struct TransportState {
    routes: HashMap<String, Route>,
    sent: Vec<Request>,
}

/// Scripted transport.
///
/// Each URL has a fallback outcome plus an optional queue of one-shot
/// outcomes consumed first. Unknown URLs fail with "no route". Per-URL delays
/// let tests make batch members complete out of order.
#[derive(Clone, Debug, Default)]
pub struct MockHttpAdapter {
    state: Arc<Mutex<TransportState>>,
}

impl MockHttpAdapter {
    /// Create a transport with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `url` with `status` and `body`.
    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.set_fallback(
            url,
            Outcome::Respond {
                status,
                body: body.to_string(),
            },
        );
    }

    /// Always fail `url` with `message`.
    pub fn fail(&self, url: &str, message: &str) {
        self.set_fallback(url, Outcome::Fail(message.to_string()));
    }

    /// Fail the next `times` calls to `url` before using its fallback.
    pub fn fail_times(&self, url: &str, times: usize, message: &str) {
        let mut state = self.state.lock().unwrap();
        let route = state
            .routes
            .entry(url.to_string())
            .or_insert_with(|| Route::new(Outcome::Fail("no route".to_string())));
        for _ in 0..times {
            route.queued.push_back(Outcome::Fail(message.to_string()));
        }
    }

    /// Delay every answer for `url`.
    pub fn delay(&self, url: &str, delay: Duration) {
        let mut state = self.state.lock().unwrap();
        state
            .routes
            .entry(url.to_string())
            .or_insert_with(|| Route::new(Outcome::Fail("no route".to_string())))
            .delay = delay;
    }

    /// Requests received, in arrival order.
    #[must_use]
    pub fn sent(&self) -> Vec<Request> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Number of requests received.
    #[must_use]
    pub fn send_count(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }

    /// Number of requests received for `url`.
    #[must_use]
    pub fn send_count_for(&self, url: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|request| request.url() == url)
            .count()
    }

    fn set_fallback(&self, url: &str, outcome: Outcome) {
        let mut state = self.state.lock().unwrap();
        state
            .routes
            .entry(url.to_string())
            .and_modify(|route| route.fallback = outcome.clone())
            .or_insert_with(|| Route::new(outcome));
    }

    fn next_outcome(&self, request: &Request) -> (Outcome, Duration) {
        let mut state = self.state.lock().unwrap();
        state.sent.push(request.clone());
        match state.routes.get_mut(request.url()) {
            Some(route) => {
                let outcome = route
                    .queued
                    .pop_front()
                    .unwrap_or_else(|| route.fallback.clone());
                (outcome, route.delay)
            }
            None => (Outcome::Fail("no route".to_string()), Duration::ZERO),
        }
    }
}

impl HttpAdapter for MockHttpAdapter {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn send(&self, request: Request) -> SendFuture<'_> {
        let (outcome, delay) = self.next_outcome(&request);
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match outcome {
                Outcome::Respond { status, body } => Ok(Response::new(status, body)),
                Outcome::Fail(message) => Err(TransportError::new(request, message)),
            }
        })
    }
}

// ============================================================================
// Timer
// ============================================================================

/// One recorded timer call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerCall {
    /// `start` for a request
    Start(RequestId),
    /// `stop` for a request
    Stop(RequestId),
    /// `discard` for a request
    Discard(RequestId),
}

/// [`StopwatchTimer`] that records every call it receives.
#[derive(Debug, Default)]
pub struct RecordingTimer {
    inner: StopwatchTimer,
    calls: Mutex<Vec<TimerCall>>,
}

impl RecordingTimer {
    /// Create a timer with no running measurements.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<TimerCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of running measurements.
    #[must_use]
    pub fn running(&self) -> usize {
        self.inner.running()
    }
}

impl Timer for RecordingTimer {
    fn start(&self, request: Request) -> Result<Request> {
        self.calls.lock().unwrap().push(TimerCall::Start(request.id()));
        self.inner.start(request)
    }

    fn stop(&self, request: Request) -> Result<Request> {
        self.calls.lock().unwrap().push(TimerCall::Stop(request.id()));
        self.inner.stop(request)
    }

    fn discard(&self, id: RequestId) -> bool {
        self.calls.lock().unwrap().push(TimerCall::Discard(id));
        self.inner.discard(id)
    }

    fn is_running(&self, id: RequestId) -> bool {
        self.inner.is_running(id)
    }
}

// ============================================================================
// Subscriber
// ============================================================================

/// Subscriber that appends `"<name>:<KIND>"` to a shared log for every event
/// it handles, optionally failing on one kind.
///
/// Several recording subscribers can share one log to assert firing order.
#[derive(Clone, Debug)]
pub struct RecordingSubscriber {
    name: &'static str,
    subscriptions: Vec<Subscription>,
    log: Arc<Mutex<Vec<String>>>,
    fail_on: Option<EventKind>,
}

impl RecordingSubscriber {
    /// Create a subscriber handling `kinds` at `priority`.
    #[must_use]
    pub fn new(name: &'static str, kinds: &[EventKind], priority: i32) -> Self {
        Self {
            name,
            subscriptions: kinds
                .iter()
                .map(|kind| Subscription::new(*kind, priority))
                .collect(),
            log: Arc::new(Mutex::new(Vec::new())),
            fail_on: None,
        }
    }

    /// Write into `log` instead of a private log.
    #[must_use]
    pub fn with_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.log = log;
        self
    }

    /// Return a subscriber error when handling `kind`.
    #[must_use]
    pub const fn failing_on(mut self, kind: EventKind) -> Self {
        self.fail_on = Some(kind);
        self
    }

    /// Entries logged so far.
    #[must_use]
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl Subscriber for RecordingSubscriber {
    fn name(&self) -> &'static str {
        self.name
    }

    fn subscribed_events(&self) -> Vec<Subscription> {
        self.subscriptions.clone()
    }

    fn handle(&self, event: &mut PipelineEvent) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, event.kind()));

        if self.fail_on == Some(event.kind()) {
            return Err(PipelineError::Subscriber {
                subscriber: self.name.to_string(),
                reason: format!("refused {}", event.kind()),
            });
        }
        Ok(())
    }
}
