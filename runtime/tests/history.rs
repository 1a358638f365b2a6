//! Pairing scenarios for the history subscriber.
//!
//! Requests are started on `*_CREATED` and must be matched with their
//! responses by identity on `*_SENT`, whatever order the responses arrive in.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use courier_core::event::PipelineEvent;
use courier_core::journal::{BoundedJournal, Journal};
use courier_core::message::{HttpMethod, Request, Response, TIMER_PARAMETER};
use courier_core::subscriber::Subscriber;
use courier_core::timer::Timer;
use courier_runtime::subscribers::HistorySubscriber;
use courier_testing::{RecordingTimer, TimerCall};
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Test Fixtures
// ============================================================================

fn fixture(limit: usize) -> (HistorySubscriber, Arc<RecordingTimer>, Arc<BoundedJournal>) {
    let timer = Arc::new(RecordingTimer::new());
    let journal = Arc::new(BoundedJournal::new(limit));
    let history = HistorySubscriber::new(timer.clone(), journal.clone());
    (history, timer, journal)
}

fn batch(size: usize) -> Vec<Request> {
    (0..size)
        .map(|i| Request::new(HttpMethod::Get, format!("https://example.com/{i}")))
        .collect()
}

/// Run `MULTI_REQUEST_CREATED` and return the started requests.
fn start_batch(history: &HistorySubscriber, requests: Vec<Request>) -> Vec<Request> {
    let mut created = PipelineEvent::multi_request_created(requests);
    history.handle(&mut created).unwrap();
    created.take_requests()
}

/// A response echoing the URL of the request it answers.
fn answer(request: &Request) -> Response {
    Response::new(200, request.url()).with_request(request.clone())
}

// ============================================================================
// Single requests
// ============================================================================

#[test]
fn single_request_records_stopped_request() {
    let (history, timer, journal) = fixture(10);
    let request = Request::new(HttpMethod::Get, "https://example.com");
    let id = request.id();

    let mut created = PipelineEvent::request_created(request);
    history.handle(&mut created).unwrap();
    let started = created.take_request().unwrap();
    assert!(timer.is_running(id));

    let mut sent = PipelineEvent::request_sent(started.clone(), answer(&started));
    history.handle(&mut sent).unwrap();

    let entries = journal.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].request().id(), id);
    assert!(entries[0].elapsed().is_some());
    assert_eq!(sent.request(), Some(entries[0].request()));
    assert_eq!(timer.calls(), vec![TimerCall::Start(id), TimerCall::Stop(id)]);
    assert!(!timer.is_running(id));
}

// ============================================================================
// Batches
// ============================================================================

#[test]
fn batch_in_creation_order_is_journaled_in_order() {
    let (history, timer, journal) = fixture(10);
    let requests = batch(2);
    let (r1, r2) = (requests[0].id(), requests[1].id());

    let started = start_batch(&history, requests);
    assert_eq!(timer.running(), 2);

    let mut sent =
        PipelineEvent::multi_request_sent(vec![answer(&started[0]), answer(&started[1])]);
    history.handle(&mut sent).unwrap();

    let entries = journal.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].request().id(), r1);
    assert_eq!(entries[1].request().id(), r2);
    assert_eq!(entries[0].response().body(), "https://example.com/0");
    assert_eq!(entries[1].response().body(), "https://example.com/1");

    // Responses now point at the stopped requests, not the started ones.
    for (response, entry) in sent.responses().iter().zip(&entries) {
        let back_reference = response.request().unwrap();
        assert!(back_reference.parameter(TIMER_PARAMETER).is_some());
        assert_eq!(back_reference, entry.request());
    }

    assert_eq!(
        timer.calls(),
        vec![
            TimerCall::Start(r1),
            TimerCall::Start(r2),
            TimerCall::Stop(r1),
            TimerCall::Stop(r2),
        ]
    );
}

#[test]
fn batch_answered_in_reverse_pairs_by_identity() {
    let (history, _, journal) = fixture(10);
    let started = start_batch(&history, batch(3));

    let reversed: Vec<Response> = started.iter().rev().map(answer).collect();
    let mut sent = PipelineEvent::multi_request_sent(reversed);
    history.handle(&mut sent).unwrap();

    for entry in journal.entries() {
        assert_eq!(entry.response().body(), entry.request().url());
    }
    // The event keeps the order it was given.
    let bodies: Vec<&str> = sent.responses().iter().map(Response::body).collect();
    assert_eq!(
        bodies,
        vec![
            "https://example.com/2",
            "https://example.com/1",
            "https://example.com/0"
        ]
    );
}

#[test]
fn journal_limit_applies_to_batches() {
    let (history, _, journal) = fixture(2);
    let started = start_batch(&history, batch(4));

    let mut sent = PipelineEvent::multi_request_sent(started.iter().map(answer).collect());
    history.handle(&mut sent).unwrap();

    let urls: Vec<String> = journal
        .entries()
        .iter()
        .map(|entry| entry.request().url().to_string())
        .collect();
    assert_eq!(urls, vec!["https://example.com/2", "https://example.com/3"]);
}

#[test]
fn restarting_a_running_request_is_fatal() {
    let (history, _, _) = fixture(10);
    let started = start_batch(&history, batch(1));

    let mut again = PipelineEvent::multi_request_created(started);
    let error = history.handle(&mut again).unwrap_err();

    assert!(error.is_precondition());
}

proptest! {
    #[test]
    fn permuted_responses_pair_every_request(
        order in (1usize..8).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
    ) {
        let (history, timer, journal) = fixture(16);
        let started = start_batch(&history, batch(order.len()));

        let responses = order.iter().map(|&i| answer(&started[i])).collect();
        let mut sent = PipelineEvent::multi_request_sent(responses);
        history.handle(&mut sent).unwrap();

        let entries = journal.entries();
        prop_assert_eq!(entries.len(), order.len());
        for (entry, &i) in entries.iter().zip(&order) {
            prop_assert_eq!(entry.request().id(), started[i].id());
            prop_assert_eq!(entry.response().body(), entry.request().url());
            prop_assert!(entry.elapsed().is_some());
        }
        prop_assert_eq!(timer.running(), 0);
        prop_assert_eq!(history.pending(), 0);
    }
}
