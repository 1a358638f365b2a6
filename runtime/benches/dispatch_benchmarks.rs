//! Dispatch and pipeline benchmarks.
//!
//! - Dispatcher overhead per event with the stock subscribers registered
//! - History pairing cost for batches of increasing size
//! - Full single-request round trip over an in-memory transport
//!
//! Run with: `cargo bench`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used, clippy::unwrap_used)] // Benchmarks can use expect for setup

use courier_core::event::PipelineEvent;
use courier_core::message::{HttpMethod, Request, Response};
use courier_core::subscriber::Subscriber;
use courier_runtime::dispatcher::EventDispatcher;
use courier_runtime::subscribers::{
    HistorySubscriber, LoggerSubscriber, MetricsSubscriber, RetrySubscriber, StatusCodeSubscriber,
};
use courier_runtime::EventDrivenAdapter;
use courier_testing::MockHttpAdapter;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

fn stock_dispatcher() -> EventDispatcher {
    EventDispatcher::builder()
        .subscriber(LoggerSubscriber::new())
        .subscriber(MetricsSubscriber::new())
        .subscriber(RetrySubscriber::default())
        .subscriber(StatusCodeSubscriber::new())
        .build()
}

/// Dispatch a sent event through every stock subscriber except history
fn benchmark_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    let dispatcher = stock_dispatcher();
    let request = Request::new(HttpMethod::Get, "https://example.com/todos");
    let response = Response::new(200, "[]").with_request(request.clone());

    group.bench_function("request_sent", |b| {
        b.iter(|| {
            let mut event = PipelineEvent::request_sent(request.clone(), response.clone());
            dispatcher.dispatch(black_box(&mut event)).expect("dispatch");
        });
    });

    group.finish();
}

/// Start and complete whole batches through the history subscriber
fn benchmark_history_pairing(c: &mut Criterion) {
    let mut group = c.benchmark_group("history_pairing");

    for size in [1usize, 8, 64] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let history = HistorySubscriber::with_limit(size);
            b.iter(|| {
                let requests: Vec<Request> = (0..size)
                    .map(|i| Request::new(HttpMethod::Get, format!("https://example.com/{i}")))
                    .collect();
                let mut created = PipelineEvent::multi_request_created(requests);
                history.handle(&mut created).expect("start");

                let responses = created
                    .take_requests()
                    .into_iter()
                    .rev()
                    .map(|request| Response::new(200, "").with_request(request))
                    .collect();
                let mut sent = PipelineEvent::multi_request_sent(responses);
                history.handle(black_box(&mut sent)).expect("complete");
            });
        });
    }

    group.finish();
}

/// Full round trip through the pipeline
fn benchmark_round_trip(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let transport = Arc::new(MockHttpAdapter::new());
    transport.respond("https://example.com/todos", 200, "[]");

    let pipeline = EventDrivenAdapter::builder(transport)
        .history(HistorySubscriber::with_limit(1024))
        .subscriber(StatusCodeSubscriber::new())
        .build();

    c.bench_function("pipeline/send_request", |b| {
        b.to_async(&runtime).iter(|| async {
            let request = Request::new(HttpMethod::Get, "https://example.com/todos");
            pipeline.send_request(black_box(request)).await.expect("send")
        });
    });
}

criterion_group!(
    benches,
    benchmark_dispatch,
    benchmark_history_pairing,
    benchmark_round_trip,
);
criterion_main!(benches);
