//! Default batch behaviour of [`HttpAdapter`].

#![allow(clippy::unwrap_used)]

use courier_core::message::{HttpMethod, Request};
use courier_core::HttpAdapter;
use courier_testing::MockHttpAdapter;

#[test]
fn send_all_results_are_index_aligned() {
    let transport = MockHttpAdapter::new();
    transport.respond("https://example.com/a", 200, "a");
    transport.respond("https://example.com/c", 201, "c");

    let requests = vec![
        Request::new(HttpMethod::Get, "https://example.com/a"),
        Request::new(HttpMethod::Get, "https://example.com/b"),
        Request::new(HttpMethod::Post, "https://example.com/c"),
    ];
    let failing_id = requests[1].id();

    let results = tokio_test::block_on(transport.send_all(requests));

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().body(), "a");
    assert_eq!(results[1].as_ref().unwrap_err().request().id(), failing_id);
    assert_eq!(results[2].as_ref().unwrap().status(), 201);
    assert_eq!(transport.send_count(), 3);
}

#[test]
fn send_all_of_nothing_is_empty() {
    let transport = MockHttpAdapter::new();
    let results = tokio_test::block_on(transport.send_all(Vec::new()));
    assert!(results.is_empty());
}
