// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Readiness prober tests against a local HTTP server.

use std::time::Duration;

use devex_orchestrator::Error;
use devex_orchestrator::poll::PollPolicy;
use devex_orchestrator::readiness::{READY_SENTINEL, ReadinessProber};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FAST: PollPolicy = PollPolicy::new(Duration::from_millis(50), Duration::from_secs(5));

#[tokio::test]
async fn test_ready_on_third_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/abc123/ping"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/abc123/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string(READY_SENTINEL))
        .with_priority(2)
        .mount(&server)
        .await;

    let prober = ReadinessProber::new().unwrap();
    let url = format!("{}/abc123/ping", server.uri());

    let attempts = prober.await_ready(&url, FAST).await.unwrap();

    assert_eq!(attempts, 3);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_body_must_match_exactly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/abc123/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\"pong\""))
        .mount(&server)
        .await;

    let prober = ReadinessProber::new().unwrap();
    let url = format!("{}/abc123/ping", server.uri());
    let policy = PollPolicy::new(Duration::from_millis(20), Duration::from_millis(200));

    let err = prober.await_ready(&url, policy).await.unwrap_err();

    assert!(matches!(err, Error::Timeout { after, .. } if after == Duration::from_millis(200)));
    let probes = server.received_requests().await.unwrap().len();
    assert!((1..=10).contains(&probes), "{probes} probes");
}

#[tokio::test]
async fn test_unreachable_endpoint_times_out() {
    // Bind then drop to get a port with nothing listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let prober = ReadinessProber::new().unwrap();
    let url = format!("http://{}/abc123/ping", addr);
    let policy = PollPolicy::new(Duration::from_millis(20), Duration::from_millis(150));

    let err = prober.await_ready(&url, policy).await.unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }));
    assert!(err.to_string().contains("abc123/ping"));
}
