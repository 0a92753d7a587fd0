//! End-to-end tests through a real listener.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde_json::{json, Value};

use api_gateway::config::GatewayConfig;
use api_gateway::http::GatewayServer;

mod common;

use common::{client, route, start_gateway};

fn config_with(routes: Vec<api_gateway::config::RouteConfig>) -> GatewayConfig {
    GatewayConfig {
        routes,
        ..GatewayConfig::default()
    }
}

#[tokio::test]
async fn test_forwards_with_prefix_stripped() {
    let backend = common::start_echo_backend("users").await;
    let gateway = start_gateway(config_with(vec![route("/users", backend)])).await;

    let res = client().get(gateway.url("/users/42?full=1")).send().await.expect("Gateway unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-backend"], "users");
    assert_eq!(res.headers()["x-echo-method"], "GET");
    assert_eq!(res.headers()["x-echo-host"], backend.to_string().as_str());
    assert_eq!(res.headers()["x-echo-forwarded-for"], "127.0.0.1");
    // The id the backend saw is the one the client gets back.
    let request_id = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(res.headers()["x-echo-request-id"], request_id.as_str());
    assert_eq!(res.text().await.unwrap(), "/42?full=1");
}

#[tokio::test]
async fn test_each_route_reaches_its_own_backend() {
    let auth = common::start_echo_backend("auth").await;
    let users = common::start_echo_backend("users").await;
    let gateway = start_gateway(config_with(vec![route("/auth", auth), route("/users", users)])).await;
    let client = client();

    let res = client.post(gateway.url("/auth/login")).send().await.unwrap();
    assert_eq!(res.headers()["x-backend"], "auth");
    assert_eq!(res.headers()["x-echo-method"], "POST");
    assert_eq!(res.text().await.unwrap(), "/login");

    let res = client.get(gateway.url("/users")).send().await.unwrap();
    assert_eq!(res.headers()["x-backend"], "users");
    assert_eq!(res.text().await.unwrap(), "/");
}

#[tokio::test]
async fn test_unknown_route_is_404_envelope() {
    let backend = common::start_echo_backend("users").await;
    let gateway = start_gateway(config_with(vec![route("/users", backend)])).await;

    let res = client().get(gateway.url("/unknown")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "code": 404, "status": "Error", "message": "Route not found", "data": null })
    );
}

#[tokio::test]
async fn test_backend_errors_are_relayed_verbatim() {
    let backend = common::start_fixed_backend("503 Service Unavailable", "maintenance").await;
    let gateway = start_gateway(config_with(vec![route("/payments", backend)])).await;

    let res = client().get(gateway.url("/payments/1")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.headers()["content-type"], "text/plain");
    assert_eq!(res.text().await.unwrap(), "maintenance");
}

#[tokio::test]
async fn test_rate_limit_rejects_after_allowance() {
    let backend = common::start_echo_backend("chats").await;
    let mut config = config_with(vec![route("/chats", backend)]);
    config.rate_limit.max_requests = 3;
    let gateway = start_gateway(config).await;
    let client = client();

    for _ in 0..3 {
        let res = client.get(gateway.url("/chats/1")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = client.get(gateway.url("/chats/1")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().contains_key("retry-after"));
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "code": 429, "status": "Error", "message": "Rate limit exceeded.", "data": null })
    );

    // Unrouted paths are counted first, so they are rejected too.
    let res = client.get(gateway.url("/unknown")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_window_reset_restores_allowance() {
    let backend = common::start_echo_backend("chats").await;
    let mut config = config_with(vec![route("/chats", backend)]);
    config.rate_limit.max_requests = 2;
    config.rate_limit.window_ms = 1_000;
    let gateway = start_gateway(config).await;
    let client = client();

    for _ in 0..2 {
        assert_eq!(client.get(gateway.url("/chats")).send().await.unwrap().status(), StatusCode::OK);
    }
    assert_eq!(
        client.get(gateway.url("/chats")).send().await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    tokio::time::sleep(Duration::from_millis(1_300)).await;

    for _ in 0..2 {
        assert_eq!(client.get(gateway.url("/chats")).send().await.unwrap().status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_slow_backend_times_out_and_is_cancelled() {
    let (backend, mut closed) = common::start_stalled_backend().await;
    let mut config = config_with(vec![route("/slow", backend)]);
    config.timeouts.request_ms = 300;
    let gateway = start_gateway(config).await;

    let start = Instant::now();
    let res = client().get(gateway.url("/slow/report")).send().await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(elapsed >= Duration::from_millis(300), "answered too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5), "answered too late: {:?}", elapsed);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "code": 504, "status": "Error", "message": "Gateway timeout.", "data": null })
    );

    // The backend connection is torn down, not left dangling.
    tokio::time::timeout(Duration::from_secs(3), closed.recv())
        .await
        .expect("backend connection was not closed")
        .expect("backend task ended");
    assert!(gateway.dispatcher.in_flight_requests().is_empty());
}

#[tokio::test]
async fn test_slow_route_does_not_delay_other_routes() {
    let (slow, _closed) = common::start_stalled_backend().await;
    let fast = common::start_echo_backend("fast").await;
    let mut config = config_with(vec![route("/slow", slow), route("/fast", fast)]);
    config.timeouts.request_ms = 1_000;
    let gateway = start_gateway(config).await;
    let client = client();

    let stalled = tokio::spawn({
        let client = client.clone();
        let url = gateway.url("/slow");
        async move { client.get(url).send().await.map(|r| r.status()) }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    let start = Instant::now();
    let res = client.get(gateway.url("/fast/ping")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(start.elapsed() < Duration::from_millis(900));

    assert_eq!(stalled.await.unwrap().unwrap(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_unreachable_backend_is_502() {
    let backend = common::unused_addr().await;
    let gateway = start_gateway(config_with(vec![route("/auth", backend)])).await;

    let res = client().get(gateway.url("/auth/login")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "code": 502, "status": "Error", "message": "Bad gateway.", "data": null }));
}

#[tokio::test]
async fn test_malformed_backend_is_502() {
    let backend = common::start_garbage_backend().await;
    let gateway = start_gateway(config_with(vec![route("/users", backend)])).await;

    let res = client().get(gateway.url("/users/1")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "code": 502, "status": "Error", "message": "Bad gateway.", "data": null }));
}

#[tokio::test]
async fn test_client_disconnect_cancels_backend_call() {
    let (backend, mut closed) = common::start_stalled_backend().await;
    let mut config = config_with(vec![route("/slow", backend)]);
    config.timeouts.request_ms = 30_000;
    let gateway = start_gateway(config).await;

    let pending = tokio::spawn({
        let url = gateway.url("/slow/export");
        async move { client().get(url).send().await.map(|r| r.status()) }
    });

    // Wait until the request is parked on the backend.
    let deadline = Instant::now() + Duration::from_secs(3);
    while gateway.dispatcher.in_flight_requests().is_empty() {
        assert!(Instant::now() < deadline, "request never reached the backend");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    pending.abort();

    tokio::time::timeout(Duration::from_secs(3), closed.recv())
        .await
        .expect("backend connection was not closed")
        .expect("backend task ended");

    let deadline = Instant::now() + Duration::from_secs(1);
    while !gateway.dispatcher.in_flight_requests().is_empty() {
        assert!(Instant::now() < deadline, "in-flight entry was not released");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_retry_after_matches_window_started_by_server() {
    let backend = common::start_echo_backend("chats").await;
    let mut config = config_with(vec![route("/chats", backend)]);
    config.rate_limit.max_requests = 1;
    config.rate_limit.window_ms = 3_000;

    // Leave a gap between building the limiter and starting its timer.
    let server = GatewayServer::new(config).expect("valid routes");
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    let gateway = common::serve(server).await;
    let client = client();

    assert_eq!(client.get(gateway.url("/chats")).send().await.unwrap().status(), StatusCode::OK);
    let res = client.get(gateway.url("/chats")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = res.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert_eq!(retry_after, 3);

    tokio::time::sleep(Duration::from_secs(retry_after) + Duration::from_millis(300)).await;
    assert_eq!(client.get(gateway.url("/chats")).send().await.unwrap().status(), StatusCode::OK);
}
