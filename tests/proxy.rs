//! Proxy behaviour: request tagging, errors, admin endpoints, shutdown.

use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use ab_router::http::{RequestIdProvider, UuidRequestIds};
use ab_router::lifecycle::ShutdownReason;

mod common;

use common::{
    backend_name, start_backend, start_router, start_router_with, start_router_with_drain,
    start_slow_backend,
};

fn single_pool(a: &str) -> String {
    format!("[default_server]\ngroup_a = [\"{a}\"]\n")
}

#[tokio::test]
async fn both_legs_carry_the_same_request_id() {
    let a = start_backend("A").await;
    let router = start_router(&single_pool(&a.to_string())).await;

    let response = reqwest::get(router.url("/")).await.unwrap();
    let id = response.headers()["ab-request-id"].to_str().unwrap().to_string();
    let body = response.text().await.unwrap();

    assert_eq!(id.len(), 36);
    assert_eq!(id, id.to_uppercase());
    assert!(body.to_ascii_lowercase().contains(&format!("ab-request-id: {}", id.to_ascii_lowercase())));
}

#[tokio::test]
async fn backend_headers_and_cookies_are_copied_once() {
    let a = start_backend("A").await;
    let router = start_router(&single_pool(&a.to_string())).await;

    let response = reqwest::get(router.url("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-backend"], "A");
    assert_eq!(response.headers().get_all("set-cookie").iter().count(), 1);
    assert_eq!(response.headers().get_all("ab-request-id").iter().count(), 1);
}

#[tokio::test]
async fn request_body_reaches_backend() {
    let a = start_backend("A").await;
    let router = start_router(&single_pool(&a.to_string())).await;

    let response = reqwest::Client::new()
        .post(router.url("/submit?src=ad"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("name=ab&tag=1")
        .send()
        .await
        .unwrap();
    let body = response.text().await.unwrap();
    assert!(body.contains("POST /submit?src=ad HTTP/1.1"));
    assert!(body.ends_with("name=ab&tag=1"));
}

async fn assert_tagged_503(response: reqwest::Response) {
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let id = response.headers()["ab-request-id"].to_str().unwrap().to_string();
    assert_eq!(response.text().await.unwrap(), format!("{id} backend server error"));
}

#[tokio::test]
async fn dead_backend_yields_tagged_503() {
    // Nothing listens on the discard port.
    let router = start_router(&single_pool("127.0.0.1:9")).await;

    let response = reqwest::get(router.url("/")).await.unwrap();
    assert_tagged_503(response).await;
}

#[tokio::test]
async fn hung_backend_yields_tagged_503() {
    let slow = start_slow_backend("SLOW", Duration::from_secs(4)).await;
    let config = format!(
        "[timeouts]\nupstream_secs = 2\nwrite_secs = 2\n\n{}",
        single_pool(&slow.to_string())
    );
    let router = start_router(&config).await;

    let started = Instant::now();
    let response = reqwest::get(router.url("/")).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_tagged_503(response).await;
}

#[tokio::test]
async fn write_deadline_yields_tagged_503() {
    let slow = start_slow_backend("SLOW", Duration::from_secs(4)).await;
    let config = format!(
        "[timeouts]\nupstream_secs = 30\nwrite_secs = 1\n\n{}",
        single_pool(&slow.to_string())
    );
    let router = start_router(&config).await;

    let response = reqwest::get(router.url("/")).await.unwrap();
    assert_tagged_503(response).await;
}

/// Panics the first time it is asked for an ID.
struct FailsOnce {
    failed: AtomicBool,
}

impl RequestIdProvider for FailsOnce {
    fn next_id(&self) -> String {
        if !self.failed.swap(true, Ordering::SeqCst) {
            panic!("request id source unavailable");
        }
        UuidRequestIds.next_id()
    }
}

#[tokio::test]
async fn handler_panic_does_not_stop_the_server() {
    let a = start_backend("A").await;
    let ids = Arc::new(FailsOnce {
        failed: AtomicBool::new(false),
    });
    let router = start_router_with(&single_pool(&a.to_string()), Duration::from_secs(5), ids).await;

    let response = reqwest::get(router.url("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = reqwest::get(router.url("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend_name(&response.text().await.unwrap()), "A");
    assert!(!router.handle.is_finished());
}

#[tokio::test]
async fn stalled_request_head_is_cut_off() {
    let router = start_router("[timeouts]\nread_secs = 1\n").await;

    let mut stream = TcpStream::connect(router.addr).await.unwrap();
    stream.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n").await.unwrap();

    // The server must hang up; whatever it sends first does not matter.
    let mut buf = Vec::new();
    let closed = tokio::time::timeout(Duration::from_secs(4), stream.read_to_end(&mut buf)).await;
    assert!(closed.is_ok(), "connection still open after the read timeout");
}

#[tokio::test]
async fn idle_keep_alive_connection_is_closed() {
    let router = start_router("[timeouts]\nidle_secs = 1\n").await;

    let mut stream = TcpStream::connect(router.addr).await.unwrap();
    stream
        .write_all(b"GET /slb_check HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();

    let mut buf = Vec::new();
    let closed = tokio::time::timeout(Duration::from_secs(4), stream.read_to_end(&mut buf)).await;
    assert!(closed.is_ok(), "idle connection still open");
    let response = String::from_utf8_lossy(&buf);
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("ok"));
}

#[tokio::test]
async fn empty_pool_yields_503() {
    let router = start_router("").await;
    let response = reqwest::get(router.url("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().contains_key("ab-request-id"));
}

#[tokio::test]
async fn liveness_endpoint() {
    let router = start_router("").await;
    let response = reqwest::get(router.url("/slb_check")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn admin_reload_swaps_routing() {
    let a = start_backend("A").await;
    let b = start_backend("B").await;
    let router = start_router(&single_pool(&a.to_string())).await;

    let body = reqwest::get(router.url("/")).await.unwrap().text().await.unwrap();
    assert_eq!(backend_name(&body), "A");

    router.rewrite_config(&single_pool(&b.to_string()));
    let response = reqwest::get(router.url("/abtest_config_reload")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "reload success");
    assert_eq!(router.reloader.current().id, 2);

    let body = reqwest::get(router.url("/")).await.unwrap().text().await.unwrap();
    assert_eq!(backend_name(&body), "B");
}

#[tokio::test]
async fn failed_reload_keeps_serving_previous_table() {
    let a = start_backend("A").await;
    let router = start_router(&single_pool(&a.to_string())).await;

    router.rewrite_config("[default_server]\ngroup_a = [\"no-port\"]\n");
    let response = reqwest::get(router.url("/abtest_config_reload")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().await.unwrap(), "reload fail");

    let body = reqwest::get(router.url("/")).await.unwrap().text().await.unwrap();
    assert_eq!(backend_name(&body), "A");
    assert_eq!(router.reloader.current().id, 1);
}

#[tokio::test]
async fn shutdown_drains_in_flight_requests() {
    let slow = start_slow_backend("SLOW", Duration::from_millis(300)).await;
    let router = start_router(&single_pool(&slow.to_string())).await;

    let url = router.url("/");
    let in_flight = tokio::spawn(async move { reqwest::get(url).await.unwrap().text().await.unwrap() });
    tokio::time::sleep(Duration::from_millis(100)).await;

    router.shutdown.trigger(ShutdownReason::Stop);
    let body = in_flight.await.unwrap();
    assert_eq!(backend_name(&body), "SLOW");

    let mut router = router;
    tokio::time::timeout(Duration::from_secs(5), &mut router.handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(tokio::net::TcpStream::connect(router.addr).await.is_err());
}

#[tokio::test]
async fn drain_deadline_abandons_stuck_requests() {
    let stuck = start_slow_backend("STUCK", Duration::from_secs(30)).await;
    let router = start_router_with_drain(&single_pool(&stuck.to_string()), Duration::from_millis(200)).await;

    let url = router.url("/");
    let _abandoned = tokio::spawn(async move { reqwest::get(url).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    router.shutdown.trigger(ShutdownReason::Stop);
    let mut router = router;
    tokio::time::timeout(Duration::from_secs(5), &mut router.handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
