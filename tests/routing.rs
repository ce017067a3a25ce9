//! End-to-end routing through the proxy.

use reqwest::header::{COOKIE, HOST};
use reqwest::StatusCode;

mod common;

use common::{backend_name, directive_token, start_backend, start_router, unix_now};

async fn two_groups() -> (String, String) {
    let a = start_backend("A").await;
    let b = start_backend("B").await;
    (a.to_string(), b.to_string())
}

fn config(a: &str, b: &str) -> String {
    format!(
        r#"
default_secrets = ["fallback"]

[default_server]
group_a = ["{a}"]
group_b = ["{b}"]

[rules."example.com"]
secrets = ["k1", "k2"]
versions = ["v2"]
uids = [42]
cities = [755]
"#
    )
}

async fn get(router: &common::TestRouter, host: &str, headers: &[(&str, &str)]) -> (StatusCode, String) {
    let client = reqwest::Client::new();
    let mut request = client.get(router.url("/landing?x=1")).header(HOST, host);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let response = request.send().await.unwrap();
    let status = response.status();
    (status, response.text().await.unwrap())
}

#[tokio::test]
async fn unknown_host_goes_to_default_group_a() {
    let (a, b) = two_groups().await;
    let router = start_router(&config(&a, &b)).await;

    let (status, body) = get(&router, "other.com", &[("__abv", "v2")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(backend_name(&body), "A");
}

#[tokio::test]
async fn no_tokens_go_to_group_a() {
    let (a, b) = two_groups().await;
    let router = start_router(&config(&a, &b)).await;

    let (_, body) = get(&router, "example.com", &[]).await;
    assert_eq!(backend_name(&body), "A");
}

#[tokio::test]
async fn version_header_opts_into_group_b() {
    let (a, b) = two_groups().await;
    let router = start_router(&config(&a, &b)).await;

    let (_, body) = get(&router, "example.com", &[("__abv", "v2")]).await;
    assert_eq!(backend_name(&body), "B");

    let (_, body) = get(&router, "example.com", &[("__abv", "v1")]).await;
    assert_eq!(backend_name(&body), "A");
}

#[tokio::test]
async fn version_cookie_is_a_fallback() {
    let (a, b) = two_groups().await;
    let router = start_router(&config(&a, &b)).await;

    let (_, body) = get(&router, "example.com", &[("cookie", "session=1; __abv=v2")]).await;
    assert_eq!(backend_name(&body), "B");
}

#[tokio::test]
async fn directive_uid_routes_to_group_b() {
    let (a, b) = two_groups().await;
    let router = start_router(&config(&a, &b)).await;
    let future = unix_now() + 3600;

    // Encrypted under the second candidate key.
    let token = directive_token("k2", &[future, 42, 0, 0]);
    let (_, body) = get(&router, "example.com", &[("__abv", "v2"), ("__abd", token.as_str())]).await;
    assert_eq!(backend_name(&body), "B");

    let token = directive_token("k1", &[future, 7, 0, 755]);
    let (_, body) = get(&router, "example.com", &[("__abv", "v2"), ("__abd", token.as_str())]).await;
    assert_eq!(backend_name(&body), "B");

    let token = directive_token("k1", &[future, 7, 0, 0]);
    let (_, body) = get(&router, "example.com", &[("__abv", "v2"), ("__abd", token.as_str())]).await;
    assert_eq!(backend_name(&body), "A");
}

#[tokio::test]
async fn expired_directive_goes_to_group_a() {
    let (a, b) = two_groups().await;
    let router = start_router(&config(&a, &b)).await;

    let token = directive_token("k1", &[unix_now() - 60, 42, 0, 0]);
    let cookie = format!("__abd={token}");
    let (_, body) = get(&router, "example.com", &[("__abv", "v2"), ("cookie", cookie.as_str())]).await;
    assert_eq!(backend_name(&body), "A");
}

#[tokio::test]
async fn malformed_directive_acts_as_absent() {
    let (a, b) = two_groups().await;
    let router = start_router(&config(&a, &b)).await;

    let (status, body) = get(&router, "example.com", &[("__abv", "v2"), ("__abd", "zz-not-hex")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(backend_name(&body), "B");
}

#[tokio::test]
async fn host_rule_pools_override_defaults() {
    let (a, b) = two_groups().await;
    let own_a = start_backend("HOST-A").await;
    let router = start_router(&format!(
        "{}\n[rules.\"pooled.com\"]\ngroup_a = [\"{own_a}\"]\n",
        config(&a, &b)
    ))
    .await;

    let (_, body) = get(&router, "pooled.com", &[]).await;
    assert_eq!(backend_name(&body), "HOST-A");
}

#[tokio::test]
async fn request_is_forwarded_with_original_host_and_cookies() {
    let (a, b) = two_groups().await;
    let router = start_router(&config(&a, &b)).await;

    let (_, body) = get(&router, "example.com", &[(COOKIE.as_str(), "session=abc")]).await;
    let forwarded = body.to_ascii_lowercase();
    assert!(forwarded.contains("get /landing?x=1 http/1.1"));
    assert!(forwarded.contains("host: example.com"));
    assert!(forwarded.contains("cookie: session=abc"));
}
