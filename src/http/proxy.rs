//! The catch-all proxy handler.
//!
//! # Responsibilities
//! - Buffer the request body once, for both the access log and the backend
//! - Resolve the backend through the live generation's router
//! - Forward the request and stream the backend response back
//!
//! # Design Decisions
//! - The generation is loaded once per request; a reload mid-request does
//!   not change where that request goes
//! - Every failure after the request ID is assigned becomes a tagged 503,
//!   including running past the write deadline
//! - No retries, no fail-over to another address in the pool

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::response::Response;
use std::time::Duration;
use thiserror::Error;

use crate::http::body::excerpt;
use crate::http::request::{outbound_request, path_and_query, request_host, Tokens};
use crate::http::response::{backend_unavailable, forward};
use crate::http::server::AppState;
use crate::lifecycle::reload::Generation;

/// Why a request could not be delivered to a backend.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to read request body: {0}")]
    Body(#[source] axum::Error),
    #[error("request body not received within {0:?}")]
    BodyTimeout(Duration),
    #[error("no backend configured for host {0:?}")]
    NoBackend(String),
    #[error("failed to build backend request: {0}")]
    Build(#[from] axum::http::Error),
    #[error("backend request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
    #[error("backend did not respond within {0:?}")]
    Timeout(Duration),
    #[error("response not produced within {0:?}")]
    Deadline(Duration),
}

/// Proxy any request not claimed by an admin route.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let _in_flight = state.in_flight.track();
    let generation = state.reloader.current();
    let request_id = state.request_ids.next_id();

    let deadline = Duration::from_secs(generation.config.timeouts.write_secs);
    let outcome = tokio::time::timeout(deadline, proxy(&state, &generation, &request_id, request))
        .await
        .unwrap_or(Err(ProxyError::Deadline(deadline)));

    match outcome {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Backend request failed");
            backend_unavailable(&request_id)
        }
    }
}

async fn proxy(
    state: &AppState,
    generation: &Generation,
    request_id: &str,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    let options = &generation.config.options;
    let timeouts = &generation.config.timeouts;

    let host = request_host(&request);
    let (parts, body) = request.into_parts();

    let read_timeout = Duration::from_secs(timeouts.read_secs);
    let body = tokio::time::timeout(read_timeout, axum::body::to_bytes(body, options.max_body_bytes))
        .await
        .map_err(|_| ProxyError::BodyTimeout(read_timeout))?
        .map_err(ProxyError::Body)?;

    let tokens = Tokens::extract(&parts.headers, &generation.tokens);
    let backend = generation
        .router
        .resolve(&host, &tokens.version, &tokens.directive)
        .await;

    let target = backend
        .as_deref()
        .map(|b| format!("http://{b}{}", path_and_query(&parts.uri)))
        .unwrap_or_default();
    log_access(
        request_id,
        &parts,
        &host,
        &target,
        &body,
        options.log_body_bytes,
    )
    .await;

    let backend = backend.ok_or_else(|| ProxyError::NoBackend(host.clone()))?;
    let outbound = outbound_request(
        &parts.method,
        &parts.uri,
        &parts.headers,
        &backend,
        request_id,
        body,
    )?;

    let upstream_timeout = Duration::from_secs(timeouts.upstream_secs);
    let response = tokio::time::timeout(upstream_timeout, state.client.request(outbound))
        .await
        .map_err(|_| ProxyError::Timeout(upstream_timeout))??;

    tracing::debug!(
        request_id = %request_id,
        backend = %backend,
        status = response.status().as_u16(),
        "Backend responded"
    );
    Ok(forward(response, request_id))
}

async fn log_access(
    request_id: &str,
    parts: &axum::http::request::Parts,
    host: &str,
    target: &str,
    body: &Bytes,
    limit: usize,
) {
    let excerpt = excerpt(&parts.headers, &parts.uri, body, limit).await;
    tracing::info!(
        request_id = %request_id,
        method = %parts.method,
        host = %host,
        url = %parts.uri,
        target = %target,
        headers = %headers_json(&parts.headers),
        body_kind = excerpt.kind(),
        body = %excerpt.render(),
        "access"
    );
}

/// Headers as a JSON object of name to list of values.
pub fn headers_json(headers: &HeaderMap) -> String {
    let mut map = serde_json::Map::new();
    for name in headers.keys() {
        let values = headers
            .get_all(name)
            .iter()
            .map(|v| serde_json::Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        map.insert(name.as_str().to_string(), serde_json::Value::Array(values));
    }
    serde_json::Value::Object(map).to_string()
}
