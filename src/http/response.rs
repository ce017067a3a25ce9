//! Response handling and transformation.
//!
//! # Responsibilities
//! - Transform backend response for client
//! - Tag every response with the request ID
//! - Map backend errors to an opaque 503
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Hop-by-hop headers stripped; every other header (repeated ones and raw
//!   `Set-Cookie` included) is copied once
//! - Backend failures are never retried against another address

use axum::body::Body;
use axum::http::{HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;
use hyper::body::Incoming;

use crate::http::request::{is_hop_by_hop, REQUEST_ID_HEADER};

/// Tag `response` with the request ID.
fn tag<B>(response: &mut Response<B>, request_id: &str) {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().append(REQUEST_ID_HEADER, value);
    }
}

/// The client-facing response for a backend failure.
pub fn backend_unavailable(request_id: &str) -> axum::response::Response {
    let mut response = (
        StatusCode::SERVICE_UNAVAILABLE,
        format!("{request_id} backend server error"),
    )
        .into_response();
    tag(&mut response, request_id);
    response
}

/// Convert a backend response into the client response, streaming the body.
pub fn forward(upstream: Response<Incoming>, request_id: &str) -> axum::response::Response {
    let (mut parts, body) = upstream.into_parts();
    let hop_by_hop: Vec<_> = parts
        .headers
        .keys()
        .filter(|name| is_hop_by_hop(name))
        .cloned()
        .collect();
    for name in hop_by_hop {
        parts.headers.remove(name);
    }

    let mut response = Response::from_parts(parts, Body::new(body));
    tag(&mut response, request_id);
    response
}
