//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request IDs
//! - Extract routing tokens (header first, cookie fallback)
//! - Prepare the outbound request for the backend
//!
//! # Design Decisions
//! - Request ID added to both legs for correlation
//! - Hop-by-hop headers are not forwarded
//! - Original request headers are forwarded verbatim, Host included

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, Uri};
use axum::body::{Body, Bytes};

use crate::lifecycle::reload::TokenNames;

/// Header carrying the request ID on the forwarded request and the response.
pub const REQUEST_ID_HEADER: &str = "ab-request-id";

/// Source of per-request correlation IDs.
pub trait RequestIdProvider: Send + Sync {
    fn next_id(&self) -> String;
}

/// UUID v4 request IDs, rendered upper-case.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidRequestIds;

impl RequestIdProvider for UuidRequestIds {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string().to_uppercase()
    }
}

/// Headers that describe one connection and must not be forwarded.
pub const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name)
}

/// The routing tokens a client sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokens {
    pub version: String,
    pub directive: String,
}

impl Tokens {
    /// Read both tokens from headers, falling back to cookies of the same name.
    pub fn extract(headers: &HeaderMap, names: &TokenNames) -> Self {
        Self {
            version: token(headers, &names.version, &names.version_cookie),
            directive: token(headers, &names.directive, &names.directive_cookie),
        }
    }
}

fn token(headers: &HeaderMap, header: &HeaderName, cookie_name: &str) -> String {
    let from_header = headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !from_header.is_empty() {
        return from_header.to_string();
    }
    cookie(headers, cookie_name).unwrap_or_default()
}

/// Value of the first cookie named `name` across all `Cookie` headers.
pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
}

/// The Host a request was addressed to.
pub fn request_host<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .unwrap_or_default()
}

/// Path and query of the original request, `/` if absent.
pub fn path_and_query(uri: &Uri) -> &str {
    uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
}

/// Build the request sent to `backend`.
pub fn outbound_request(
    method: &Method,
    original_uri: &Uri,
    headers: &HeaderMap,
    backend: &str,
    request_id: &str,
    body: Bytes,
) -> Result<Request<Body>, axum::http::Error> {
    let target = format!("http://{backend}{}", path_and_query(original_uri));
    let mut builder = Request::builder().method(method.clone()).uri(target);

    if let Some(out) = builder.headers_mut() {
        for (name, value) in headers {
            if !is_hop_by_hop(name) {
                out.append(name.clone(), value.clone());
            }
        }
        out.append(REQUEST_ID_HEADER, HeaderValue::from_str(request_id)?);
    }

    builder.body(Body::from(body))
}
