//! Request body excerpts for the access log.
//!
//! The body is classified by media type: URL-encoded forms and multipart
//! forms are logged as fields, JSON and everything else as raw text.

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart, Query};
use axum::http::{header, HeaderMap, Method, Request, Uri};
use axum::Form;
use serde::Serialize;

/// One multipart field as it appears in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub size: usize,
}

/// A loggable view of a request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BodyExcerpt {
    Form {
        query: Vec<(String, String)>,
        form: Vec<(String, String)>,
    },
    Multipart {
        parts: Vec<PartSummary>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Json {
        body: String,
    },
    Other {
        body: String,
    },
}

impl BodyExcerpt {
    pub fn kind(&self) -> &'static str {
        match self {
            BodyExcerpt::Form { .. } => "form",
            BodyExcerpt::Multipart { .. } => "multipart",
            BodyExcerpt::Json { .. } => "json",
            BodyExcerpt::Other { .. } => "other",
        }
    }

    /// Single-line rendering for the log record.
    pub fn render(&self) -> String {
        match self {
            BodyExcerpt::Json { body } | BodyExcerpt::Other { body } => body.clone(),
            _ => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

/// Media type of the request, lowercased and without parameters.
pub fn media_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Build the excerpt for a buffered body, capping text at `limit` bytes.
pub async fn excerpt(headers: &HeaderMap, uri: &Uri, body: &Bytes, limit: usize) -> BodyExcerpt {
    match media_type(headers).as_str() {
        "application/x-www-form-urlencoded" => {
            let query = Query::<Vec<(String, String)>>::try_from_uri(uri)
                .map(|Query(pairs)| pairs)
                .unwrap_or_default();
            let form = match Form::<Vec<(String, String)>>::from_request(
                replay(headers, body),
                &(),
            )
            .await
            {
                Ok(Form(pairs)) => pairs,
                Err(_) => Vec::new(),
            };
            BodyExcerpt::Form { query, form }
        }
        "multipart/form-data" => multipart(headers, body, limit).await,
        "application/json" => BodyExcerpt::Json {
            body: truncated(body, limit),
        },
        _ => BodyExcerpt::Other {
            body: truncated(body, limit),
        },
    }
}

async fn multipart(headers: &HeaderMap, body: &Bytes, limit: usize) -> BodyExcerpt {
    let mut parts = Vec::new();
    let mut multipart = match Multipart::from_request(replay(headers, body), &()).await {
        Ok(m) => m,
        Err(e) => {
            return BodyExcerpt::Multipart {
                parts,
                error: Some(e.body_text()),
            }
        }
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return BodyExcerpt::Multipart {
                    parts,
                    error: Some(e.body_text()),
                }
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_owned);
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => {
                return BodyExcerpt::Multipart {
                    parts,
                    error: Some(e.body_text()),
                }
            }
        };
        let value = file_name.is_none().then(|| truncated(&data, limit));
        parts.push(PartSummary {
            name,
            file_name,
            value,
            size: data.len(),
        });
    }

    BodyExcerpt::Multipart { parts, error: None }
}

/// A throwaway request carrying the buffered body, for axum's extractors.
fn replay(headers: &HeaderMap, body: &Bytes) -> Request<Body> {
    let mut request = Request::new(Body::from(body.clone()));
    *request.method_mut() = Method::POST;
    if let Some(ct) = headers.get(header::CONTENT_TYPE) {
        request.headers_mut().insert(header::CONTENT_TYPE, ct.clone());
    }
    request
}

fn truncated(body: &[u8], limit: usize) -> String {
    let end = body.len().min(limit);
    String::from_utf8_lossy(&body[..end]).into_owned()
}
