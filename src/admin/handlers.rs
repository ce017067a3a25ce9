use axum::{extract::State, http::StatusCode};
use std::sync::Arc;

use crate::http::server::AppState;

pub const RELOAD_SUCCESS: &str = "reload success";
pub const RELOAD_FAIL: &str = "reload fail";

/// Re-read the configuration file and publish a new routing table.
///
/// A failed reload keeps the live table and answers 500.
pub async fn reload_config(State(state): State<AppState>) -> (StatusCode, &'static str) {
    let reloader = Arc::clone(&state.reloader);
    let outcome = tokio::task::spawn_blocking(move || reloader.reload()).await;

    match outcome {
        Ok(Ok(generation)) => {
            tracing::info!(generation = generation.id, "Configuration reloaded via admin endpoint");
            (StatusCode::OK, RELOAD_SUCCESS)
        }
        Ok(Err(e)) => {
            tracing::error!(
                path = %state.reloader.path().display(),
                error = %e,
                "Configuration reload failed, keeping previous routing table"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, RELOAD_FAIL)
        }
        Err(e) => {
            tracing::error!(error = %e, "Configuration reload task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, RELOAD_FAIL)
        }
    }
}

pub async fn liveness() -> &'static str {
    "ok"
}
