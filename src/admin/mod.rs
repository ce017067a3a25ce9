//! Administrative endpoints served beside the proxy.

pub mod handlers;

use axum::{routing::any, Router};

use crate::http::server::AppState;
use self::handlers::{liveness, reload_config};

/// Routes for the reload and liveness endpoints.
pub fn admin_router(reload_path: &str, health_path: &str) -> Router<AppState> {
    Router::new()
        .route(reload_path, any(reload_config))
        .route(health_path, any(liveness))
}
