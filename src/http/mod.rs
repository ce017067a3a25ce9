//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, admin routes, middleware)
//!     → proxy.rs (buffer body, resolve backend, forward)
//!         → request.rs (tokens, request ID, outbound request)
//!         → body.rs (access-log excerpt)
//!         → [routing layer decides backend]
//!     → response.rs (strip hop-by-hop, tag, stream)
//!     → Send to client
//! ```

pub mod body;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdProvider, UuidRequestIds, REQUEST_ID_HEADER};
pub use server::{AppState, HttpServer};
