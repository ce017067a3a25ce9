//! A/B traffic router.
//!
//! Forwards each request to one of two backend groups based on a version
//! token and an obfuscated directive token, with live configuration reload
//! and zero-downtime process hand-off.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────▶ net::listener ──▶ http::server ──▶ http::proxy
//!                                                     │
//!                                                     ▼
//!                                   routing::router ◀── lifecycle::reload
//!                                     │      │           (live Generation)
//!                          directive::decoder │
//!                                            ▼
//!     Client Response                   backend group A / B
//!     ◀────────── http::response ◀──────────┘
//!
//!     Signals ──▶ lifecycle::control ──▶ reload / restart / shutdown
//! ```

// Core subsystems
pub mod config;
pub mod directive;
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;

pub use config::schema::RouterConfig;
pub use http::HttpServer;
pub use lifecycle::{Reloader, Shutdown};
