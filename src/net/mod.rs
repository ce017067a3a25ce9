//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → listener.rs (fresh bind, or adopt inherited fd 3)
//!     → inherit.rs (keep an exportable duplicate for hot restart)
//!     → Hand off to HTTP layer
//!
//! Per connection / request:
//!     connection.rs (idle tracking, in-flight tracking for drain)
//! ```
//!
//! # Design Decisions
//! - The listening socket survives process hand-off; it is never re-bound
//! - Descriptor passing is unix-only and isolated in inherit.rs

pub mod connection;
pub mod inherit;
pub mod listener;

pub use connection::{Activity, RequestGuard, RequestTracker, TrackedIo};
pub use listener::{Listener, ListenerError, ListenerSource};
