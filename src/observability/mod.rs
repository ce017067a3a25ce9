//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (lifecycle, reload, per-request access records)
//!
//! Consumers:
//!     → logging.rs (stderr or a dated file under <dir>, text or JSON)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID is a field on every per-request event
//! - Panics are logged with a backtrace instead of going to raw stderr

pub mod logging;

pub use logging::{init_logging, DatedLog, LoggingError};
