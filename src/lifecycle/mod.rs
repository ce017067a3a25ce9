//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Build first generation → Acquire listener → Pid file → Serve
//!
//! Signals (signals.rs) → ControlEvent → control.rs:
//!     Stop    → shutdown.rs broadcast → drain (a second Stop aborts it) → exit
//!     Reload  → reload.rs builds and publishes a new generation
//!     Restart → restart.rs spawns successor on fd 3 → drain → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then listener, then control plane
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: remaining connections dropped after deadline

pub mod control;
pub mod reload;
pub mod restart;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use control::{next_stop, ControlPlane, Exit, State};
pub use reload::{Generation, Reloader};
pub use shutdown::{Shutdown, ShutdownReason, ShutdownSignal};
pub use signals::ControlEvent;
pub use startup::{StartupError, StartupOptions};
