//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, version token, directive token)
//!     → router.rs (decision engine)
//!     → table.rs (host rule lookup, pool fallbacks)
//!     → directive decoder (only when a directive token is present)
//!     → Return: backend "host:port" from group A or group B
//!
//! Table Compilation (at startup and on every reload):
//!     RouterConfig
//!     → Compile RuleSets, candidate keys and pools per host
//!     → Freeze as immutable RoutingTable
//! ```
//!
//! # Design Decisions
//! - Tables compiled once per generation, immutable at runtime
//! - O(1) host lookup via HashMap
//! - Group A unless the request opts in to group B

pub mod router;
pub mod rule_set;
pub mod table;

pub use router::{Group, Router};
pub use rule_set::RuleSet;
pub use table::{HostRule, RoutingTable, ServerPool};
