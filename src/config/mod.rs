//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → compiled into a RoutingTable generation
//!
//! On reload signal or admin call:
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → lifecycle::reload publishes the new generation atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    HostRuleConfig, LogConfig, LogStyle, OptionsConfig, RouterConfig, ServerGroups,
    TimeoutConfig,
};
pub use validation::ValidationError;
