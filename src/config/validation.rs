//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate backend addresses and token names
//! - Validate value ranges (timeouts > 0, port valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderName;
use chrono::format::{Item, StrftimeItems};
use thiserror::Error;

use crate::config::schema::RouterConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listen port must be non-zero")]
    ZeroPort,

    #[error("{field}: {value:?} is not a valid header name")]
    InvalidTokenName { field: &'static str, value: String },

    #[error("{field}: {value:?} must be an absolute path")]
    InvalidAdminPath { field: &'static str, value: String },

    #[error("reload_path and health_path must differ")]
    AdminPathClash,

    #[error("timeouts.{0} must be non-zero")]
    ZeroTimeout(&'static str),

    #[error("{context}: {value:?} is not a host:port address")]
    InvalidServer { context: String, value: String },

    #[error("rule keys must be non-empty host names")]
    EmptyHost,

    #[error("log.format: {0:?} is not a usable file name pattern")]
    InvalidLogFormat(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let options = &config.options;

    if options.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }

    for (field, value) in [
        ("version_param", &options.version_param),
        ("directive_param", &options.directive_param),
    ] {
        if HeaderName::from_bytes(value.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidTokenName {
                field,
                value: value.clone(),
            });
        }
    }

    for (field, value) in [
        ("reload_path", &options.reload_path),
        ("health_path", &options.health_path),
    ] {
        if !value.starts_with('/') || value.len() < 2 {
            errors.push(ValidationError::InvalidAdminPath {
                field,
                value: value.clone(),
            });
        }
    }
    if options.reload_path == options.health_path {
        errors.push(ValidationError::AdminPathClash);
    }

    if !is_file_pattern(&config.log.file_pattern()) {
        errors.push(ValidationError::InvalidLogFormat(config.log.format.clone()));
    }

    let timeouts = &config.timeouts;
    for (name, secs) in [
        ("read_secs", timeouts.read_secs),
        ("write_secs", timeouts.write_secs),
        ("idle_secs", timeouts.idle_secs),
        ("upstream_secs", timeouts.upstream_secs),
        ("shutdown_secs", timeouts.shutdown_secs),
    ] {
        if secs == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    check_servers("default_server.group_a", &config.default_server.group_a, &mut errors);
    check_servers("default_server.group_b", &config.default_server.group_b, &mut errors);

    for (host, rule) in &config.rules {
        if host.trim().is_empty() {
            errors.push(ValidationError::EmptyHost);
            continue;
        }
        check_servers(&format!("rules.{host}.group_a"), &rule.group_a, &mut errors);
        check_servers(&format!("rules.{host}.group_b"), &rule.group_b, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_servers(context: &str, servers: &[String], errors: &mut Vec<ValidationError>) {
    for server in servers {
        if !is_host_port(server) {
            errors.push(ValidationError::InvalidServer {
                context: context.to_string(),
                value: server.clone(),
            });
        }
    }
}

/// A non-empty strftime pattern chrono can render.
fn is_file_pattern(pattern: &str) -> bool {
    !pattern.trim().is_empty() && !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}

/// `host:port` with a non-empty host and a non-zero numeric port.
fn is_host_port(value: &str) -> bool {
    match value.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty()
                && !host.contains('/')
                && matches!(port.parse::<u16>(), Ok(p) if p != 0)
        }
        None => false,
    }
}
