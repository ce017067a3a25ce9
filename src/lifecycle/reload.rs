//! Live configuration generations.
//!
//! # Responsibilities
//! - Compile a `RouterConfig` into a servable `Generation`
//! - Publish generations atomically for concurrent readers
//! - Reload from disk, keeping the previous generation on failure
//!
//! # Design Decisions
//! - A generation is built completely before it is published; readers see
//!   either the old or the new one, never a partial table
//! - In-flight requests keep the `Arc<Generation>` they loaded, so an old
//!   generation is dropped when its last request finishes
//! - Listener port and log settings only take effect on restart

use arc_swap::ArcSwap;
use axum::http::HeaderName;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::{load_config, ConfigError, RouterConfig, ValidationError};
use crate::routing::{Router, RoutingTable};

/// Header names (and fallback cookie names) carrying the routing tokens.
#[derive(Debug, Clone)]
pub struct TokenNames {
    pub version: HeaderName,
    pub directive: HeaderName,
    pub version_cookie: String,
    pub directive_cookie: String,
}

impl TokenNames {
    fn from_config(config: &RouterConfig) -> Result<Self, ConfigError> {
        let header = |field: &'static str, value: &str| {
            HeaderName::from_bytes(value.as_bytes()).map_err(|_| {
                ConfigError::Validation(vec![ValidationError::InvalidTokenName {
                    field,
                    value: value.to_string(),
                }])
            })
        };
        let options = &config.options;
        Ok(Self {
            version: header("version_param", &options.version_param)?,
            directive: header("directive_param", &options.directive_param)?,
            version_cookie: options.version_param.clone(),
            directive_cookie: options.directive_param.clone(),
        })
    }
}

/// Everything a request needs from one configuration generation.
#[derive(Debug)]
pub struct Generation {
    /// Monotonic generation number, starting at 1.
    pub id: u64,
    pub config: RouterConfig,
    pub router: Router,
    pub tokens: TokenNames,
}

impl Generation {
    /// Compile a validated configuration.
    pub fn build(id: u64, config: RouterConfig) -> Result<Self, ConfigError> {
        let tokens = TokenNames::from_config(&config)?;
        let router = Router::new(RoutingTable::from_config(&config));
        Ok(Self {
            id,
            config,
            router,
            tokens,
        })
    }
}

/// Holds the live generation and rebuilds it on demand.
#[derive(Debug)]
pub struct Reloader {
    path: PathBuf,
    current: ArcSwap<Generation>,
    last_id: AtomicU64,
    reload_lock: Mutex<()>,
}

impl Reloader {
    /// Create a reloader serving `config`, re-reading `path` on reload.
    pub fn new(path: impl Into<PathBuf>, config: RouterConfig) -> Result<Self, ConfigError> {
        let generation = Generation::build(1, config)?;
        Ok(Self {
            path: path.into(),
            current: ArcSwap::from_pointee(generation),
            last_id: AtomicU64::new(1),
            reload_lock: Mutex::new(()),
        })
    }

    /// The configuration file this reloader reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the live generation.
    pub fn current(&self) -> Arc<Generation> {
        self.current.load_full()
    }

    /// Re-read the configuration file and publish it.
    ///
    /// On error the live generation is left untouched.
    pub fn reload(&self) -> Result<Arc<Generation>, ConfigError> {
        let _serialized = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let config = load_config(&self.path)?;
        self.publish_locked(config)
    }

    /// Publish an already-loaded configuration.
    pub fn publish(&self, config: RouterConfig) -> Result<Arc<Generation>, ConfigError> {
        let _serialized = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.publish_locked(config)
    }

    fn publish_locked(&self, config: RouterConfig) -> Result<Arc<Generation>, ConfigError> {
        let previous = self.current.load();
        if previous.config.options.port != config.options.port {
            tracing::warn!(
                old = previous.config.options.port,
                new = config.options.port,
                "Listen port change ignored until restart"
            );
        }
        if previous.config.options.reload_path != config.options.reload_path
            || previous.config.options.health_path != config.options.health_path
        {
            tracing::warn!("Admin path change ignored until restart");
        }
        if previous.config.timeouts.read_secs != config.timeouts.read_secs
            || previous.config.timeouts.idle_secs != config.timeouts.idle_secs
        {
            tracing::warn!("Connection timeout change ignored until restart");
        }
        if previous.config.log != config.log {
            tracing::warn!("Log settings change ignored until restart");
        }

        let id = self.last_id.load(Ordering::SeqCst) + 1;
        let generation = Arc::new(Generation::build(id, config)?);
        self.current.store(Arc::clone(&generation));
        self.last_id.store(id, Ordering::SeqCst);

        tracing::info!(
            generation = id,
            hosts = generation.router.table().host_count(),
            "Routing table published"
        );
        Ok(generation)
    }
}
