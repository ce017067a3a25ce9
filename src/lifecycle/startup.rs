//! Startup orchestration.
//!
//! # Responsibilities
//! - Compile the first generation and acquire the listening socket
//! - Record the process ID for external supervision
//! - Run the server and the control plane until stop or hand-off
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when the table is built)
//! - The pid file is left to the successor after a hand-off
//! - Signals stay watched during the drain; a second stop cuts it short

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ConfigError, RouterConfig};
use crate::http::HttpServer;
use crate::lifecycle::control::{next_stop, ControlPlane, Exit};
use crate::lifecycle::reload::Reloader;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::net::{Listener, ListenerError, ListenerSource};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("cannot write pid file {path}: {source}")]
    PidFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
    #[error("HTTP server failed: {0}")]
    Server(#[source] std::io::Error),
}

/// How this process generation was started.
#[derive(Debug, Clone)]
pub struct StartupOptions {
    pub config_path: PathBuf,
    /// Adopt the inherited listening socket instead of binding.
    pub graceful: bool,
}

/// The pid file written by this process.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    pid: u32,
}

impl PidFile {
    /// Write the current process ID to `path`, replacing any previous content.
    pub fn write(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let pid = std::process::id();
        std::fs::write(&path, pid.to_string())?;
        Ok(Self { path, pid })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file if it still names this process.
    ///
    /// Returns whether the file was removed.
    pub fn remove_if_owned(&self) -> std::io::Result<bool> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        if contents.trim().parse::<u32>().ok() != Some(self.pid) {
            return Ok(false);
        }
        std::fs::remove_file(&self.path)?;
        Ok(true)
    }
}

/// Serve until a stop or a completed hand-off.
pub async fn run(options: StartupOptions, config: RouterConfig) -> Result<Exit, StartupError> {
    let source = if options.graceful {
        ListenerSource::Inherited
    } else {
        ListenerSource::Fresh(config.options.port)
    };
    let drain = Duration::from_secs(config.timeouts.shutdown_secs);
    let pid_path = config.options.pid_file.clone();

    let reloader = Arc::new(Reloader::new(&options.config_path, config)?);
    let listener = Listener::open(source).await?;

    let pid_file = PidFile::write(&pid_path).map_err(|source| StartupError::PidFile {
        path: pid_path.clone(),
        source,
    })?;
    tracing::info!(pid = std::process::id(), path = %pid_file.path().display(), "Pid file written");

    let mut events = signals::listen().map_err(StartupError::Signals)?;
    let shutdown = Shutdown::new();

    let server = HttpServer::new(Arc::clone(&reloader));
    let mut server_task = tokio::spawn(server.run(listener.inner, shutdown.subscribe(), drain));

    let control = ControlPlane::new(reloader, shutdown.clone(), listener.exported);
    let exit = tokio::select! {
        exit = control.run(&mut events) => exit,
        result = &mut server_task => {
            return match result {
                Ok(Ok(())) => Err(StartupError::Server(std::io::Error::other("server exited unexpectedly"))),
                Ok(Err(e)) => Err(StartupError::Server(e)),
                Err(e) => Err(StartupError::Server(std::io::Error::other(e))),
            };
        }
    };

    tracing::info!(subscribers = shutdown.receiver_count(), "Waiting for server to drain");
    tokio::select! {
        result = &mut server_task => match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed during drain"),
            Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
        },
        () = next_stop(&mut events) => {
            tracing::warn!("Stop requested again, abandoning drain");
            server_task.abort();
        }
    }

    if exit == Exit::Stopped {
        match pid_file.remove_if_owned() {
            Ok(true) => tracing::debug!("Pid file removed"),
            Ok(false) => tracing::debug!("Pid file belongs to another process, left in place"),
            Err(e) => tracing::warn!(error = %e, "Failed to remove pid file"),
        }
    }

    tracing::info!(exit = ?exit, "Shutdown complete");
    Ok(exit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("ab-router-{}.pid", uuid::Uuid::new_v4()))
    }

    #[test]
    fn pid_file_holds_current_pid() {
        let path = temp_path();
        let pid_file = PidFile::write(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, std::process::id().to_string());

        assert!(pid_file.remove_if_owned().unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn pid_file_of_successor_is_left_alone() {
        let path = temp_path();
        let pid_file = PidFile::write(&path).unwrap();
        std::fs::write(&path, "999999").unwrap();

        assert!(!pid_file.remove_if_owned().unwrap());
        assert!(path.exists());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_pid_file_is_not_an_error() {
        let path = temp_path();
        let pid_file = PidFile::write(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(!pid_file.remove_if_owned().unwrap());
    }
}
