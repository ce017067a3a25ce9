//! Listening socket acquisition.
//!
//! # Responsibilities
//! - Bind the configured port on all interfaces, or
//! - Adopt the socket inherited from the previous process generation
//! - Keep an exportable duplicate for the next hand-off

use std::net::{Ipv4Addr, SocketAddr};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::net::inherit::{self, ExportedListener};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    /// Failed to adopt the inherited descriptor.
    #[error("Failed to resume inherited listener on fd {fd}: {source}")]
    Inherit { fd: i32, source: std::io::Error },
    /// Failed to duplicate the descriptor for a later hand-off.
    #[error("Failed to export listener: {0}")]
    Export(std::io::Error),
}

/// Where the listening socket comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerSource {
    /// Bind a new socket on this port.
    Fresh(u16),
    /// Adopt the socket passed by the previous generation.
    Inherited,
}

/// A bound listener together with its exportable duplicate.
#[derive(Debug)]
pub struct Listener {
    pub inner: TcpListener,
    pub exported: Option<ExportedListener>,
}

impl Listener {
    /// Acquire the listening socket.
    ///
    /// A failed export is not fatal: the process serves normally and only
    /// hot restart becomes unavailable.
    pub async fn open(source: ListenerSource) -> Result<Self, ListenerError> {
        let inner = match source {
            ListenerSource::Fresh(port) => {
                let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
                TcpListener::bind(addr)
                    .await
                    .map_err(|source| ListenerError::Bind { addr, source })?
            }
            ListenerSource::Inherited => {
                inherit::resume_listener().map_err(|source| ListenerError::Inherit {
                    fd: inherit::INHERITED_LISTENER_FD,
                    source,
                })?
            }
        };

        let exported = match inherit::export_listener(&inner) {
            Ok(exported) => Some(exported),
            Err(e) => {
                tracing::warn!(error = %ListenerError::Export(e), "Hot restart unavailable");
                None
            }
        };

        let local_addr = inner.local_addr().ok();
        tracing::info!(
            address = ?local_addr,
            source = ?source,
            "Listener ready"
        );

        Ok(Self { inner, exported })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}
