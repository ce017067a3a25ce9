//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the admin routes and the catch-all proxy
//! - Wire up middleware (panic recovery, admin write timeout, tracing)
//! - Accept connections and serve them with header-read and idle deadlines
//! - Serve on a listener until shutdown, then drain under a deadline

use axum::{body::Body, Router};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::conn::auto::Builder,
    service::TowerToHyperService,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::admin_router;
use crate::config::{RouterConfig, TimeoutConfig};
use crate::http::proxy::proxy_handler;
use crate::http::request::{RequestIdProvider, UuidRequestIds};
use crate::lifecycle::reload::Reloader;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::net::{Activity, RequestTracker, TrackedIo};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub reloader: Arc<Reloader>,
    pub client: Client<HttpConnector, Body>,
    pub request_ids: Arc<dyn RequestIdProvider>,
    pub in_flight: RequestTracker,
}

/// HTTP server for the A/B router.
///
/// Admin paths and connection deadlines are taken from the configuration
/// the server was built with and stay fixed for the process lifetime.
pub struct HttpServer {
    router: Router,
    connections: Builder<TokioExecutor>,
    idle: Duration,
    in_flight: RequestTracker,
}

impl HttpServer {
    /// Create a server that routes with whatever generation `reloader` holds.
    pub fn new(reloader: Arc<Reloader>) -> Self {
        Self::with_request_ids(reloader, Arc::new(UuidRequestIds))
    }

    /// Create a server with a custom request-ID source.
    pub fn with_request_ids(
        reloader: Arc<Reloader>,
        request_ids: Arc<dyn RequestIdProvider>,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let in_flight = RequestTracker::new();

        let config = reloader.current().config.clone();
        let state = AppState {
            reloader,
            client,
            request_ids,
            in_flight: in_flight.clone(),
        };

        Self {
            router: Self::build_router(&config, state),
            connections: connection_builder(&config.timeouts),
            idle: Duration::from_secs(config.timeouts.idle_secs),
            in_flight,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The write timeout only wraps the admin routes. Proxied requests carry
    /// their own deadline so a slow backend still gets a tagged 503.
    #[allow(deprecated)]
    fn build_router(config: &RouterConfig, state: AppState) -> Router {
        let options = &config.options;
        admin_router(&options.reload_path, &options.health_path)
            .route_layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.write_secs,
            )))
            .fallback(proxy_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CatchPanicLayer::new()),
            )
    }

    /// Tracker of requests currently being proxied.
    pub fn in_flight(&self) -> RequestTracker {
        self.in_flight.clone()
    }

    /// Serve until `shutdown` fires, then give in-flight requests `drain`
    /// to finish before dropping whatever is left.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
        drain: Duration,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, idle = ?self.idle, "HTTP server starting");

        let mut connections = JoinSet::new();
        let reason = loop {
            tokio::select! {
                reason = shutdown.recv() => break reason,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            self.router.clone(),
                            self.connections.clone(),
                            self.idle,
                            shutdown.clone(),
                        ));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
                Some(_) = connections.join_next() => {}
            }
        };
        drop(listener);

        tracing::info!(
            reason = ?reason,
            in_flight = self.in_flight.active_count(),
            connections = connections.len(),
            deadline = ?drain,
            "Draining connections"
        );
        let in_flight = self.in_flight.clone();
        let drained = tokio::time::timeout(drain, async {
            in_flight.wait_idle().await;
            tracing::debug!("In-flight requests finished");
            while connections.join_next().await.is_some() {}
        })
        .await;

        match drained {
            Ok(()) => tracing::info!("HTTP server stopped"),
            Err(_) => {
                tracing::warn!(
                    abandoned = self.in_flight.active_count(),
                    connections = connections.len(),
                    "Drain deadline expired, closing remaining connections"
                );
                connections.abort_all();
            }
        }
        Ok(())
    }
}

/// Per-connection protocol settings: HTTP/1 header reads must finish within
/// `read_secs`, and HTTP/1 or HTTP/2 is picked by the client preface.
fn connection_builder(timeouts: &TimeoutConfig) -> Builder<TokioExecutor> {
    let mut builder = Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(Duration::from_secs(timeouts.read_secs))
        .keep_alive(true);
    builder
}

/// Serve one connection until the client leaves, it sits idle for `idle`,
/// or shutdown begins. Idle and shutdown close it after the current
/// response.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    builder: Builder<TokioExecutor>,
    idle: Duration,
    mut shutdown: ShutdownSignal,
) {
    let activity = Activity::new();
    let io = TokioIo::new(TrackedIo::new(stream, activity.clone()));
    let conn = builder.serve_connection(io, TowerToHyperService::new(router));
    tokio::pin!(conn);

    let mut closing = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(peer = %peer, error = %e, "Connection ended with error");
                }
                return;
            }
            () = activity.idle(idle), if !closing => {
                tracing::debug!(peer = %peer, "Closing idle connection");
                conn.as_mut().graceful_shutdown();
                closing = true;
            }
            _ = shutdown.recv(), if !closing => {
                conn.as_mut().graceful_shutdown();
                closing = true;
            }
        }
    }
}
