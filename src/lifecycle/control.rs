//! Control plane state machine.
//!
//! # Data Flow
//! ```text
//! Running ──Stop────▶ ShuttingDown ──▶ Exit::Stopped
//!    │ ▲
//!    │ └── ReloadingConfig ◀──Reload── (success or failure)
//!    │
//!    └──Restart──▶ HotRestarting ──spawned──▶ ShuttingDown ──▶ Exit::HandedOff
//!                        │
//!                        └──spawn failed──▶ Running
//! ```

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::lifecycle::reload::Reloader;
use crate::lifecycle::restart::spawn_successor;
use crate::lifecycle::shutdown::{Shutdown, ShutdownReason};
use crate::lifecycle::signals::ControlEvent;
use crate::net::inherit::ExportedListener;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    ShuttingDown,
    ReloadingConfig,
    HotRestarting,
}

/// How the control plane finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Plain graceful stop.
    Stopped,
    /// A successor process now owns the socket.
    HandedOff { successor: u32 },
}

pub struct ControlPlane {
    reloader: Arc<Reloader>,
    shutdown: Shutdown,
    exported: Option<ExportedListener>,
    state: State,
}

impl ControlPlane {
    pub fn new(
        reloader: Arc<Reloader>,
        shutdown: Shutdown,
        exported: Option<ExportedListener>,
    ) -> Self {
        tracing::info!(state = ?State::Running, "Control plane ready");
        Self {
            reloader,
            shutdown,
            exported,
            state: State::Running,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn transition(&mut self, next: State) {
        tracing::info!(from = ?self.state, to = ?next, "State transition");
        self.state = next;
    }

    /// Handle events until the process should exit.
    ///
    /// A closed event channel is treated as a stop request. The channel is
    /// only borrowed so the caller can keep listening while draining.
    pub async fn run(mut self, events: &mut mpsc::Receiver<ControlEvent>) -> Exit {
        loop {
            let event = events.recv().await.unwrap_or(ControlEvent::Stop);
            if let Some(exit) = self.handle(event).await {
                return exit;
            }
        }
    }

    /// Apply one event. Returns the exit outcome once shutdown has begun.
    pub async fn handle(&mut self, event: ControlEvent) -> Option<Exit> {
        match event {
            ControlEvent::Stop => {
                self.begin_shutdown(ShutdownReason::Stop);
                Some(Exit::Stopped)
            }
            ControlEvent::Reload => {
                self.transition(State::ReloadingConfig);
                self.reload().await;
                self.transition(State::Running);
                None
            }
            ControlEvent::Restart => {
                self.transition(State::HotRestarting);
                match spawn_successor(self.reloader.path(), self.exported.as_ref()) {
                    Ok(child) => {
                        let successor = child.id();
                        tracing::info!(pid = successor, "Successor started, handing off");
                        self.begin_shutdown(ShutdownReason::HandOff);
                        Some(Exit::HandedOff { successor })
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Hot restart failed, continuing to serve");
                        self.transition(State::Running);
                        None
                    }
                }
            }
        }
    }

    fn begin_shutdown(&mut self, reason: ShutdownReason) {
        self.transition(State::ShuttingDown);
        self.shutdown.trigger(reason);
    }

    async fn reload(&self) {
        let reloader = Arc::clone(&self.reloader);
        match tokio::task::spawn_blocking(move || reloader.reload()).await {
            Ok(Ok(generation)) => {
                tracing::info!(generation = generation.id, "Configuration reloaded");
            }
            Ok(Err(e)) => {
                tracing::error!(
                    path = %self.reloader.path().display(),
                    error = %e,
                    "Configuration reload failed, keeping previous routing table"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Configuration reload task failed");
            }
        }
    }
}

/// Wait for a further stop request, ignoring other events. Never resolves
/// once the channel has closed.
pub async fn next_stop(events: &mut mpsc::Receiver<ControlEvent>) {
    loop {
        match events.recv().await {
            Some(ControlEvent::Stop) => return,
            Some(event) => tracing::warn!(event = ?event, "Ignoring control event while draining"),
            None => std::future::pending::<()>().await,
        }
    }
}
