//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP, SIGUSR1, SIGUSR2)
//! - Translate signals to internal control events
//! - Forward events to the control plane over a channel
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP and SIGUSR1 both reload, SIGUSR2 hands the socket to a new process
//! - Non-unix builds only understand Ctrl-C

use tokio::sync::mpsc;

/// What an operator asked the process to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Stop accepting, drain, exit.
    Stop,
    /// Re-read the configuration file.
    Reload,
    /// Start a new generation on the same socket, then drain and exit.
    Restart,
}

#[cfg(unix)]
mod imp {
    use super::ControlEvent;
    use tokio::signal::unix::{signal, Signal, SignalKind};

    pub struct Signals {
        terminate: Signal,
        interrupt: Signal,
        hangup: Signal,
        user1: Signal,
        user2: Signal,
    }

    impl Signals {
        pub fn install() -> std::io::Result<Self> {
            Ok(Self {
                terminate: signal(SignalKind::terminate())?,
                interrupt: signal(SignalKind::interrupt())?,
                hangup: signal(SignalKind::hangup())?,
                user1: signal(SignalKind::user_defined1())?,
                user2: signal(SignalKind::user_defined2())?,
            })
        }

        pub async fn recv(&mut self) -> Option<ControlEvent> {
            let (event, name) = tokio::select! {
                Some(()) = self.terminate.recv() => (ControlEvent::Stop, "SIGTERM"),
                Some(()) = self.interrupt.recv() => (ControlEvent::Stop, "SIGINT"),
                Some(()) = self.hangup.recv() => (ControlEvent::Reload, "SIGHUP"),
                Some(()) = self.user1.recv() => (ControlEvent::Reload, "SIGUSR1"),
                Some(()) = self.user2.recv() => (ControlEvent::Restart, "SIGUSR2"),
                else => return None,
            };
            tracing::info!(signal = name, event = ?event, "Signal received");
            Some(event)
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use super::ControlEvent;

    pub struct Signals;

    impl Signals {
        pub fn install() -> std::io::Result<Self> {
            Ok(Self)
        }

        pub async fn recv(&mut self) -> Option<ControlEvent> {
            tokio::signal::ctrl_c().await.ok()?;
            tracing::info!("Ctrl-C received");
            Some(ControlEvent::Stop)
        }
    }
}

pub use imp::Signals;

/// Install handlers and forward every signal as a [`ControlEvent`].
///
/// Must be called from within a Tokio runtime.
pub fn listen() -> std::io::Result<mpsc::Receiver<ControlEvent>> {
    let mut signals = Signals::install()?;
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        while let Some(event) = signals.recv().await {
            if tx.send(event).await.is_err() {
                break;
            }
        }
    });
    Ok(rx)
}
