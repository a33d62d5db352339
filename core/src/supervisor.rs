//! Top-level process state machine.
//!
//! `INIT -> AUTHENTICATING -> CONNECTING -> READY -> DRAINING -> STOPPED`.
//! `main` drives the forward transitions as each subsystem comes up;
//! `Supervisor::run_until_shutdown` owns the signal handler and the
//! backward transition into `DRAINING` once a shutdown is requested.

use crate::metrics::Counters;
use crate::shutdown::Shutdown;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Init,
    Authenticating,
    Connecting,
    Ready,
    Draining,
    Stopped,
}

/// Owns the shutdown broadcast channel every long-running task
/// subscribes to, and the counters they report progress through.
pub struct Supervisor {
    state: SupervisorState,
    shutdown_tx: broadcast::Sender<Shutdown>,
    pub counters: Arc<Counters>,
    drain_timeout: Duration,
}

impl Supervisor {
    pub fn new(drain_timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            state: SupervisorState::Init,
            shutdown_tx,
            counters: Arc::new(Counters::default()),
            drain_timeout,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn transition(&mut self, next: SupervisorState) {
        info!(from = ?self.state, to = ?next, "supervisor state transition");
        self.state = next;
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<Shutdown> {
        self.shutdown_tx.subscribe()
    }

    /// Races `work` (typically the stream consumer's task handle) against
    /// an OS interrupt/terminate signal.
    ///
    /// If `work` finishes first — an unrecoverable condition such as the
    /// consumer exhausting its reconnect attempts — this returns
    /// `Some(output)` immediately so the caller can inspect it and exit
    /// non-zero, without waiting for a signal that may never come. If the
    /// signal arrives first, this transitions to `DRAINING`, broadcasts
    /// [`Shutdown`] to every subscriber, and waits up to `drain_timeout`
    /// for `work` to also finish, returning `Some(output)` if it drained
    /// in time or `None` if the timeout elapsed. Either way the state
    /// ends at `STOPPED`.
    pub async fn run_until_shutdown<F, T>(&mut self, work: F) -> Option<T>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::pin!(work);

        tokio::select! {
            output = &mut work => {
                warn!("supervised task finished before a shutdown was requested");
                self.transition(SupervisorState::Draining);
                let _ = self.shutdown_tx.send(Shutdown);
                self.transition(SupervisorState::Stopped);
                return Some(output);
            }
            _ = wait_for_os_signal() => {}
        }

        self.transition(SupervisorState::Draining);
        let _ = self.shutdown_tx.send(Shutdown);

        let outcome = match tokio::time::timeout(self.drain_timeout, &mut work).await {
            Ok(output) => {
                info!("all subsystems drained cleanly");
                Some(output)
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.drain_timeout.as_secs(),
                    "drain timeout elapsed, forcing shutdown"
                );
                None
            }
        };
        self.transition(SupervisorState::Stopped);
        outcome
    }
}

#[cfg(unix)]
async fn wait_for_os_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_os_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received ctrl-c");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transition_updates_state() {
        let mut sup = Supervisor::new(Duration::from_secs(1));
        assert_eq!(sup.state(), SupervisorState::Init);
        sup.transition(SupervisorState::Authenticating);
        assert_eq!(sup.state(), SupervisorState::Authenticating);
    }

    #[tokio::test]
    async fn shutdown_broadcast_reaches_subscribers() {
        let sup = Supervisor::new(Duration::from_millis(50));
        let mut rx = sup.subscribe_shutdown();
        sup.shutdown_tx.send(Shutdown).unwrap();
        assert_eq!(rx.recv().await.unwrap(), Shutdown);
    }
}
