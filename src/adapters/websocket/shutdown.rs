//! Gateway shutdown phases, broadcast to every session task.

use tokio::sync::watch;

/// Where the gateway is in its shutdown sequence.
///
/// Phases only move forward: `Running → Draining → ForceClose`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownPhase {
    /// Accepting upgrades and traffic.
    #[default]
    Running,
    /// Relays stopped, readers stopped, writers flushing their queues.
    Draining,
    /// Grace period over; remaining session tasks are aborted.
    ForceClose,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ShutdownPhase::Running => "running",
            ShutdownPhase::Draining => "draining",
            ShutdownPhase::ForceClose => "force_close",
        };
        write!(f, "{}", s)
    }
}

/// Resolves once the phase reaches `target`.
///
/// Never resolves if the sending side is gone without getting there.
pub async fn reached(phase: &mut watch::Receiver<ShutdownPhase>, target: ShutdownPhase) {
    if phase.wait_for(|current| *current >= target).await.is_err() {
        std::future::pending::<()>().await;
    }
}
