//! Periodic cleanup of expired blocks, stale activity, and dead rate windows

use prahari_core::{IpBlocker, ThrottleGuard};
use std::sync::Arc;
use std::time::Duration;

/// Start the background sweep task.
///
/// Runs for the life of the process on the configured cadence; flipping the
/// shutdown channel stops it. Between ticks, expired records linger but are
/// never counted.
pub fn spawn_sweeper(
    blocker: Arc<IpBlocker>,
    throttle: ThrottleGuard,
    interval: Duration,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    blocker.sweep();
                    throttle.sweep();
                    tracing::debug!(
                        "Sweep done: {} blocked, {} tracked, {} rate window(s)",
                        blocker.blocked_count(),
                        blocker.tracked_count(),
                        throttle.window_count()
                    );
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Sweep task shutting down");
                        break;
                    }
                }
            }
        }
    })
}
