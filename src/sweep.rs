//! Periodic expiry sweeping
//!
//! Stores already drop lapsed entries when they are touched; the sweeper
//! removes the ones nobody touches again.

use crate::handoff::HandoffService;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

/// Shortest interval the sweeper will run at
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Sweep interval for the given TTLs: a fifth of the shorter one, at least
/// [`MIN_SWEEP_INTERVAL`]
pub fn sweep_interval(pending_ttl: Duration, session_ttl: Duration) -> Duration {
    (pending_ttl.min(session_ttl) / 5).max(MIN_SWEEP_INTERVAL)
}

/// Owns the background sweep task; aborts it when dropped
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop sweeping now
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a task that sweeps `service` every `every`
pub fn spawn_sweeper(service: Arc<HandoffService>, every: Duration) -> SweeperHandle {
    let task = tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let (logins, sessions) = service.sweep();
            if logins + sessions > 0 {
                debug!(logins, sessions, "Expiry sweep");
            }
        }
    });
    SweeperHandle { task }
}
