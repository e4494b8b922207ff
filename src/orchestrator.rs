use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::MonitorError;
use crate::poller::{Collaborators, PollLoop};
use crate::registry::WatcherRegistry;
use crate::types::WatchedEntityId;

/// Start/stop facade over the watcher registry and the per-form poll loops.
///
/// Constructed once at startup and shared by whatever boundary code needs to
/// start or stop monitoring. Both calls are idempotent and never wait for a
/// loop to run or exit.
pub struct Orchestrator {
    registry: Arc<WatcherRegistry>,
    deps: Collaborators,
    interval: Duration,
    tasks: TaskTracker,
}

impl Orchestrator {
    pub fn new(deps: Collaborators, interval: Duration) -> Self {
        Self {
            registry: Arc::new(WatcherRegistry::new()),
            deps,
            interval,
            tasks: TaskTracker::new(),
        }
    }

    /// Begin polling `id`. Returns `false` if it was already being monitored.
    ///
    /// Must be called from within a tokio runtime. Fails with
    /// `MonitorError::ShutDown` once `shutdown` has been called.
    pub fn start_monitoring(&self, id: &str) -> Result<bool, MonitorError> {
        let id = WatchedEntityId::parse(id)?;
        if self.tasks.is_closed() {
            return Err(MonitorError::ShutDown);
        }
        let Some(handle) = self.registry.try_register(&id) else {
            debug!("[{id}] Already monitoring");
            return Ok(false);
        };

        info!("[{id}] Started monitoring");
        let poller = PollLoop::new(
            id,
            handle,
            Arc::clone(&self.registry),
            self.deps.clone(),
            self.interval,
        );
        self.tasks.spawn(poller.run());
        Ok(true)
    }

    /// Signal the loop for `id` to stop. Returns `false` if it was not running.
    pub fn stop_monitoring(&self, id: &str) -> Result<bool, MonitorError> {
        let id = WatchedEntityId::parse(id)?;
        let stopped = self.registry.unregister(&id);
        if stopped {
            info!("[{id}] Stopped monitoring");
        } else {
            debug!("[{id}] Not monitored, nothing to stop");
        }
        Ok(stopped)
    }

    pub fn is_monitoring(&self, id: &str) -> bool {
        WatchedEntityId::parse(id)
            .map(|id| self.registry.is_active(&id))
            .unwrap_or(false)
    }

    pub fn active_ids(&self) -> Vec<WatchedEntityId> {
        self.registry.active_ids()
    }

    pub fn registry(&self) -> &WatcherRegistry {
        &self.registry
    }

    /// Cancel every loop and wait up to `grace` for them to exit.
    /// Returns `true` if all loops exited in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let active = self.registry.len();
        self.registry.cancel_all();
        self.tasks.close();
        info!("Shutting down {active} monitor(s)");
        match tokio::time::timeout(grace, self.tasks.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    "{} poll loop(s) still running after {}s",
                    self.tasks.len(),
                    grace.as_secs()
                );
                false
            }
        }
    }
}
