//! Spawns registered services and stops them in order.

use super::Service;
use crate::state::{ServiceStatus, ServiceStatusRegistry};
use crate::utils::fmt_duration;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

struct RunningService {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Reported when a service's task finishes, for whatever reason.
type ExitReport = (&'static str, anyhow::Result<()>);

pub struct ServiceManager {
    registered: Vec<Box<dyn Service>>,
    running: Vec<RunningService>,
    statuses: ServiceStatusRegistry,
    exit_tx: mpsc::UnboundedSender<ExitReport>,
    exit_rx: mpsc::UnboundedReceiver<ExitReport>,
}

impl ServiceManager {
    pub fn new(statuses: ServiceStatusRegistry) -> Self {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        Self {
            registered: Vec::new(),
            running: Vec::new(),
            statuses,
            exit_tx,
            exit_rx,
        }
    }

    /// Register a service. Services are shut down in registration order.
    pub fn register_service(&mut self, service: Box<dyn Service>) {
        self.statuses.set(service.name(), ServiceStatus::Starting);
        self.registered.push(service);
    }

    pub fn has_services(&self) -> bool {
        !self.registered.is_empty() || !self.running.is_empty()
    }

    /// Spawn every registered service on its own task.
    pub fn spawn_all(&mut self) {
        for service in self.registered.drain(..) {
            let name = service.name();
            let cancel = CancellationToken::new();
            let statuses = self.statuses.clone();
            let exit_tx = self.exit_tx.clone();
            let token = cancel.clone();

            let handle = tokio::spawn(async move {
                statuses.set(name, ServiceStatus::Active);
                let result = service.run(token).await;
                statuses.set(
                    name,
                    if result.is_ok() {
                        ServiceStatus::Stopped
                    } else {
                        ServiceStatus::Error
                    },
                );
                // Receiver is gone only once the manager itself is dropped.
                let _ = exit_tx.send((name, result));
            });

            debug!(service = name, "service spawned");
            self.running.push(RunningService {
                name,
                cancel,
                handle,
            });
        }
        info!(count = self.running.len(), "services started");
    }

    /// Wait until any running service exits without being asked to.
    pub async fn wait_for_exit(&mut self) -> ExitReport {
        match self.exit_rx.recv().await {
            Some(report) => report,
            // Unreachable while `self` holds a sender; treat as a quiet exit.
            None => ("unknown", Ok(())),
        }
    }

    /// Cancel each service in registration order, waiting for it to finish
    /// before moving on. All services share one `timeout` budget; services
    /// still running when it expires are aborted and returned by name.
    pub async fn shutdown(&mut self, timeout: Duration) -> Result<Duration, Vec<&'static str>> {
        let start = Instant::now();
        let deadline = start + timeout;
        let mut services = std::mem::take(&mut self.running).into_iter();

        while let Some(mut service) = services.next() {
            service.cancel.cancel();
            match time::timeout_at(deadline, &mut service.handle).await {
                Ok(Ok(())) => {
                    debug!(service = service.name, "service stopped");
                    // Reports from services we asked to stop aren't unexpected exits.
                    while let Ok((name, result)) = self.exit_rx.try_recv() {
                        if let Err(e) = result {
                            warn!(service = name, error = ?e, "service reported an error while stopping");
                        }
                    }
                }
                Ok(Err(e)) => {
                    error!(service = service.name, error = ?e, "service task panicked");
                }
                Err(_) => {
                    service.handle.abort();
                    let mut pending = vec![service.name];
                    for rest in services.by_ref() {
                        rest.cancel.cancel();
                        rest.handle.abort();
                        pending.push(rest.name);
                    }
                    error!(
                        timeout = fmt_duration(timeout),
                        pending = ?pending,
                        "graceful shutdown timed out"
                    );
                    return Err(pending);
                }
            }
        }

        Ok(start.elapsed())
    }
}
