//! Top-level owner of all Services (Component D).
use std::{path::Path, thread, time::Duration};

use tracing::{info, warn};

use crate::{
    config,
    error::SupervisorError,
    service::Service,
    signals::SignalWatch,
};

const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_millis(100);

/// Owns an ordered set of Services, the installed signal handlers, and
/// the watchdog loop.
pub struct Supervisor {
    services: Vec<Service>,
    watchdog_interval: Duration,
    signals: SignalWatch,
}

impl Supervisor {
    /// Parses `path` via Component A, then instantiates one Service per
    /// key under the top-level `service` section, in insertion order.
    pub fn from_config_path(path: &Path) -> Result<Self, SupervisorError> {
        let root = config::load_file(path).map_err(SupervisorError::Config)?;
        let service_configs = config::build_services(&root).map_err(SupervisorError::Config)?;

        let services = service_configs
            .into_iter()
            .map(|(name, cfg)| Service::new(name, &cfg, false))
            .collect();

        let signals = SignalWatch::install().map_err(SupervisorError::SignalSetup)?;

        Ok(Self {
            services,
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            signals,
        })
    }

    /// Starts every Service, then drives the watchdog loop until a
    /// shutdown signal arrives. Returns once every Service has stopped.
    pub fn run(&mut self) -> Result<(), SupervisorError> {
        for service in &mut self.services {
            service.start();
        }

        loop {
            let events = self.signals.poll();

            if events.reload {
                // Reload is a recognized but unimplemented extension point:
                // log and keep running rather than propagate an error.
                warn!("reload requested (SIGHUP) but reload is not implemented");
            }

            if events.shutdown {
                info!("shutdown signal received, stopping services");
                break;
            }

            for service in &mut self.services {
                service.watch_processes();
            }

            thread::sleep(self.watchdog_interval);
        }

        self.stop()
    }

    /// Concurrently invokes every Service's `stop()`-equivalent and waits
    /// for completion. Idempotent: calling it with no running services is
    /// a no-op. Every Service is stopped regardless of whether an earlier
    /// one in the list ran into trouble.
    pub fn stop(&mut self) -> Result<(), SupervisorError> {
        for service in &mut self.services {
            service.stop();
        }
        info!("all services stopped");
        Ok(())
    }
}
