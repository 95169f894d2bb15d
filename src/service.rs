//! A named replication group of identical Processes (Component C).
use std::collections::HashMap;

use nix::sys::signal::Signal;
use tracing::{info, warn};

use crate::{config::ServiceConfig, process::Process};

/// A named group of identical worker processes.
pub struct Service {
    name: String,
    command: String,
    num_processes: u32,
    stop_signal: Signal,
    use_sockets: bool,

    /// Source of truth for membership: every entry's key equals the pid
    /// of its mapped Process while that Process is attached.
    processes: HashMap<u32, Process>,

    /// Set for the duration of `stop()`; gates the watchdog from driving
    /// a Process back toward `running` while a shutdown is in flight.
    shutting_down: bool,
}

impl Service {
    pub fn new(name: String, config: &ServiceConfig, use_sockets: bool) -> Self {
        Self {
            name,
            command: config.command.clone(),
            num_processes: config.num_processes,
            stop_signal: config.stop_signal,
            use_sockets,
            processes: HashMap::new(),
            shutting_down: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Number of processes currently indexed by pid.
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Current pid-map keys. Mirrors the Service invariant that every key
    /// equals the pid of its mapped Process while attached.
    pub fn pids(&self) -> Vec<u32> {
        self.processes.keys().copied().collect()
    }

    fn new_process(&self) -> Process {
        Process::new(
            self.command.clone(),
            self.stop_signal,
            crate::process::DEFAULT_MAX_RETRY,
            self.use_sockets,
        )
    }

    /// Spawns `num_processes` Processes and indexes each by its pid. A
    /// single replica's spawn failure is absorbed locally (it drives its
    /// own backoff/fatal transition); it never aborts the remaining
    /// replicas.
    pub fn start(&mut self) {
        self.shutting_down = false;
        for _ in 0..self.num_processes {
            let mut process = self.new_process();
            if let Err(source) = process.spawn() {
                warn!(service = %self.name, %source, "spawn attempt failed");
            }

            let key = process.pid().unwrap_or_else(|| self.next_synthetic_key());
            self.processes.insert(key, process);
        }
        info!(service = %self.name, count = self.processes.len(), "started service");
    }

    fn next_synthetic_key(&self) -> u32 {
        // Pids are always > 0; 0-based synthetic keys never collide with a
        // real pid and are rekeyed away the moment the process spawns.
        let mut key = 0;
        while self.processes.contains_key(&key) {
            key += 1;
        }
        key
    }

    /// Signals every Process, then reaps them all; completes when every
    /// child has exited. Idempotent. A single process's kill/reap failure
    /// (e.g. a pid-reuse race) is logged and never stops the rest of
    /// shutdown from completing.
    pub fn stop(&mut self) {
        self.shutting_down = true;

        for process in self.processes.values_mut() {
            if let Err(source) = process.kill() {
                warn!(service = %self.name, %source, "kill attempt failed");
            }
        }
        for process in self.processes.values_mut() {
            if let Err(source) = process.reap() {
                warn!(service = %self.name, %source, "reap attempt failed");
            }
        }
        self.processes.clear();

        info!(service = %self.name, "stopped service");
        self.shutting_down = false;
    }

    /// Asks every member Process for its health; respawns replacements for
    /// any that report unhealthy, rekeying the map to the new pid.
    pub fn watch_processes(&mut self) {
        if self.shutting_down {
            return;
        }

        let dead_keys: Vec<u32> = self
            .processes
            .iter_mut()
            .filter_map(|(key, process)| (!process.watch()).then_some(*key))
            .collect();

        for key in dead_keys {
            let Some(mut process) = self.processes.remove(&key) else {
                continue;
            };

            if let Err(source) = process.spawn() {
                warn!(service = %self.name, %source, "respawn attempt failed");
            }

            let new_key = process.pid().unwrap_or_else(|| self.next_synthetic_key());
            info!(service = %self.name, old_pid = key, new_pid = new_key, "respawned process");
            self.processes.insert(new_key, process);
        }
    }
}
