//! Error types for the supervisor.
use thiserror::Error;

/// Errors raised while lexing or parsing a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read from disk.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration text is malformed.
    #[error("{0}")]
    Parse(String),

    /// The top-level `service` section is missing or malformed.
    #[error("configuration has no usable 'service' section")]
    MissingServiceSection,

    /// A service section is missing its required `command` key.
    #[error("service '{0}' has no 'command'")]
    MissingCommand(String),

    /// A service section declares a `num_processes` below 1.
    #[error("service '{service}' has invalid num_processes: {value}")]
    InvalidNumProcesses {
        /// The offending service.
        service: String,
        /// The value found in the config.
        value: String,
    },

    /// A `stop_signal` name doesn't resolve to a known Unix signal.
    #[error("service '{service}' has unknown stop_signal '{signal}'")]
    UnknownSignal {
        /// The offending service.
        service: String,
        /// The unrecognized signal name.
        signal: String,
    },
}

/// Errors local to a single managed process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The OS refused to spawn the child.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// The shell command that failed to launch.
        command: String,
        /// Underlying I/O error from the OS.
        #[source]
        source: std::io::Error,
    },

    /// Sending the stop signal to the child failed for a reason other
    /// than the child already being gone.
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        /// PID the signal was addressed to.
        pid: i32,
        /// Underlying errno.
        #[source]
        source: nix::errno::Errno,
    },

    /// `waitpid` failed for a reason other than EINTR/ECHILD.
    #[error("failed to reap pid {pid}: {source}")]
    Wait {
        /// PID that failed to reap.
        pid: i32,
        /// Underlying errno.
        #[source]
        source: nix::errno::Errno,
    },
}

/// Top-level supervisor errors.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Failure loading or parsing the configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failure installing the global signal handlers.
    #[error("failed to install signal handlers: {0}")]
    SignalSetup(#[source] std::io::Error),
}
