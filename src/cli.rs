//! Command-line interface (§6).
use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use tracing::level_filters::LevelFilter;

/// The five severities §7's error taxonomy maps onto `tracing` levels.
/// `critical` has no distinct `tracing` level, so it collapses onto
/// `ERROR` along with `error` itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    pub fn as_level_filter(&self) -> LevelFilter {
        self.0
    }
}

impl Default for LogLevelArg {
    fn default() -> Self {
        LogLevelArg(LevelFilter::WARN)
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let level = match value.to_ascii_lowercase().as_str() {
            "critical" | "error" => LevelFilter::ERROR,
            "warning" | "warn" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "debug" => LevelFilter::DEBUG,
            other => {
                return Err(format!(
                    "unknown log level '{other}' (expected critical|error|warning|info|debug)"
                ));
            }
        };
        Ok(LogLevelArg(level))
    }
}

/// `bakufud [--version] [--loglevel LEVEL] [CONFIG]`
#[derive(Parser, Debug)]
#[command(name = "bakufud", version, author)]
#[command(about = "A small process supervisor", long_about = None)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Minimum log severity to emit.
    #[arg(long, value_name = "LEVEL", default_value = "warning")]
    pub loglevel: LogLevelArg,
}
