//! A small process supervisor for Unix services.

#![warn(unused_crate_dependencies)]
#[cfg(test)]
use assert_cmd as _;
#[cfg(test)]
use predicates as _;
#[cfg(test)]
use tempfile as _;

/// CLI parsing.
pub mod cli;

/// Config lexer, parser, and service extraction.
pub mod config;

/// Errors.
pub mod error;

/// One managed child process.
pub mod process;

/// A named replication group of processes.
pub mod service;

/// Global signal-handler installation.
pub mod signals;

/// Top-level owner of all services.
pub mod supervisor;
