//! Entry point: parse the CLI, init logging, run the supervisor.
use std::process::ExitCode;

use bakufu::{cli::Cli, supervisor::Supervisor};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::new(cli.loglevel.as_level_filter().to_string());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(config_path) = &cli.config else {
        // Missing config with no --version: print the usage line, not the
        // full help text.
        println!("{}", Cli::command().render_usage());
        return ExitCode::SUCCESS;
    };

    init_logging(&cli);

    let mut supervisor = match Supervisor::from_config_path(config_path) {
        Ok(supervisor) => supervisor,
        Err(source) => {
            tracing::error!(%source, "failed to start supervisor");
            return ExitCode::FAILURE;
        }
    };

    match supervisor.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(source) => {
            tracing::error!(%source, "supervisor exited with an error");
            ExitCode::FAILURE
        }
    }
}
