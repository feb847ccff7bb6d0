mod cli;
mod commands;

use std::process::ExitCode;

use crate::cli::{Commands, RbintelCli};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = RbintelCli::parse_args();

    let result = match cli.command {
        Commands::Index {
            root,
            output,
            format,
            include,
            excludes,
            force,
            speculate,
            verbose,
        } => {
            init_logging(verbose);
            commands::index::run(root, output, format, include, excludes, force, speculate)
        }
        Commands::Check {
            index,
            strict,
            verbose,
        } => {
            init_logging(verbose);
            commands::check::run(&index, strict)
        }
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            tracing::error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}
