use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use indexer::analysis::ResolutionPolicy;
use indexer::runner::{IndexConfig, IndexRunner, OutputFormat};
use tracing::info;

use crate::cli::Format;

#[allow(clippy::too_many_arguments)]
pub fn run(
    root: PathBuf,
    output: PathBuf,
    format: Format,
    include: String,
    excludes: Vec<String>,
    force: bool,
    speculate: bool,
) -> Result<ExitCode> {
    let config = IndexConfig {
        root,
        output: output.clone(),
        format: match format {
            Format::Lsif => OutputFormat::Lsif,
            Format::Scip => OutputFormat::Scip,
        },
        include,
        excludes,
        force,
        policy: ResolutionPolicy {
            speculate_unresolved_constants: speculate,
        },
    };

    let mut runner = IndexRunner::new(config);
    runner.run()?;
    info!("index written to {}", output.display());
    Ok(ExitCode::SUCCESS)
}
