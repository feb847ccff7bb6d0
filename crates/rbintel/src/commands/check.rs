use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use indexer::check::check_index;
use tracing::{error, info, warn};

pub fn run(index: &Path, strict: bool) -> Result<ExitCode> {
    let result = check_index(index)?;

    for finding in &result.errors {
        error!("{finding}");
    }
    for finding in &result.warnings {
        warn!("{finding}");
    }
    info!(
        "{} records: {} vertices, {} edges, {} documents, {} ranges",
        result.stats.records,
        result.stats.vertices,
        result.stats.edges,
        result.stats.documents,
        result.stats.ranges,
    );
    info!(
        "{} errors, {} warnings",
        result.errors.len(),
        result.warnings.len()
    );

    let failed = !result.is_valid() || (strict && !result.warnings.is_empty());
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
