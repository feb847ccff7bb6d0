//! Project setup: root validation, output-path conflict handling, and
//! source file discovery. Everything here fails fatally; once indexing
//! has started, file problems are demoted to per-file warnings instead.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_INCLUDE: &str = "**/*.rb";

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("not a directory: {0}")]
    InvalidRoot(PathBuf),
    #[error("output path already exists: {0} (use --force to overwrite)")]
    OutputExists(PathBuf),
    #[error("no files matched `{include}` under {root}")]
    NoFilesMatched { root: PathBuf, include: String },
    #[error("invalid glob pattern")]
    Pattern(#[from] ignore::Error),
}

/// Fatal unless the target is absent or overwriting was requested.
pub fn check_output_path(path: &Path, force: bool) -> Result<(), SetupError> {
    if path.exists() && !force {
        return Err(SetupError::OutputExists(path.to_path_buf()));
    }
    Ok(())
}

/// Enumerate source files under `root` matching the include glob minus
/// the exclude patterns. The result is sorted so every run processes
/// files in the same order.
pub fn discover_files(
    root: &Path,
    include: &str,
    excludes: &[String],
) -> Result<Vec<PathBuf>, SetupError> {
    if !root.is_dir() {
        return Err(SetupError::InvalidRoot(root.to_path_buf()));
    }

    let mut overrides = OverrideBuilder::new(root);
    overrides.add(include)?;
    for pattern in excludes {
        overrides.add(&format!("!{pattern}"))?;
    }
    let overrides = overrides.build()?;

    let walker = WalkBuilder::new(root)
        .follow_links(false)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .overrides(overrides)
        .build();

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_some_and(|ft| ft.is_file()) {
                    files.push(entry.into_path());
                }
            }
            Err(error) => warn!("skipping unreadable entry: {error}"),
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(SetupError::NoFilesMatched {
            root: root.to_path_buf(),
            include: include.to_string(),
        });
    }
    Ok(files)
}
