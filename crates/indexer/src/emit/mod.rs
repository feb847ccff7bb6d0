//! Output back ends. The runner drives one [`IndexSink`] through a fixed
//! call order: `begin`, one `document` per file, every `declaration`,
//! `seal_declarations` once the table is complete, every `reference`,
//! then `finish`. Both emitters allocate record IDs from one counter and
//! never rewrite anything already flushed.

pub mod lsif;
pub mod scip;

use std::path::Path;

use anyhow::Result;

use crate::analysis::{Declaration, Reference, SymbolTable};

pub use lsif::LsifEmitter;
pub use scip::ScipEmitter;

pub trait IndexSink {
    /// Emit run-level metadata before any file is processed.
    fn begin(&mut self, project_root: &Path) -> Result<()>;

    /// Register one source file. Called once per file, in the runner's
    /// stable file order, before any of its declarations.
    fn document(&mut self, relative_path: &str) -> Result<()>;

    /// Emit one physical declaration of a possibly reopened entity.
    fn declaration(&mut self, declaration: &Declaration) -> Result<()>;

    /// Close out the declaration phase: definition containers and hover
    /// payloads need the completed table to pick primary definitions.
    fn seal_declarations(&mut self, table: &SymbolTable) -> Result<()>;

    /// Emit one resolved reference occurrence.
    fn reference(&mut self, reference: &Reference) -> Result<()>;

    /// Aggregate reference results, containment, and flush.
    fn finish(&mut self, table: &SymbolTable) -> Result<()>;
}

/// Absolute `file://` URI with backslashes normalized away.
pub(crate) fn file_uri(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    if raw.starts_with('/') {
        format!("file://{raw}")
    } else {
        format!("file:///{raw}")
    }
}
