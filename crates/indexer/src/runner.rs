//! Drives one indexing run through its phases: project setup, parallel
//! parsing, declaration collection over every file, reference resolution
//! over every file, finalization. Declaration collection must finish
//! across all files before resolution starts so a reference in one file
//! can target a declaration in another.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::analysis::{
    ResolutionPolicy, SymbolTable, collect_declarations, collect_references,
};
use crate::emit::{IndexSink, LsifEmitter, ScipEmitter};
use crate::parsing::{ParsedFile, ProcessingResult, process_file};
use crate::project::{self, DEFAULT_INCLUDE};
use crate::stats::{RunStats, format_stats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Lsif,
    Scip,
}

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub root: PathBuf,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub include: String,
    pub excludes: Vec<String>,
    pub force: bool,
    pub policy: ResolutionPolicy,
}

impl IndexConfig {
    pub fn new(root: PathBuf, output: PathBuf) -> Self {
        Self {
            root,
            output,
            format: OutputFormat::default(),
            include: DEFAULT_INCLUDE.to_string(),
            excludes: Vec::new(),
            force: false,
            policy: ResolutionPolicy::default(),
        }
    }
}

/// Phases are entered in order and never re-entered; a failed file is
/// skipped with a warning rather than restarting its phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ProjectInitialized,
    CollectingDeclarations,
    ResolvingReferences,
    Finalizing,
    Done,
}

pub struct IndexRunner {
    config: IndexConfig,
    phase: Phase,
    table: SymbolTable,
}

impl IndexRunner {
    pub fn new(config: IndexConfig) -> Self {
        let table = SymbolTable::new(config.policy);
        Self {
            config,
            phase: Phase::Idle,
            table,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn run(&mut self) -> Result<RunStats> {
        self.table.reset();
        self.phase = Phase::Idle;
        let started = Instant::now();

        project::check_output_path(&self.config.output, self.config.force)?;
        let root = self
            .config
            .root
            .canonicalize()
            .with_context(|| format!("resolving root {}", self.config.root.display()))?;
        let files = project::discover_files(&root, &self.config.include, &self.config.excludes)?;
        info!("discovered {} files under {}", files.len(), root.display());

        let output = File::create(&self.config.output)
            .with_context(|| format!("creating output {}", self.config.output.display()))?;
        let writer = BufWriter::new(output);
        let mut sink: Box<dyn IndexSink> = match self.config.format {
            OutputFormat::Lsif => Box::new(LsifEmitter::new(writer)),
            OutputFormat::Scip => Box::new(ScipEmitter::new(writer)),
        };
        self.phase = Phase::ProjectInitialized;
        sink.begin(&root)?;

        // Parsing is per-file independent; results come back in the
        // stable discovery order so emission stays deterministic.
        let processed: Vec<ProcessingResult> = files
            .par_iter()
            .map(|path| process_file(&root, path))
            .collect();

        let mut stats = RunStats::default();
        let mut parsed_files: Vec<ParsedFile> = Vec::with_capacity(processed.len());
        for result in processed {
            match result {
                ProcessingResult::Parsed(parsed) => parsed_files.push(*parsed),
                ProcessingResult::Skipped(skipped) => {
                    warn!("skipped {}: {}", skipped.relative_path, skipped.reason);
                    stats.files_skipped += 1;
                }
                ProcessingResult::Errored(errored) => {
                    warn!("failed {}: {}", errored.relative_path, errored.error_message);
                    stats.files_errored += 1;
                }
            }
        }

        self.phase = Phase::CollectingDeclarations;
        for file in &parsed_files {
            sink.document(&file.relative_path)?;
            let collected = collect_declarations(file);
            debug!(
                "collected {} declarations from {}",
                collected.declarations.len(),
                file.relative_path
            );
            for declaration in collected.declarations {
                sink.declaration(&declaration)?;
                self.table.add_declaration(declaration);
            }
            for edge in collected.ancestors {
                self.table.add_ancestor(edge);
            }
            stats.files_indexed += 1;
        }
        sink.seal_declarations(&self.table)?;

        self.phase = Phase::ResolvingReferences;
        for file in &parsed_files {
            let resolved = collect_references(file, &self.table);
            stats.resolution_misses += resolved.misses;
            for reference in resolved.references {
                // Speculative targets are table-only; the sink skips
                // anything without a declaration.
                sink.reference(&reference)?;
                self.table.add_reference(reference);
            }
        }

        self.phase = Phase::Finalizing;
        sink.finish(&self.table)?;
        self.phase = Phase::Done;

        stats.declarations = self.table.declaration_count();
        stats.references = self.table.reference_count();
        stats.duration = started.elapsed();
        info!("{}", format_stats(&stats));
        Ok(stats)
    }
}
