use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rbintel",
    version,
    about = "Ruby code-intelligence indexer",
    long_about = "Builds LSIF or SCIP code-intelligence indexes from Ruby source trees."
)]
pub struct RbintelCli {
    #[command(subcommand)]
    pub command: Commands,
}

impl RbintelCli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index a Ruby source tree
    Index {
        /// Root directory to index
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Output file for the produced index
        #[arg(short, long, default_value = "index.lsif")]
        output: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Lsif)]
        format: Format,

        /// Glob selecting the files to index
        #[arg(long, default_value = "**/*.rb")]
        include: String,

        /// Glob patterns to exclude, repeatable
        #[arg(long = "exclude", value_name = "GLOB")]
        excludes: Vec<String>,

        /// Overwrite the output file if it already exists
        #[arg(short, long)]
        force: bool,

        /// Register references to constants that resolve to no declaration
        #[arg(long)]
        speculate: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// Validate the structure of a produced graph index
    Check {
        /// Index file to validate
        index: PathBuf,

        /// Treat warnings as failures
        #[arg(long)]
        strict: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// Graph-oriented newline-delimited JSON
    Lsif,
    /// Symbol-oriented document index
    Scip,
}
