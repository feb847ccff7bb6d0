pub mod analysis;
pub mod check;
pub mod emit;
pub mod parsing;
pub mod project;
pub mod runner;
pub mod stats;


pub use check::{ValidationResult, check_index};
pub use runner::{IndexConfig, IndexRunner, OutputFormat, Phase};
pub use stats::RunStats;
