//! Thin wrapper over the tree-sitter Ruby grammar. The rest of the
//! crate consumes parsed trees as a capability: typed nodes, source
//! ranges, and field accessors; nothing here knows about symbols.

use std::fs;
use std::path::{Path, PathBuf};

use tree_sitter::{Node, Parser, Tree};

/// Files larger than this are skipped rather than parsed.
pub const MAX_FILE_SIZE: u64 = 5_000_000;

pub struct RubyParser {
    parser: Parser,
}

impl Default for RubyParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RubyParser {
    pub fn new() -> Self {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_ruby::LANGUAGE.into())
            .expect("Ruby grammar should always load");
        Self { parser }
    }

    pub fn parse(&mut self, source: &str) -> Option<Tree> {
        self.parser.parse(source, None)
    }
}

/// One successfully parsed source file, retained for both passes.
pub struct ParsedFile {
    pub path: PathBuf,
    /// Path relative to the indexing root, forward-slashed.
    pub relative_path: String,
    pub source: String,
    pub tree: Tree,
}

/// A file set aside without being parsed (too large, unreadable, ...).
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub relative_path: String,
    pub reason: String,
}

/// A file that failed during read or parse.
#[derive(Debug, Clone)]
pub struct ErroredFile {
    pub relative_path: String,
    pub error_message: String,
}

/// Per-file triage result; skips and errors are recoverable and leave
/// the rest of the run untouched.
pub enum ProcessingResult {
    Parsed(Box<ParsedFile>),
    Skipped(SkippedFile),
    Errored(ErroredFile),
}

impl ProcessingResult {
    pub fn relative_path(&self) -> &str {
        match self {
            ProcessingResult::Parsed(parsed) => &parsed.relative_path,
            ProcessingResult::Skipped(skipped) => &skipped.relative_path,
            ProcessingResult::Errored(errored) => &errored.relative_path,
        }
    }
}

/// Read and parse one file. Never returns an error: failures are
/// demoted to `Skipped`/`Errored` so a single bad file cannot abort the
/// run.
pub fn process_file(root: &Path, path: &Path) -> ProcessingResult {
    let relative_path = relative_to_root(root, path);

    match fs::metadata(path) {
        Ok(metadata) if metadata.len() > MAX_FILE_SIZE => {
            return ProcessingResult::Skipped(SkippedFile {
                relative_path,
                reason: format!("file exceeds {MAX_FILE_SIZE} bytes"),
            });
        }
        Ok(_) => {}
        Err(err) => {
            return ProcessingResult::Errored(ErroredFile {
                relative_path,
                error_message: format!("failed to stat file: {err}"),
            });
        }
    }

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            return ProcessingResult::Errored(ErroredFile {
                relative_path,
                error_message: format!("failed to read file: {err}"),
            });
        }
    };

    let mut parser = RubyParser::new();
    match parser.parse(&source) {
        Some(tree) => ProcessingResult::Parsed(Box::new(ParsedFile {
            path: path.to_path_buf(),
            relative_path,
            source,
            tree,
        })),
        None => ProcessingResult::Errored(ErroredFile {
            relative_path,
            error_message: "parser produced no tree".to_string(),
        }),
    }
}

pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn relative_to_root(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .iter()
        .filter_map(|c| c.to_str())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_ruby() {
        let mut parser = RubyParser::new();
        let tree = parser.parse("class Foo; end").unwrap();
        assert_eq!(tree.root_node().kind(), "program");
    }

    #[test]
    fn broken_source_still_yields_a_tree() {
        // tree-sitter recovers from syntax errors with ERROR nodes.
        let mut parser = RubyParser::new();
        let tree = parser.parse("def broken(\n  end").unwrap();
        assert!(tree.root_node().has_error());
    }

    #[test]
    fn missing_file_is_errored_not_fatal() {
        let result = process_file(Path::new("/tmp"), Path::new("/tmp/does-not-exist-xyz.rb"));
        assert!(matches!(result, ProcessingResult::Errored(_)));
    }
}
