//! Symbol-oriented output: one Document per file carrying Occurrences
//! and SymbolInformation records, serialized as a single JSON index at
//! the end of the run.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::analysis::{Declaration, DeclarationKind, Range, Reference, SymbolTable};
use crate::emit::{IndexSink, file_uri};

const SYMBOL_SCHEME: &str = "scip-ruby";
const PACKAGE_MANAGER: &str = "gem";
const ROLE_DEFINITION: u32 = 0x1;

#[derive(Debug, Serialize)]
struct Index {
    metadata: Metadata,
    documents: Vec<Document>,
}

#[derive(Debug, Serialize)]
struct Metadata {
    version: u32,
    tool_info: ToolInfo,
    project_root: String,
    text_document_encoding: String,
}

#[derive(Debug, Serialize)]
struct ToolInfo {
    name: String,
    version: String,
}

#[derive(Debug, Serialize)]
struct Document {
    language: String,
    relative_path: String,
    occurrences: Vec<Occurrence>,
    symbols: Vec<SymbolInformation>,
}

#[derive(Debug, Serialize)]
struct Occurrence {
    /// `[startLine, startCol, endCol]`, or a 4-tuple across lines.
    range: Vec<u32>,
    symbol: String,
    #[serde(skip_serializing_if = "is_zero")]
    symbol_roles: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    syntax_kind: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct SymbolInformation {
    symbol: String,
    documentation: Vec<String>,
    kind: &'static str,
    display_name: String,
}

fn is_zero(roles: &u32) -> bool {
    *roles == 0
}

pub struct ScipEmitter<W: Write> {
    out: W,
    package: String,
    project_root: String,
    documents: Vec<Document>,
    document_index: FxHashMap<String, usize>,
    /// Qualified name -> symbol string, filled during the declaration
    /// phase and consulted for reference occurrences.
    symbols: FxHashMap<String, String>,
}

impl<W: Write> ScipEmitter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            package: String::new(),
            project_root: String::new(),
            documents: Vec::new(),
            document_index: FxHashMap::default(),
            symbols: FxHashMap::default(),
        }
    }

    fn document_mut(&mut self, relative_path: &str) -> Option<&mut Document> {
        let index = *self.document_index.get(relative_path)?;
        self.documents.get_mut(index)
    }

    fn symbol_for(&mut self, declaration: &Declaration) -> String {
        if let Some(existing) = self.symbols.get(&declaration.qualified_name) {
            return existing.clone();
        }
        let symbol = format!(
            "{SYMBOL_SCHEME} {PACKAGE_MANAGER} {} . {}",
            quote_segment(&self.package),
            descriptors(declaration),
        );
        self.symbols
            .insert(declaration.qualified_name.clone(), symbol.clone());
        symbol
    }
}

impl<W: Write> IndexSink for ScipEmitter<W> {
    fn begin(&mut self, project_root: &Path) -> Result<()> {
        self.project_root = file_uri(project_root);
        self.package = project_root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(())
    }

    fn document(&mut self, relative_path: &str) -> Result<()> {
        if self.document_index.contains_key(relative_path) {
            return Ok(());
        }
        self.document_index
            .insert(relative_path.to_string(), self.documents.len());
        self.documents.push(Document {
            language: "ruby".to_string(),
            relative_path: relative_path.to_string(),
            occurrences: Vec::new(),
            symbols: Vec::new(),
        });
        Ok(())
    }

    fn declaration(&mut self, declaration: &Declaration) -> Result<()> {
        let symbol = self.symbol_for(declaration);
        let occurrence = Occurrence {
            range: scip_range(&declaration.range),
            symbol,
            symbol_roles: ROLE_DEFINITION,
            syntax_kind: Some(syntax_kind(declaration.kind)),
        };
        if let Some(document) = self.document_mut(&declaration.file) {
            document.occurrences.push(occurrence);
        }
        Ok(())
    }

    fn seal_declarations(&mut self, table: &SymbolTable) -> Result<()> {
        // Symbol information lives in the primary declaration's document.
        let entities: Vec<String> = table.entities().map(str::to_string).collect();
        for qualified_name in entities {
            let Some(declaration) = table.primary_declaration(&qualified_name) else {
                continue;
            };
            let information = SymbolInformation {
                symbol: self.symbol_for(declaration),
                documentation: vec![declaration.hover_text()],
                kind: symbol_kind(declaration.kind),
                display_name: declaration.name.clone(),
            };
            let file = declaration.file.clone();
            if let Some(document) = self.document_mut(&file) {
                document.symbols.push(information);
            }
        }
        Ok(())
    }

    fn reference(&mut self, reference: &Reference) -> Result<()> {
        let Some(symbol) = self.symbols.get(&reference.target).cloned() else {
            return Ok(());
        };
        let occurrence = Occurrence {
            range: scip_range(&reference.range),
            symbol,
            symbol_roles: 0,
            syntax_kind: None,
        };
        if let Some(document) = self.document_mut(&reference.file) {
            document.occurrences.push(occurrence);
        }
        Ok(())
    }

    fn finish(&mut self, _table: &SymbolTable) -> Result<()> {
        let index = Index {
            metadata: Metadata {
                version: 0,
                tool_info: ToolInfo {
                    name: "rbintel".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
                project_root: self.project_root.clone(),
                text_document_encoding: "UTF-8".to_string(),
            },
            documents: std::mem::take(&mut self.documents),
        };
        serde_json::to_writer_pretty(&mut self.out, &index).context("serializing index")?;
        self.out.write_all(b"\n").context("writing index")?;
        self.out.flush().context("flushing index output")?;
        Ok(())
    }
}

/// Compact occurrence range: the end line is elided when it equals the
/// start line.
fn scip_range(range: &Range) -> Vec<u32> {
    if range.start.line == range.end.line {
        vec![range.start.line, range.start.character, range.end.character]
    } else {
        vec![
            range.start.line,
            range.start.character,
            range.end.line,
            range.end.character,
        ]
    }
}

/// Descriptor suffix encoding: namespace-forming segments end with `#`,
/// member segments with `.`.
fn descriptors(declaration: &Declaration) -> String {
    let mut out = String::new();
    for segment in declaration
        .scope
        .split("::")
        .filter(|segment| !segment.is_empty())
    {
        out.push_str(&quote_segment(segment));
        out.push('#');
    }
    out.push_str(&quote_segment(&declaration.name));
    out.push(if declaration.kind.is_namespace() { '#' } else { '.' });
    out
}

/// Backtick-quote segments containing characters outside the plain
/// identifier set.
fn quote_segment(segment: &str) -> String {
    let plain = !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '$' | '_'));
    if plain {
        segment.to_string()
    } else {
        format!("`{segment}`")
    }
}

fn syntax_kind(kind: DeclarationKind) -> &'static str {
    match kind {
        DeclarationKind::Class | DeclarationKind::Module => "IdentifierType",
        DeclarationKind::Method | DeclarationKind::SingletonMethod => "IdentifierFunction",
        DeclarationKind::Constant => "IdentifierConstant",
        DeclarationKind::InstanceVariable | DeclarationKind::ClassVariable => {
            "IdentifierAttribute"
        }
    }
}

fn symbol_kind(kind: DeclarationKind) -> &'static str {
    match kind {
        DeclarationKind::Class => "Class",
        DeclarationKind::Module => "Module",
        DeclarationKind::Method => "Method",
        DeclarationKind::SingletonMethod => "StaticMethod",
        DeclarationKind::Constant => "Constant",
        DeclarationKind::InstanceVariable | DeclarationKind::ClassVariable => "Field",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ResolutionPolicy;

    fn declaration(kind: DeclarationKind, qname: &str, name: &str, scope: &str) -> Declaration {
        Declaration::new(
            kind,
            qname.to_string(),
            name.to_string(),
            scope.to_string(),
            "app/models/user.rb".to_string(),
            Range::new(0, 6, 0, 10),
        )
    }

    fn descriptors_of(kind: DeclarationKind, qname: &str, name: &str, scope: &str) -> String {
        descriptors(&declaration(kind, qname, name, scope))
    }

    #[test]
    fn descriptor_suffixes_by_kind() {
        assert_eq!(descriptors_of(DeclarationKind::Class, "M::A", "A", "M"), "M#A#");
        assert_eq!(
            descriptors_of(DeclarationKind::Method, "M::A#run", "run", "M::A"),
            "M#A#run."
        );
        assert_eq!(
            descriptors_of(DeclarationKind::Constant, "A::MAX", "MAX", "A"),
            "A#MAX."
        );
    }

    #[test]
    fn irregular_segments_are_quoted() {
        assert_eq!(
            descriptors_of(DeclarationKind::Method, "X#value=", "value=", "X"),
            "X#`value=`."
        );
        assert_eq!(
            descriptors_of(DeclarationKind::InstanceVariable, "X#@name", "@name", "X"),
            "X#`@name`."
        );
    }

    #[test]
    fn single_line_ranges_use_three_elements() {
        assert_eq!(scip_range(&Range::new(3, 2, 3, 9)), vec![3, 2, 9]);
        assert_eq!(scip_range(&Range::new(3, 2, 5, 1)), vec![3, 2, 5, 1]);
    }

    #[test]
    fn documents_collect_occurrences_and_symbols() {
        let user = declaration(DeclarationKind::Class, "User", "User", "");
        let mut table = SymbolTable::new(ResolutionPolicy::default());
        table.add_declaration(user.clone());
        table.add_reference(Reference {
            target: "User".to_string(),
            file: "app/app.rb".to_string(),
            range: Range::new(4, 0, 4, 4),
            scope: String::new(),
        });

        let mut buffer = Vec::new();
        let mut emitter = ScipEmitter::new(&mut buffer);
        emitter.begin(Path::new("/tmp/shop")).unwrap();
        emitter.document("app/models/user.rb").unwrap();
        emitter.document("app/app.rb").unwrap();
        emitter.declaration(&user).unwrap();
        emitter.seal_declarations(&table).unwrap();
        for reference in table.references_of("User") {
            emitter.reference(reference).unwrap();
        }
        emitter.finish(&table).unwrap();
        drop(emitter);

        let index: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(index["metadata"]["tool_info"]["name"], "rbintel");
        assert_eq!(index["metadata"]["project_root"], "file:///tmp/shop");

        let documents = index["documents"].as_array().unwrap();
        assert_eq!(documents.len(), 2);
        let definition = &documents[0]["occurrences"][0];
        assert_eq!(definition["symbol"], "scip-ruby gem shop . User#");
        assert_eq!(definition["symbol_roles"], 1);
        assert_eq!(definition["syntax_kind"], "IdentifierType");
        let reference = &documents[1]["occurrences"][0];
        assert_eq!(reference["symbol"], "scip-ruby gem shop . User#");
        assert!(reference.get("symbol_roles").is_none());
        assert_eq!(documents[0]["symbols"][0]["kind"], "Class");
        assert_eq!(documents[0]["symbols"][0]["documentation"][0], "class User");
    }
}
