//! Graph-oriented output: newline-delimited JSON vertices and edges in
//! the LSIF 0.4.3 shape. Records are append-only and IDs strictly
//! increase, so every edge points backwards at already-written vertices.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde_json::{Value, json};

use crate::analysis::{Declaration, Range, Reference, SymbolTable};
use crate::emit::{IndexSink, file_uri};

const LSIF_VERSION: &str = "0.4.3";

pub struct LsifEmitter<W: Write> {
    out: W,
    next_id: u64,
    project_id: u64,
    project_root: String,
    /// Relative path -> document vertex ID, insertion order kept aside.
    documents: FxHashMap<String, u64>,
    document_order: Vec<String>,
    /// Every range vertex a document owns, for the final contains edges.
    contained_ranges: FxHashMap<String, Vec<u64>>,
    /// Qualified name -> shared resultSet vertex ID.
    result_sets: FxHashMap<String, u64>,
    /// Declaration ranges per qualified name, in table encounter order so
    /// indices line up with `SymbolTable::declarations_of`.
    declaration_ranges: FxHashMap<String, Vec<(String, u64)>>,
    reference_ranges: FxHashMap<String, Vec<(String, u64)>>,
}

impl<W: Write> LsifEmitter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            next_id: 1,
            project_id: 0,
            project_root: String::new(),
            documents: FxHashMap::default(),
            document_order: Vec::new(),
            contained_ranges: FxHashMap::default(),
            result_sets: FxHashMap::default(),
            declaration_ranges: FxHashMap::default(),
            reference_ranges: FxHashMap::default(),
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn write_record(&mut self, record: &Value) -> Result<()> {
        serde_json::to_writer(&mut self.out, record).context("serializing index record")?;
        self.out.write_all(b"\n").context("writing index record")?;
        Ok(())
    }

    fn vertex(&mut self, label: &str, fields: Value) -> Result<u64> {
        let id = self.allocate_id();
        let mut record = json!({"id": id, "type": "vertex", "label": label});
        merge(&mut record, fields);
        self.write_record(&record)?;
        Ok(id)
    }

    fn edge(&mut self, label: &str, out_v: u64, in_v: u64) -> Result<u64> {
        let id = self.allocate_id();
        self.write_record(&json!({
            "id": id, "type": "edge", "label": label, "outV": out_v, "inV": in_v,
        }))?;
        Ok(id)
    }

    fn item_edge(
        &mut self,
        out_v: u64,
        in_vs: &[u64],
        document: u64,
        property: Option<&str>,
    ) -> Result<()> {
        let id = self.allocate_id();
        let mut record = json!({
            "id": id, "type": "edge", "label": "item",
            "outV": out_v, "inVs": in_vs, "document": document,
        });
        if let Some(property) = property {
            merge(&mut record, json!({"property": property}));
        }
        self.write_record(&record)
    }

    fn range_vertex(&mut self, range: &Range) -> Result<u64> {
        self.vertex(
            "range",
            json!({
                "start": {"line": range.start.line, "character": range.start.character},
                "end": {"line": range.end.line, "character": range.end.character},
            }),
        )
    }

    fn result_set_for(&mut self, qualified_name: &str) -> Result<u64> {
        if let Some(&id) = self.result_sets.get(qualified_name) {
            return Ok(id);
        }
        let id = self.vertex("resultSet", json!({}))?;
        self.result_sets.insert(qualified_name.to_string(), id);
        Ok(id)
    }

    /// Emit one item edge per distinct document, preserving range order.
    fn emit_grouped_items(
        &mut self,
        out_v: u64,
        ranges: &[(String, u64)],
        property: Option<&str>,
    ) -> Result<()> {
        let mut grouped: Vec<(String, Vec<u64>)> = Vec::new();
        for (file, range_id) in ranges {
            match grouped.iter_mut().find(|(f, _)| f == file) {
                Some((_, ids)) => ids.push(*range_id),
                None => grouped.push((file.clone(), vec![*range_id])),
            }
        }
        for (file, ids) in grouped {
            let Some(&document) = self.documents.get(&file) else {
                continue;
            };
            self.item_edge(out_v, &ids, document, property)?;
        }
        Ok(())
    }
}

impl<W: Write> IndexSink for LsifEmitter<W> {
    fn begin(&mut self, project_root: &Path) -> Result<()> {
        self.project_root = file_uri(project_root);
        let root = self.project_root.clone();
        self.vertex(
            "metaData",
            json!({
                "version": LSIF_VERSION,
                "projectRoot": root,
                "positionEncoding": "utf-16",
                "toolInfo": {"name": "rbintel", "version": env!("CARGO_PKG_VERSION")},
            }),
        )?;
        self.project_id = self.vertex("project", json!({"kind": "ruby"}))?;
        Ok(())
    }

    fn document(&mut self, relative_path: &str) -> Result<()> {
        if self.documents.contains_key(relative_path) {
            return Ok(());
        }
        let uri = format!("{}/{relative_path}", self.project_root);
        let id = self.vertex("document", json!({"uri": uri, "languageId": "ruby"}))?;
        self.documents.insert(relative_path.to_string(), id);
        self.document_order.push(relative_path.to_string());
        Ok(())
    }

    fn declaration(&mut self, declaration: &Declaration) -> Result<()> {
        let result_set = self.result_set_for(&declaration.qualified_name)?;
        let range = self.range_vertex(&declaration.range)?;
        self.edge("next", range, result_set)?;
        self.declaration_ranges
            .entry(declaration.qualified_name.clone())
            .or_default()
            .push((declaration.file.clone(), range));
        self.contained_ranges
            .entry(declaration.file.clone())
            .or_default()
            .push(range);
        Ok(())
    }

    fn seal_declarations(&mut self, table: &SymbolTable) -> Result<()> {
        let entities: Vec<String> = table.entities().map(str::to_string).collect();
        for qualified_name in entities {
            let Some(&result_set) = self.result_sets.get(&qualified_name) else {
                continue;
            };
            let Some(ranges) = self.declaration_ranges.get(&qualified_name).cloned() else {
                continue;
            };

            // Primary definition first, remaining declarations after it.
            let primary = table.primary_index(&qualified_name).unwrap_or(0);
            let mut ordered = ranges;
            if primary < ordered.len() {
                let first = ordered.remove(primary);
                ordered.insert(0, first);
            }

            let definition_result = self.vertex("definitionResult", json!({}))?;
            self.edge("textDocument/definition", result_set, definition_result)?;
            self.emit_grouped_items(definition_result, &ordered, None)?;

            if let Some(declaration) = table.primary_declaration(&qualified_name) {
                let hover = declaration.hover_text();
                let hover_result = self.vertex(
                    "hoverResult",
                    json!({"result": {"contents": [{"language": "ruby", "value": hover}]}}),
                )?;
                self.edge("textDocument/hover", result_set, hover_result)?;
            }
        }
        Ok(())
    }

    fn reference(&mut self, reference: &Reference) -> Result<()> {
        // References to undeclared targets have no result set to join.
        let Some(&result_set) = self.result_sets.get(&reference.target) else {
            return Ok(());
        };
        let range = self.range_vertex(&reference.range)?;
        self.edge("next", range, result_set)?;
        self.reference_ranges
            .entry(reference.target.clone())
            .or_default()
            .push((reference.file.clone(), range));
        self.contained_ranges
            .entry(reference.file.clone())
            .or_default()
            .push(range);
        Ok(())
    }

    fn finish(&mut self, table: &SymbolTable) -> Result<()> {
        let referenced: Vec<String> = table.referenced_entities().map(str::to_string).collect();
        for qualified_name in referenced {
            let Some(&result_set) = self.result_sets.get(&qualified_name) else {
                continue;
            };
            let Some(reference_ranges) = self.reference_ranges.get(&qualified_name).cloned()
            else {
                continue;
            };

            let reference_result = self.vertex("referenceResult", json!({}))?;
            self.edge("textDocument/references", result_set, reference_result)?;

            // The primary declaration range joins the aggregate so "find
            // references" from any contributing file sees the definition.
            let primary = table.primary_index(&qualified_name).unwrap_or(0);
            if let Some(declaration_range) = self
                .declaration_ranges
                .get(&qualified_name)
                .and_then(|ranges| ranges.get(primary))
                .cloned()
            {
                self.emit_grouped_items(
                    reference_result,
                    std::slice::from_ref(&declaration_range),
                    Some("definitions"),
                )?;
            }
            self.emit_grouped_items(reference_result, &reference_ranges, Some("references"))?;
        }

        for relative_path in self.document_order.clone() {
            let Some(&document) = self.documents.get(&relative_path) else {
                continue;
            };
            let Some(ranges) = self.contained_ranges.get(&relative_path).cloned() else {
                continue;
            };
            if ranges.is_empty() {
                continue;
            }
            let id = self.allocate_id();
            self.write_record(&json!({
                "id": id, "type": "edge", "label": "contains",
                "outV": document, "inVs": ranges,
            }))?;
        }

        if !self.document_order.is_empty() {
            let documents: Vec<u64> = self
                .document_order
                .iter()
                .filter_map(|path| self.documents.get(path).copied())
                .collect();
            let id = self.allocate_id();
            let project = self.project_id;
            self.write_record(&json!({
                "id": id, "type": "edge", "label": "contains",
                "outV": project, "inVs": documents,
            }))?;
        }

        self.out.flush().context("flushing index output")?;
        Ok(())
    }
}

fn merge(record: &mut Value, fields: Value) {
    if let (Value::Object(target), Value::Object(source)) = (record, fields) {
        target.extend(source);
    }
}
