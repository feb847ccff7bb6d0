//! Structural validation of a produced graph-format index. The checker
//! never panics on bad input: every problem becomes an entry in the
//! returned result, split into errors (structurally broken) and
//! warnings (suspicious but usable).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

#[derive(Debug, Default)]
pub struct CheckStats {
    pub records: usize,
    pub vertices: usize,
    pub edges: usize,
    pub documents: usize,
    pub ranges: usize,
}

#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub stats: CheckStats,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

pub fn check_index(path: &Path) -> Result<ValidationResult> {
    let file =
        File::open(path).with_context(|| format!("opening index {}", path.display()))?;
    Ok(check_reader(BufReader::new(file)))
}

pub fn check_reader<R: BufRead>(reader: R) -> ValidationResult {
    let mut result = ValidationResult::default();
    // Vertex ID -> label, for edge endpoint checks.
    let mut vertex_labels: FxHashMap<u64, String> = FxHashMap::default();
    let mut contained_ranges: FxHashSet<u64> = FxHashSet::default();
    let mut all_ranges: Vec<u64> = Vec::new();
    let mut last_id: Option<u64> = None;
    let mut saw_metadata = false;

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = match line {
            Ok(line) => line,
            Err(error) => {
                result.error(format!("line {line_number}: unreadable: {error}"));
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let record: Value = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(error) => {
                result.error(format!("line {line_number}: invalid JSON: {error}"));
                continue;
            }
        };
        result.stats.records += 1;

        let Some(id) = record["id"].as_u64() else {
            result.error(format!("line {line_number}: record has no numeric id"));
            continue;
        };
        if let Some(previous) = last_id
            && id <= previous
        {
            result.error(format!(
                "line {line_number}: id {id} is not greater than previous id {previous}"
            ));
        }
        last_id = Some(id);

        let Some(label) = record["label"].as_str() else {
            result.error(format!("line {line_number}: record {id} has no label"));
            continue;
        };

        match record["type"].as_str() {
            Some("vertex") => {
                result.stats.vertices += 1;
                match label {
                    "metaData" => {
                        saw_metadata = true;
                        if record["projectRoot"].as_str().is_none() {
                            result.error(format!(
                                "line {line_number}: metaData has no projectRoot"
                            ));
                        }
                    }
                    "document" => {
                        result.stats.documents += 1;
                        if record["uri"].as_str().is_none() {
                            result
                                .error(format!("line {line_number}: document {id} has no uri"));
                        }
                    }
                    "range" => {
                        result.stats.ranges += 1;
                        all_ranges.push(id);
                        for field in ["start", "end"] {
                            let position = &record[field];
                            if !position["line"].is_u64() || !position["character"].is_u64() {
                                result.error(format!(
                                    "line {line_number}: range {id} has malformed {field}"
                                ));
                            }
                        }
                    }
                    _ => {}
                }
                vertex_labels.insert(id, label.to_string());
            }
            Some("edge") => {
                result.stats.edges += 1;
                check_edge(
                    &mut result,
                    &vertex_labels,
                    &mut contained_ranges,
                    line_number,
                    id,
                    label,
                    &record,
                );
            }
            _ => {
                result.error(format!(
                    "line {line_number}: record {id} is neither vertex nor edge"
                ));
            }
        }
    }

    if !saw_metadata {
        result.error("missing metadata: no metaData vertex found");
    }
    for range in &all_ranges {
        if !contained_ranges.contains(range) {
            result.warning(format!("range {range} is not contained in any document"));
        }
    }
    result
}

/// Which vertex labels each edge label may connect.
fn expected_endpoints(label: &str) -> Option<(&'static [&'static str], &'static [&'static str])> {
    match label {
        "contains" => Some((&["project", "document"], &["document", "range"])),
        "next" => Some((&["range"], &["resultSet"])),
        "item" => Some((&["definitionResult", "referenceResult"], &["range"])),
        "textDocument/definition" => Some((&["resultSet"], &["definitionResult"])),
        "textDocument/references" => Some((&["resultSet"], &["referenceResult"])),
        "textDocument/hover" => Some((&["resultSet"], &["hoverResult"])),
        _ => None,
    }
}

fn check_edge(
    result: &mut ValidationResult,
    vertex_labels: &FxHashMap<u64, String>,
    contained_ranges: &mut FxHashSet<u64>,
    line_number: usize,
    id: u64,
    label: &str,
    record: &Value,
) {
    let Some(out_v) = record["outV"].as_u64() else {
        result.error(format!("line {line_number}: edge {id} has no outV"));
        return;
    };
    let mut in_vs: Vec<u64> = Vec::new();
    if let Some(in_v) = record["inV"].as_u64() {
        in_vs.push(in_v);
    }
    for value in record["inVs"].as_array().into_iter().flatten() {
        match value.as_u64() {
            Some(in_v) => in_vs.push(in_v),
            None => result.error(format!(
                "line {line_number}: edge {id} has a non-numeric inVs entry"
            )),
        }
    }
    if in_vs.is_empty() {
        result.error(format!("line {line_number}: edge {id} has no inV or inVs"));
        return;
    }

    let out_label = match vertex_labels.get(&out_v) {
        Some(label) => label.as_str(),
        None => {
            result.error(format!(
                "line {line_number}: edge {id} outV {out_v} does not exist"
            ));
            return;
        }
    };
    let endpoints = expected_endpoints(label);
    if let Some((expected_out, _)) = endpoints
        && !expected_out.contains(&out_label)
    {
        result.error(format!(
            "line {line_number}: {label} edge {id} starts at a {out_label} vertex"
        ));
    }

    for in_v in &in_vs {
        let Some(in_label) = vertex_labels.get(in_v) else {
            result.error(format!(
                "line {line_number}: edge {id} target {in_v} does not exist"
            ));
            continue;
        };
        if let Some((_, expected_in)) = endpoints
            && !expected_in.contains(&in_label.as_str())
        {
            result.error(format!(
                "line {line_number}: {label} edge {id} points at a {in_label} vertex"
            ));
        }
        if label == "contains" && in_label == "range" {
            contained_ranges.insert(*in_v);
        }
    }

    if label == "item" {
        if record["document"].as_u64().is_none() {
            result.error(format!(
                "line {line_number}: item edge {id} has no document field"
            ));
        }
        if out_label == "referenceResult" {
            match record["property"].as_str() {
                Some("definitions" | "references") => {}
                _ => result.error(format!(
                    "line {line_number}: item edge {id} on a referenceResult needs a \
                     definitions/references property"
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn check(input: &str) -> ValidationResult {
        check_reader(Cursor::new(input.as_bytes()))
    }

    const VALID: &str = r#"{"id":1,"type":"vertex","label":"metaData","version":"0.4.3","projectRoot":"file:///p","positionEncoding":"utf-16","toolInfo":{"name":"rbintel","version":"0.3.0"}}
{"id":2,"type":"vertex","label":"project","kind":"ruby"}
{"id":3,"type":"vertex","label":"document","uri":"file:///p/a.rb","languageId":"ruby"}
{"id":4,"type":"vertex","label":"resultSet"}
{"id":5,"type":"vertex","label":"range","start":{"line":0,"character":6},"end":{"line":0,"character":7}}
{"id":6,"type":"edge","label":"next","outV":5,"inV":4}
{"id":7,"type":"vertex","label":"definitionResult"}
{"id":8,"type":"edge","label":"textDocument/definition","outV":4,"inV":7}
{"id":9,"type":"edge","label":"item","outV":7,"inVs":[5],"document":3}
{"id":10,"type":"edge","label":"contains","outV":3,"inVs":[5]}
{"id":11,"type":"edge","label":"contains","outV":2,"inVs":[3]}
"#;

    #[test]
    fn valid_index_passes() {
        let result = check(VALID);
        assert!(result.is_valid(), "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
        assert_eq!(result.stats.documents, 1);
        assert_eq!(result.stats.ranges, 1);
    }

    #[test]
    fn truncated_index_without_metadata_is_invalid() {
        let truncated: String = VALID.lines().skip(1).collect::<Vec<_>>().join("\n");
        let result = check(&truncated);
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.contains("missing metadata")));
    }

    #[test]
    fn non_monotonic_ids_are_errors() {
        let input = r#"{"id":5,"type":"vertex","label":"metaData","projectRoot":"file:///p"}
{"id":3,"type":"vertex","label":"project","kind":"ruby"}
"#;
        let result = check(input);
        assert!(result.errors.iter().any(|e| e.contains("not greater")));
    }

    #[test]
    fn dangling_edge_targets_are_errors() {
        let input = r#"{"id":1,"type":"vertex","label":"metaData","projectRoot":"file:///p"}
{"id":2,"type":"vertex","label":"range","start":{"line":0,"character":0},"end":{"line":0,"character":1}}
{"id":3,"type":"edge","label":"next","outV":2,"inV":99}
"#;
        let result = check(input);
        assert!(result.errors.iter().any(|e| e.contains("does not exist")));
    }

    #[test]
    fn wrong_endpoint_kinds_are_errors() {
        let input = r#"{"id":1,"type":"vertex","label":"metaData","projectRoot":"file:///p"}
{"id":2,"type":"vertex","label":"resultSet"}
{"id":3,"type":"vertex","label":"hoverResult","result":{"contents":[]}}
{"id":4,"type":"edge","label":"next","outV":2,"inV":3}
"#;
        let result = check(input);
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.contains("next edge 4 starts at a resultSet"))
        );
    }

    #[test]
    fn uncontained_range_is_a_warning() {
        let input = r#"{"id":1,"type":"vertex","label":"metaData","projectRoot":"file:///p"}
{"id":2,"type":"vertex","label":"range","start":{"line":0,"character":0},"end":{"line":0,"character":1}}
"#;
        let result = check(input);
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.contains("not contained")));
    }

    #[test]
    fn invalid_json_line_is_an_error() {
        let result = check("not json\n");
        assert!(result.errors.iter().any(|e| e.contains("invalid JSON")));
    }
}
