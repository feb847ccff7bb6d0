//! The authoritative store for one indexing run: declarations keyed by
//! qualified name (several per name once a class or module is reopened),
//! mixin ancestor edges, accumulated references, and the lexical +
//! ancestor-chain resolution algorithm both passes query.
//!
//! The table is constructed by the runner and owned for exactly one run;
//! `reset` clears every map so a long-lived process can reuse it without
//! leaking state between invocations.

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::analysis::types::{
    AncestorEdge, Declaration, DeclarationKind, Reference, join_qualified, parent_scope,
    scope_segments,
};

/// Tunable resolution behavior that is policy, not correctness.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolutionPolicy {
    /// When a constant read resolves to nothing in any enclosing scope,
    /// register a reference under the bare name anyway. Over-approximates
    /// and is off by default.
    pub speculate_unresolved_constants: bool,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    /// All physical declarations per qualified name, in encounter order.
    declarations: FxHashMap<String, SmallVec<[Declaration; 1]>>,
    /// Index into the declaration list of the primary definition.
    primary: FxHashMap<String, usize>,
    /// First-seen order of qualified names, for deterministic iteration.
    entity_order: Vec<String>,
    /// Mixin inclusions per scope, insertion order preserved.
    ancestors: FxHashMap<String, SmallVec<[String; 4]>>,
    /// Accumulated references per resolved qualified name.
    references: FxHashMap<String, Vec<Reference>>,
    /// First-reference order of qualified names.
    referenced_order: Vec<String>,
    /// Simple method name -> qualified names declaring it, insertion
    /// order. Backs the deliberate over-approximating bare-call fallback.
    methods_by_name: FxHashMap<String, SmallVec<[String; 4]>>,
    policy: ResolutionPolicy,
}

impl SymbolTable {
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    /// Clear all state accumulated during a run.
    pub fn reset(&mut self) {
        self.declarations.clear();
        self.primary.clear();
        self.entity_order.clear();
        self.ancestors.clear();
        self.references.clear();
        self.referenced_order.clear();
        self.methods_by_name.clear();
    }

    /// Append one physical declaration. Prior declarations of the same
    /// qualified name are never overwritten; the primary definition for
    /// that name is recomputed.
    pub fn add_declaration(&mut self, declaration: Declaration) {
        let qualified_name = declaration.qualified_name.clone();

        if matches!(
            declaration.kind,
            DeclarationKind::Method | DeclarationKind::SingletonMethod
        ) {
            let by_name = self.methods_by_name.entry(declaration.name.clone()).or_default();
            if !by_name.contains(&qualified_name) {
                by_name.push(qualified_name.clone());
            }
        }

        let list = self.declarations.entry(qualified_name.clone()).or_default();
        if list.is_empty() {
            self.entity_order.push(qualified_name.clone());
        }
        list.push(declaration);
        let primary = select_primary(list);
        self.primary.insert(qualified_name, primary);
    }

    /// Append one reference occurrence. Never deduplicated: two calls to
    /// the same method are two references.
    pub fn add_reference(&mut self, reference: Reference) {
        let entry = self.references.entry(reference.target.clone()).or_default();
        if entry.is_empty() {
            self.referenced_order.push(reference.target.clone());
        }
        entry.push(reference);
    }

    /// Record one mixin inclusion edge, preserving inclusion order.
    pub fn add_ancestor(&mut self, edge: AncestorEdge) {
        self.ancestors.entry(edge.scope).or_default().push(edge.ancestor);
    }

    pub fn has_declaration(&self, qualified_name: &str) -> bool {
        self.declarations.contains_key(qualified_name)
    }

    pub fn declarations_of(&self, qualified_name: &str) -> &[Declaration] {
        self.declarations
            .get(qualified_name)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    /// Index of the primary definition within `declarations_of`.
    pub fn primary_index(&self, qualified_name: &str) -> Option<usize> {
        self.primary.get(qualified_name).copied()
    }

    pub fn primary_declaration(&self, qualified_name: &str) -> Option<&Declaration> {
        let index = self.primary_index(qualified_name)?;
        self.declarations.get(qualified_name)?.get(index)
    }

    /// Qualified names in first-declaration order.
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entity_order.iter().map(String::as_str)
    }

    /// Qualified names that accumulated at least one reference, in
    /// first-reference order.
    pub fn referenced_entities(&self) -> impl Iterator<Item = &str> {
        self.referenced_order.iter().map(String::as_str)
    }

    pub fn references_of(&self, qualified_name: &str) -> &[Reference] {
        self.references
            .get(qualified_name)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    pub fn declaration_count(&self) -> usize {
        self.declarations.values().map(SmallVec::len).sum()
    }

    pub fn reference_count(&self) -> usize {
        self.references.values().map(Vec::len).sum()
    }

    /// Core lookup: lexical-scope search walking outward one segment at a
    /// time, with an ancestor-chain search at every level. Returns the
    /// resolved qualified name, or `None` as a normal silent outcome.
    pub fn resolve(&self, name: &str, current_scope: &str) -> Option<String> {
        // Already-qualified references (`A::B::C`) pass through unchanged.
        if self.declarations.contains_key(name) {
            return Some(name.to_string());
        }

        let mut scope = current_scope;
        loop {
            let candidate = join_qualified(scope, name);
            if self.declarations.contains_key(&candidate) {
                return Some(candidate);
            }
            let mut visited = FxHashSet::default();
            if let Some(hit) = self.resolve_in_ancestors(scope, name, &mut visited) {
                return Some(hit);
            }
            if scope.is_empty() {
                break;
            }
            scope = parent_scope(scope);
        }
        None
    }

    /// Depth-first ancestor search, cycle-guarded by a visited set keyed
    /// on scope name.
    fn resolve_in_ancestors(
        &self,
        scope: &str,
        name: &str,
        visited: &mut FxHashSet<String>,
    ) -> Option<String> {
        if !visited.insert(scope.to_string()) {
            return None;
        }
        for ancestor in self.ancestors.get(scope)? {
            // Ancestor edges hold the name as written at the include
            // site; qualify it lexically before searching under it.
            let ancestor_scope = if self.declarations.contains_key(ancestor.as_str()) {
                ancestor.clone()
            } else {
                self.resolve_lexical(ancestor, scope)
                    .unwrap_or_else(|| ancestor.clone())
            };
            let candidate = join_qualified(&ancestor_scope, name);
            if self.declarations.contains_key(&candidate) {
                return Some(candidate);
            }
            if let Some(hit) = self.resolve_in_ancestors(&ancestor_scope, name, visited) {
                return Some(hit);
            }
        }
        None
    }

    /// Lexical-only lookup (no ancestor chain), used to qualify ancestor
    /// names without recursing back into the ancestor search.
    fn resolve_lexical(&self, name: &str, current_scope: &str) -> Option<String> {
        if self.declarations.contains_key(name) {
            return Some(name.to_string());
        }
        let mut scope = current_scope;
        loop {
            let candidate = join_qualified(scope, name);
            if self.declarations.contains_key(&candidate) {
                return Some(candidate);
            }
            if scope.is_empty() {
                return None;
            }
            scope = parent_scope(scope);
        }
    }

    /// Last-resort method lookup: any declared method with this simple
    /// name, first declared wins. Trades false positives for recall.
    pub fn resolve_any_method(&self, method_name: &str) -> Option<&str> {
        self.methods_by_name
            .get(method_name)
            .and_then(|names| names.first())
            .map(String::as_str)
    }
}

/// Deterministic primary-definition choice among the physical
/// declarations of one qualified name. Idempotent for a fixed list.
fn select_primary(declarations: &[Declaration]) -> usize {
    // 1. A class declaration that names a superclass.
    if let Some(index) = declarations
        .iter()
        .position(|d| d.kind == DeclarationKind::Class && d.superclass.is_some())
    {
        return index;
    }
    // 2. Conventional file placement: `Foo::BarBaz` in `foo/bar_baz.rb`.
    if let Some(index) = declarations.iter().position(conventional_path_match) {
        return index;
    }
    // 3. Modules at a path depth mirroring the scope path.
    if let Some(index) = declarations
        .iter()
        .position(|d| d.kind == DeclarationKind::Module && module_depth_match(d))
    {
        return index;
    }
    // 4. First encountered.
    0
}

/// File base name matches the snake-cased simple name and the containing
/// directories end with the snake-cased scope path.
fn conventional_path_match(declaration: &Declaration) -> bool {
    let path = Path::new(&declaration.file);
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    if stem != camel_to_snake(&declaration.name) {
        return false;
    }
    let dirs: Vec<&str> = path
        .parent()
        .map(|p| {
            p.iter()
                .filter_map(|c| c.to_str())
                .filter(|c| !c.is_empty() && *c != ".")
                .collect()
        })
        .unwrap_or_default();
    let scope_dirs: Vec<String> = scope_segments(&declaration.scope)
        .iter()
        .map(|s| camel_to_snake(s))
        .collect();
    dirs.len() >= scope_dirs.len()
        && dirs[dirs.len() - scope_dirs.len()..]
            .iter()
            .zip(&scope_dirs)
            .all(|(dir, scope)| dir == scope)
}

/// Module declarations whose file path has exactly one component per
/// qualified-name segment, matching case-insensitively.
fn module_depth_match(declaration: &Declaration) -> bool {
    let mut segments: Vec<&str> = scope_segments(&declaration.scope);
    segments.push(&declaration.name);

    let path = Path::new(&declaration.file);
    let mut components: Vec<String> = path
        .iter()
        .filter_map(|c| c.to_str())
        .filter(|c| !c.is_empty() && *c != ".")
        .map(str::to_string)
        .collect();
    if let Some(last) = components.last_mut()
        && let Some(stem) = Path::new(last.as_str()).file_stem().and_then(|s| s.to_str())
    {
        *last = stem.to_string();
    }

    components.len() == segments.len()
        && components.iter().zip(&segments).all(|(component, segment)| {
            component.eq_ignore_ascii_case(segment)
                || component == &camel_to_snake(segment)
        })
}

/// CamelCase to Ruby's conventional snake_case file naming
/// (`HTTPServer` -> `http_server`, `UserProfile` -> `user_profile`).
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let boundary = i > 0
                && (chars[i - 1].is_lowercase()
                    || chars[i - 1].is_ascii_digit()
                    || (chars[i - 1].is_uppercase()
                        && chars.get(i + 1).is_some_and(|n| n.is_lowercase())));
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::Range;

    fn decl(kind: DeclarationKind, qname: &str, name: &str, scope: &str, file: &str) -> Declaration {
        Declaration::new(
            kind,
            qname.to_string(),
            name.to_string(),
            scope.to_string(),
            file.to_string(),
            Range::new(0, 0, 0, 1),
        )
    }

    #[test]
    fn camel_to_snake_handles_acronyms() {
        assert_eq!(camel_to_snake("UserProfile"), "user_profile");
        assert_eq!(camel_to_snake("HTTPServer"), "http_server");
        assert_eq!(camel_to_snake("Simple"), "simple");
        assert_eq!(camel_to_snake("A1B"), "a1_b");
    }

    #[test]
    fn resolve_in_current_scope() {
        let mut table = SymbolTable::default();
        table.add_declaration(decl(DeclarationKind::Class, "A::B", "B", "A", "a/b.rb"));
        assert_eq!(table.resolve("B", "A"), Some("A::B".to_string()));
    }

    #[test]
    fn resolve_walks_outward_lexically() {
        let mut table = SymbolTable::default();
        table.add_declaration(decl(DeclarationKind::Constant, "A::MAX", "MAX", "A", "a.rb"));
        assert_eq!(table.resolve("MAX", "A::B::C"), Some("A::MAX".to_string()));
    }

    #[test]
    fn resolve_passes_through_qualified_names() {
        let mut table = SymbolTable::default();
        table.add_declaration(decl(DeclarationKind::Class, "A::B", "B", "A", "a/b.rb"));
        assert_eq!(table.resolve("A::B", "X::Y"), Some("A::B".to_string()));
    }

    #[test]
    fn resolve_searches_ancestors() {
        let mut table = SymbolTable::default();
        table.add_declaration(decl(DeclarationKind::Module, "Helpers", "Helpers", "", "helpers.rb"));
        table.add_declaration(decl(
            DeclarationKind::Method,
            "Helpers#log",
            "log",
            "Helpers",
            "helpers.rb",
        ));
        table.add_declaration(decl(DeclarationKind::Class, "App", "App", "", "app.rb"));
        table.add_ancestor(AncestorEdge {
            scope: "App".to_string(),
            ancestor: "Helpers".to_string(),
        });
        assert_eq!(table.resolve("#log", "App"), Some("Helpers#log".to_string()));
    }

    #[test]
    fn ancestor_cycles_do_not_loop() {
        let mut table = SymbolTable::default();
        table.add_declaration(decl(DeclarationKind::Module, "A", "A", "", "a.rb"));
        table.add_declaration(decl(DeclarationKind::Module, "B", "B", "", "b.rb"));
        table.add_ancestor(AncestorEdge {
            scope: "A".to_string(),
            ancestor: "B".to_string(),
        });
        table.add_ancestor(AncestorEdge {
            scope: "B".to_string(),
            ancestor: "A".to_string(),
        });
        assert_eq!(table.resolve("#missing", "A"), None);
    }

    #[test]
    fn unresolved_is_silent() {
        let table = SymbolTable::default();
        assert_eq!(table.resolve("Nope", "A::B"), None);
    }

    #[test]
    fn primary_prefers_superclass_declaration() {
        let mut table = SymbolTable::default();
        table.add_declaration(decl(DeclarationKind::Class, "User", "User", "", "reopen.rb"));
        let mut with_super = decl(DeclarationKind::Class, "User", "User", "", "user.rb");
        with_super.superclass = Some("Base".to_string());
        table.add_declaration(with_super);
        let primary = table.primary_declaration("User").unwrap();
        assert_eq!(primary.file, "user.rb");
        // Idempotent for the same declaration set.
        assert_eq!(table.primary_index("User"), Some(1));
        assert_eq!(table.primary_index("User"), Some(1));
    }

    #[test]
    fn primary_prefers_conventional_file_path() {
        let mut table = SymbolTable::default();
        table.add_declaration(decl(
            DeclarationKind::Class,
            "Billing::Invoice",
            "Invoice",
            "Billing",
            "extensions.rb",
        ));
        table.add_declaration(decl(
            DeclarationKind::Class,
            "Billing::Invoice",
            "Invoice",
            "Billing",
            "lib/billing/invoice.rb",
        ));
        assert_eq!(table.primary_index("Billing::Invoice"), Some(1));
    }

    #[test]
    fn primary_module_depth_match() {
        let mut table = SymbolTable::default();
        table.add_declaration(decl(
            DeclarationKind::Module,
            "Api::V1",
            "V1",
            "Api",
            "lib/everything.rb",
        ));
        table.add_declaration(decl(
            DeclarationKind::Module,
            "Api::V1",
            "V1",
            "Api",
            "api/v1.rb",
        ));
        assert_eq!(table.primary_index("Api::V1"), Some(1));
    }

    #[test]
    fn primary_falls_back_to_first_encountered() {
        let mut table = SymbolTable::default();
        table.add_declaration(decl(DeclarationKind::Module, "M", "M", "", "one.rb"));
        table.add_declaration(decl(DeclarationKind::Module, "M", "M", "", "two.rb"));
        assert_eq!(table.primary_index("M"), Some(0));
    }

    #[test]
    fn references_accumulate_without_dedup() {
        let mut table = SymbolTable::default();
        let reference = Reference {
            target: "A#m".to_string(),
            file: "a.rb".to_string(),
            range: Range::new(3, 0, 3, 1),
            scope: "A".to_string(),
        };
        table.add_reference(reference.clone());
        table.add_reference(reference);
        assert_eq!(table.references_of("A#m").len(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let mut table = SymbolTable::default();
        table.add_declaration(decl(DeclarationKind::Class, "A", "A", "", "a.rb"));
        table.add_reference(Reference {
            target: "A".to_string(),
            file: "b.rb".to_string(),
            range: Range::new(0, 0, 0, 1),
            scope: String::new(),
        });
        table.reset();
        assert!(!table.has_declaration("A"));
        assert_eq!(table.declaration_count(), 0);
        assert_eq!(table.reference_count(), 0);
        assert_eq!(table.entities().count(), 0);
    }

    #[test]
    fn any_method_fallback_is_first_declared() {
        let mut table = SymbolTable::default();
        table.add_declaration(decl(DeclarationKind::Method, "A#run", "run", "A", "a.rb"));
        table.add_declaration(decl(DeclarationKind::Method, "B#run", "run", "B", "b.rb"));
        assert_eq!(table.resolve_any_method("run"), Some("A#run"));
        assert_eq!(table.resolve_any_method("walk"), None);
    }
}
