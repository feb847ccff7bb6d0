//! Pass 2: walk one file's tree against the fully populated symbol
//! table and pair every usable occurrence with a resolved qualified
//! name. Resolution never fails loudly: a miss simply emits nothing.

use tree_sitter::Node;

use crate::analysis::symbol_table::SymbolTable;
use crate::analysis::types::{Range, Reference, join_qualified};
use crate::parsing::{ParsedFile, node_text};

/// Ordered resolution attempt for one method-call occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Resolve through the full lexical + ancestor search.
    Lexical(String),
    /// Exact qualified-name lookup.
    Exact(String),
    /// Any declared method with this simple name, first declared wins.
    AnyMethod(String),
}

/// The candidate list for a method call, in priority order. Pure so the
/// heuristics are testable without a table or emission machinery; the
/// caller takes the first candidate that resolves and discards the rest.
pub fn method_call_candidates(method: &str, receiver_type: Option<&str>) -> Vec<Candidate> {
    let mut candidates = vec![Candidate::Lexical(format!("#{method}"))];
    if let Some(receiver) = receiver_type {
        candidates.push(Candidate::Exact(format!("{receiver}#{method}")));
        candidates.push(Candidate::Exact(format!("{receiver}.{method}")));
    }
    candidates.push(Candidate::Exact(format!("#{method}")));
    candidates.push(Candidate::Exact(format!(".{method}")));
    candidates.push(Candidate::AnyMethod(method.to_string()));
    candidates
}

/// Everything pass 2 produced for one file.
#[derive(Debug, Default)]
pub struct ResolvedReferences {
    pub references: Vec<Reference>,
    /// Occurrences that matched no declaration; not an error.
    pub misses: usize,
}

pub fn collect_references(file: &ParsedFile, table: &SymbolTable) -> ResolvedReferences {
    let mut resolver = Resolver {
        source: &file.source,
        file: &file.relative_path,
        table,
        out: ResolvedReferences::default(),
    };
    resolver.visit(file.tree.root_node(), "", None);
    resolver.out
}

#[derive(Clone, Copy)]
struct MethodContext<'a> {
    name: &'a str,
    singleton: bool,
}

struct Resolver<'a> {
    source: &'a str,
    file: &'a str,
    table: &'a SymbolTable,
    out: ResolvedReferences,
}

impl<'a> Resolver<'a> {
    fn visit(&mut self, node: Node<'a>, scope: &str, method: Option<MethodContext<'a>>) {
        match node.kind() {
            "class" | "module" => self.visit_class_like(node, scope),
            "method" => self.visit_method(node, scope, false),
            "singleton_method" => self.visit_method(node, scope, true),
            "assignment" | "operator_assignment" => {
                // The left side is a declaration or local write.
                if let Some(right) = node.child_by_field_name("right") {
                    self.visit(right, scope, method);
                }
            }
            "call" => self.visit_call(node, scope, method),
            "constant" => self.visit_constant(node, scope),
            "scope_resolution" => self.visit_constant_path(node, scope),
            "instance_variable" | "class_variable" => self.visit_variable_read(node, scope),
            "identifier" => self.visit_bare_identifier(node, scope),
            "super" => self.visit_super(node, scope, method),
            _ => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.visit(child, scope, method);
                }
            }
        }
    }

    fn visit_class_like(&mut self, node: Node<'a>, scope: &str) {
        // `class B < A` reads A in the enclosing scope.
        if let Some(superclass_node) = node.child_by_field_name("superclass")
            && let Some(written) = superclass_node.named_child(0)
            && matches!(written.kind(), "constant" | "scope_resolution")
            && let Some(target) = self.table.resolve(node_text(written, self.source), scope)
        {
            self.push(target, written, scope);
        }

        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let new_scope = join_qualified(scope, node_text(name_node, self.source));
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.named_children(&mut cursor) {
                self.visit(child, &new_scope, None);
            }
        }
    }

    fn visit_method(&mut self, node: Node<'a>, scope: &str, singleton: bool) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let context = MethodContext {
            name: node_text(name_node, self.source),
            singleton,
        };
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.named_children(&mut cursor) {
                self.visit(child, scope, Some(context));
            }
        }
    }

    fn visit_call(&mut self, node: Node<'a>, scope: &str, method: Option<MethodContext<'a>>) {
        let Some(method_node) = node.child_by_field_name("method") else {
            // `super(...)` with arguments parses as a call on `super`.
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                self.visit(child, scope, method);
            }
            return;
        };
        let method_name = node_text(method_node, self.source);
        let receiver = node.child_by_field_name("receiver");

        // Declaration-side macros were consumed by pass 1; their constant
        // arguments are still plain reads, handled by the walk below.
        let is_macro = receiver.is_none()
            && matches!(
                method_name,
                "include"
                    | "extend"
                    | "prepend"
                    | "attr_reader"
                    | "attr_writer"
                    | "attr_accessor"
                    | "public"
                    | "private"
                    | "protected"
                    | "require"
                    | "require_relative"
            );

        if !is_macro && method_node.kind() != "super" {
            let receiver_type = receiver.and_then(|r| self.receiver_type(r, scope));
            let candidates = method_call_candidates(method_name, receiver_type.as_deref());
            match self.first_match(&candidates, scope) {
                Some(target) => self.push(target, method_node, scope),
                None => self.out.misses += 1,
            }
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            // `super(...)` keeps its method node in the walk so the
            // superclass lookup still fires.
            if child.id() == method_node.id() && method_node.kind() != "super" {
                continue;
            }
            self.visit(child, scope, method);
        }
    }

    /// Best-effort receiver typing: a constant receiver names its own
    /// type; `Foo.new` chains to `Foo`; `self` is the current scope.
    fn receiver_type(&self, receiver: Node<'a>, scope: &str) -> Option<String> {
        match receiver.kind() {
            "constant" | "scope_resolution" => {
                self.table.resolve(node_text(receiver, self.source), scope)
            }
            "self" => Some(scope.to_string()),
            "call" => {
                let inner_method = receiver.child_by_field_name("method")?;
                if node_text(inner_method, self.source) != "new" {
                    return None;
                }
                let inner_receiver = receiver.child_by_field_name("receiver")?;
                if matches!(inner_receiver.kind(), "constant" | "scope_resolution") {
                    self.table
                        .resolve(node_text(inner_receiver, self.source), scope)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn first_match(&self, candidates: &[Candidate], scope: &str) -> Option<String> {
        for candidate in candidates {
            let hit = match candidate {
                Candidate::Lexical(name) => self.table.resolve(name, scope),
                Candidate::Exact(name) => self
                    .table
                    .has_declaration(name)
                    .then(|| name.clone()),
                Candidate::AnyMethod(name) => {
                    self.table.resolve_any_method(name).map(str::to_string)
                }
            };
            if hit.is_some() {
                return hit;
            }
        }
        None
    }

    fn visit_constant(&mut self, node: Node<'a>, scope: &str) {
        let name = node_text(node, self.source);
        match self.table.resolve(name, scope) {
            Some(target) => self.push(target, node, scope),
            None => {
                self.out.misses += 1;
                if self.table.policy().speculate_unresolved_constants {
                    self.push(name.to_string(), node, scope);
                }
            }
        }
    }

    /// A whole `A::B::C` path resolves as one occurrence; its segments
    /// are not visited individually.
    fn visit_constant_path(&mut self, node: Node<'a>, scope: &str) {
        let path = node_text(node, self.source);
        match self.table.resolve(path, scope) {
            Some(target) => self.push(target, node, scope),
            None => {
                self.out.misses += 1;
                if self.table.policy().speculate_unresolved_constants {
                    self.push(path.to_string(), node, scope);
                }
            }
        }
    }

    fn visit_variable_read(&mut self, node: Node<'a>, scope: &str) {
        let name = node_text(node, self.source);
        if let Some(target) = self.table.resolve(&format!("#{name}"), scope) {
            self.push(target, node, scope);
        }
    }

    /// Bare identifiers are either locals (out of scope) or receiverless
    /// calls. Try the lexical method search only; the global any-method
    /// fallback would turn every local read into a false link.
    fn visit_bare_identifier(&mut self, node: Node<'a>, scope: &str) {
        let name = node_text(node, self.source);
        if let Some(target) = self.table.resolve(&format!("#{name}"), scope) {
            self.push(target, node, scope);
        }
    }

    fn visit_super(&mut self, node: Node<'a>, scope: &str, method: Option<MethodContext<'a>>) {
        let Some(context) = method else {
            return;
        };
        let Some(class_declaration) = self.table.primary_declaration(scope) else {
            return;
        };
        let Some(superclass) = class_declaration.superclass.as_deref() else {
            return;
        };
        let Some(superclass_scope) = self.table.resolve(superclass, scope) else {
            return;
        };
        let marker = if context.singleton { '.' } else { '#' };
        if let Some(target) = self
            .table
            .resolve(&format!("{marker}{}", context.name), &superclass_scope)
        {
            self.push(target, node, scope);
        }
    }

    fn push(&mut self, target: String, node: Node<'a>, scope: &str) {
        self.out.references.push(Reference {
            target,
            file: self.file.to_string(),
            range: Range::from_node(&node),
            scope: scope.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::declarations::collect_declarations;
    use crate::analysis::symbol_table::ResolutionPolicy;
    use crate::parsing::RubyParser;

    fn parse(path: &str, source: &str) -> ParsedFile {
        let mut parser = RubyParser::new();
        ParsedFile {
            path: path.into(),
            relative_path: path.to_string(),
            source: source.to_string(),
            tree: parser.parse(source).unwrap(),
        }
    }

    fn index(sources: &[(&str, &str)], policy: ResolutionPolicy) -> (SymbolTable, Vec<ParsedFile>) {
        let mut table = SymbolTable::new(policy);
        let files: Vec<ParsedFile> = sources.iter().map(|(p, s)| parse(p, s)).collect();
        for file in &files {
            let collected = collect_declarations(file);
            for declaration in collected.declarations {
                table.add_declaration(declaration);
            }
            for edge in collected.ancestors {
                table.add_ancestor(edge);
            }
        }
        (table, files)
    }

    fn targets(table: &SymbolTable, file: &ParsedFile) -> Vec<String> {
        collect_references(file, table)
            .references
            .into_iter()
            .map(|r| r.target)
            .collect()
    }

    #[test]
    fn candidate_order_is_fixed() {
        let candidates = method_call_candidates("foo", Some("Shared"));
        assert_eq!(
            candidates,
            vec![
                Candidate::Lexical("#foo".into()),
                Candidate::Exact("Shared#foo".into()),
                Candidate::Exact("Shared.foo".into()),
                Candidate::Exact("#foo".into()),
                Candidate::Exact(".foo".into()),
                Candidate::AnyMethod("foo".into()),
            ]
        );
    }

    #[test]
    fn candidates_without_receiver_skip_typed_forms() {
        let candidates = method_call_candidates("foo", None);
        assert_eq!(candidates.len(), 4);
        assert_eq!(candidates[0], Candidate::Lexical("#foo".into()));
    }

    #[test]
    fn unresolved_calls_emit_nothing() {
        let (table, files) = index(
            &[("a.rb", "class Simple\n  def hello\n    puts \"Hello\"\n  end\nend\n")],
            ResolutionPolicy::default(),
        );
        assert!(targets(&table, &files[0]).is_empty());
    }

    #[test]
    fn singleton_call_on_constant_receiver() {
        let (table, files) = index(
            &[
                ("def.rb", "class Shared\n  def self.foo\n  end\nend\n"),
                ("ref.rb", "Shared.foo\n"),
            ],
            ResolutionPolicy::default(),
        );
        let found = targets(&table, &files[1]);
        // The constant read and the resolved singleton call.
        assert!(found.contains(&"Shared".to_string()));
        assert!(found.contains(&"Shared.foo".to_string()));
    }

    #[test]
    fn superclass_reference_resolves_in_lexical_scope() {
        let (table, files) = index(
            &[
                ("m/a.rb", "module M\n  class A\n  end\nend\n"),
                ("m/b.rb", "module M\n  class B < A\n  end\nend\n"),
            ],
            ResolutionPolicy::default(),
        );
        assert!(targets(&table, &files[1]).contains(&"M::A".to_string()));
    }

    #[test]
    fn instance_call_within_class_scope() {
        let (table, files) = index(
            &[(
                "u.rb",
                "class User\n  def save\n  end\n  def persist!\n    save\n  end\nend\n",
            )],
            ResolutionPolicy::default(),
        );
        assert!(targets(&table, &files[0]).contains(&"User#save".to_string()));
    }

    #[test]
    fn mixin_method_found_via_ancestor_edge() {
        let (table, files) = index(
            &[
                ("helpers.rb", "module Helpers\n  def log(msg)\n  end\nend\n"),
                (
                    "app.rb",
                    "class App\n  include Helpers\n  def run\n    log(\"hi\")\n  end\nend\n",
                ),
            ],
            ResolutionPolicy::default(),
        );
        assert!(targets(&table, &files[1]).contains(&"Helpers#log".to_string()));
    }

    #[test]
    fn any_method_fallback_links_receiver_calls() {
        let (table, files) = index(
            &[
                ("svc.rb", "class Service\n  def perform\n  end\nend\n"),
                ("use.rb", "def kick(job)\n  job.perform\nend\n"),
            ],
            ResolutionPolicy::default(),
        );
        assert!(targets(&table, &files[1]).contains(&"Service#perform".to_string()));
    }

    #[test]
    fn new_chain_types_the_receiver() {
        let (table, files) = index(
            &[
                ("invoice.rb", "class Invoice\n  def total\n  end\nend\n"),
                ("use.rb", "puts Invoice.new.total\n"),
            ],
            ResolutionPolicy::default(),
        );
        assert!(targets(&table, &files[1]).contains(&"Invoice#total".to_string()));
    }

    #[test]
    fn super_resolves_through_declared_superclass() {
        let (table, files) = index(
            &[(
                "a.rb",
                "class Base\n  def run\n  end\nend\nclass Child < Base\n  def run\n    super\n  end\nend\n",
            )],
            ResolutionPolicy::default(),
        );
        assert!(targets(&table, &files[0]).contains(&"Base#run".to_string()));
    }

    #[test]
    fn instance_variable_read_resolves_to_declaration() {
        let (table, files) = index(
            &[(
                "u.rb",
                "class U\n  def initialize(n)\n    @name = n\n  end\n  def greet\n    \"hi #{@name}\"\n  end\nend\n",
            )],
            ResolutionPolicy::default(),
        );
        assert!(targets(&table, &files[0]).contains(&"U#@name".to_string()));
    }

    #[test]
    fn unresolved_constant_is_a_silent_miss_by_default() {
        let (table, files) = index(&[("a.rb", "Unknown::Thing\n")], ResolutionPolicy::default());
        let resolved = collect_references(&files[0], &table);
        assert!(resolved.references.is_empty());
        assert!(resolved.misses >= 1);
    }

    #[test]
    fn speculative_policy_registers_unresolved_constants() {
        let (table, files) = index(
            &[("a.rb", "Unknown\n")],
            ResolutionPolicy {
                speculate_unresolved_constants: true,
            },
        );
        let resolved = collect_references(&files[0], &table);
        assert_eq!(resolved.references.len(), 1);
        assert_eq!(resolved.references[0].target, "Unknown");
    }
}
