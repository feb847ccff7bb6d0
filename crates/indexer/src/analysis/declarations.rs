//! Pass 1: walk one file's tree and record every declaration-introducing
//! construct. The scope path is an immutable value threaded through the
//! recursion, never a shared mutable stack, and dispatch is a single
//! match over tree-sitter node kinds.

use tree_sitter::Node;

use crate::analysis::types::{
    AncestorEdge, Declaration, DeclarationKind, Range, Visibility, join_qualified,
};
use crate::parsing::{ParsedFile, node_text};

/// Everything pass 1 produced for one file.
#[derive(Debug, Default)]
pub struct CollectedFile {
    pub declarations: Vec<Declaration>,
    pub ancestors: Vec<AncestorEdge>,
}

/// Collect all declarations and ancestor edges from one parsed file.
pub fn collect_declarations(file: &ParsedFile) -> CollectedFile {
    let mut collector = Collector {
        source: &file.source,
        file: &file.relative_path,
        out: CollectedFile::default(),
    };
    collector.visit_body(file.tree.root_node(), "", false);
    collector.out
}

struct Collector<'a> {
    source: &'a str,
    file: &'a str,
    out: CollectedFile,
}

impl Collector<'_> {
    /// Walk the statements of one body in order. `in_type_body` is true
    /// inside class/module bodies, where mixin inclusions, accessor
    /// macros, and visibility modifiers are meaningful. Each body starts
    /// with public default visibility.
    fn visit_body(&mut self, node: Node<'_>, scope: &str, in_type_body: bool) {
        let mut default_visibility = Visibility::Public;
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.visit_statement(child, scope, in_type_body, &mut default_visibility);
        }
    }

    fn visit_statement(
        &mut self,
        node: Node<'_>,
        scope: &str,
        in_type_body: bool,
        default_visibility: &mut Visibility,
    ) {
        match node.kind() {
            "class" => self.visit_class_like(node, scope, DeclarationKind::Class),
            "module" => self.visit_class_like(node, scope, DeclarationKind::Module),
            "method" => self.visit_method(node, scope, *default_visibility, false),
            "singleton_method" => self.visit_method(node, scope, *default_visibility, true),
            "assignment" => self.visit_assignment(node, scope),
            "call" => {
                self.visit_call(node, scope, in_type_body, default_visibility);
            }
            "identifier" => {
                // A bare `private`/`protected`/`public` statement flips
                // the default for the rest of this body.
                if in_type_body
                    && let Some(visibility) = visibility_from_name(node_text(node, self.source))
                {
                    *default_visibility = visibility;
                }
            }
            _ => {
                // Conditionals, begin blocks, etc. may wrap declarations.
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.visit_statement(child, scope, in_type_body, default_visibility);
                }
            }
        }
    }

    fn visit_class_like(&mut self, node: Node<'_>, scope: &str, kind: DeclarationKind) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let written_name = node_text(name_node, self.source);
        if written_name.is_empty() {
            return;
        }

        // `class A::B` reopens B inside A; the qualified name follows the
        // written path.
        let qualified_name = join_qualified(scope, written_name);
        let simple_name = written_name
            .rsplit("::")
            .next()
            .unwrap_or(written_name)
            .to_string();

        let mut declaration = Declaration::new(
            kind,
            qualified_name.clone(),
            simple_name,
            scope.to_string(),
            self.file.to_string(),
            Range::from_node(&name_node),
        );

        if kind == DeclarationKind::Class
            && let Some(superclass_node) = node.child_by_field_name("superclass")
        {
            // The `superclass` node wraps the expression after `<`;
            // record the name as written, unresolved.
            let written = superclass_node
                .named_child(0)
                .map(|child| node_text(child, self.source))
                .unwrap_or("");
            if !written.is_empty() {
                declaration.superclass = Some(written.to_string());
            }
        }

        self.out.declarations.push(declaration);

        if let Some(body) = node.child_by_field_name("body") {
            self.visit_body(body, &qualified_name, true);
        }
    }

    fn visit_method(
        &mut self,
        node: Node<'_>,
        scope: &str,
        visibility: Visibility,
        singleton: bool,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        if name.is_empty() {
            return;
        }

        let (kind, marker) = if singleton {
            (DeclarationKind::SingletonMethod, '.')
        } else {
            (DeclarationKind::Method, '#')
        };

        let mut declaration = Declaration::new(
            kind,
            join_qualified(scope, &format!("{marker}{name}")),
            name,
            scope.to_string(),
            self.file.to_string(),
            Range::from_node(&name_node),
        );
        declaration.visibility = Some(visibility);
        declaration.signature = node
            .child_by_field_name("parameters")
            .map(|params| node_text(params, self.source).to_string());
        self.out.declarations.push(declaration);

        // Method bodies can declare instance variables, constants, and
        // nested methods; they share the enclosing lexical scope.
        if let Some(body) = node.child_by_field_name("body") {
            self.visit_body(body, scope, false);
        }
    }

    fn visit_assignment(&mut self, node: Node<'_>, scope: &str) {
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        let text = node_text(left, self.source);
        let (kind, member_name) = match left.kind() {
            "constant" => (DeclarationKind::Constant, text.to_string()),
            "instance_variable" => (DeclarationKind::InstanceVariable, format!("#{text}")),
            "class_variable" => (DeclarationKind::ClassVariable, format!("#{text}")),
            // Locals are out of scope.
            _ => return,
        };

        let mut declaration = Declaration::new(
            kind,
            join_qualified(scope, &member_name),
            text.to_string(),
            scope.to_string(),
            self.file.to_string(),
            Range::from_node(&left),
        );
        if kind == DeclarationKind::Constant
            && let Some(right) = node.child_by_field_name("right")
            && let Some(snippet) = literal_snippet(right, self.source)
        {
            declaration.value = Some(snippet);
        }
        self.out.declarations.push(declaration);
    }

    fn visit_call(
        &mut self,
        node: Node<'_>,
        scope: &str,
        in_type_body: bool,
        default_visibility: &mut Visibility,
    ) {
        let Some(method_node) = node.child_by_field_name("method") else {
            return;
        };
        // Macro-style calls only matter without an explicit receiver.
        if node.child_by_field_name("receiver").is_some() {
            return;
        }
        let method_name = node_text(method_node, self.source);

        match method_name {
            "include" | "extend" | "prepend" if in_type_body => {
                for argument in self.call_arguments(node) {
                    if matches!(argument.kind(), "constant" | "scope_resolution") {
                        self.out.ancestors.push(AncestorEdge {
                            scope: scope.to_string(),
                            ancestor: node_text(argument, self.source).to_string(),
                        });
                    }
                }
            }
            "attr_reader" | "attr_writer" | "attr_accessor" if in_type_body => {
                self.visit_accessor_macro(node, scope, method_name, *default_visibility);
            }
            "public" | "private" | "protected" if in_type_body => {
                let Some(visibility) = visibility_from_name(method_name) else {
                    return;
                };
                let named: Vec<String> = self
                    .call_arguments(node)
                    .into_iter()
                    .filter(|argument| argument.kind() == "simple_symbol")
                    .map(|argument| {
                        node_text(argument, self.source)
                            .trim_start_matches(':')
                            .to_string()
                    })
                    .collect();
                if named.is_empty() {
                    *default_visibility = visibility;
                } else {
                    // `private :foo, :bar` retroactively mutates the
                    // already-collected declarations in this scope.
                    for declaration in &mut self.out.declarations {
                        if declaration.scope == scope
                            && matches!(
                                declaration.kind,
                                DeclarationKind::Method | DeclarationKind::SingletonMethod
                            )
                            && named.iter().any(|n| n == &declaration.name)
                        {
                            declaration.visibility = Some(visibility);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Accessor macros have no method-definition node to anchor to; the
    /// synthesized declarations are anchored at each `:symbol` argument.
    fn visit_accessor_macro(
        &mut self,
        node: Node<'_>,
        scope: &str,
        macro_name: &str,
        visibility: Visibility,
    ) {
        for argument in self.call_arguments(node) {
            if argument.kind() != "simple_symbol" {
                continue;
            }
            let attribute = node_text(argument, self.source)
                .trim_start_matches(':')
                .to_string();
            if attribute.is_empty() {
                continue;
            }
            let anchor = Range::from_node(&argument);

            if macro_name == "attr_reader" || macro_name == "attr_accessor" {
                let mut reader = Declaration::new(
                    DeclarationKind::Method,
                    join_qualified(scope, &format!("#{attribute}")),
                    attribute.clone(),
                    scope.to_string(),
                    self.file.to_string(),
                    anchor,
                );
                reader.visibility = Some(visibility);
                reader.synthetic = true;
                self.out.declarations.push(reader);
            }
            if macro_name == "attr_writer" || macro_name == "attr_accessor" {
                let mut writer = Declaration::new(
                    DeclarationKind::Method,
                    join_qualified(scope, &format!("#{attribute}=")),
                    format!("{attribute}="),
                    scope.to_string(),
                    self.file.to_string(),
                    anchor,
                );
                writer.visibility = Some(visibility);
                writer.synthetic = true;
                writer.signature = Some(format!("({attribute})"));
                self.out.declarations.push(writer);
            }

            let mut backing = Declaration::new(
                DeclarationKind::InstanceVariable,
                join_qualified(scope, &format!("#@{attribute}")),
                format!("@{attribute}"),
                scope.to_string(),
                self.file.to_string(),
                anchor,
            );
            backing.synthetic = true;
            self.out.declarations.push(backing);
        }
    }

    fn call_arguments<'tree>(&self, call: Node<'tree>) -> Vec<Node<'tree>> {
        let Some(arguments) = call.child_by_field_name("arguments") else {
            return Vec::new();
        };
        let mut cursor = arguments.walk();
        arguments.named_children(&mut cursor).collect()
    }
}

fn visibility_from_name(name: &str) -> Option<Visibility> {
    match name {
        "public" => Some(Visibility::Public),
        "private" => Some(Visibility::Private),
        "protected" => Some(Visibility::Protected),
        _ => None,
    }
}

/// A value snippet for constant hovers, only when statically known.
fn literal_snippet(node: Node<'_>, source: &str) -> Option<String> {
    const MAX_SNIPPET: usize = 64;
    match node.kind() {
        "string" | "integer" | "float" | "true" | "false" | "nil" | "simple_symbol" | "array"
        | "hash" => {
            let text = node_text(node, source);
            let mut snippet: String = text.chars().take(MAX_SNIPPET).collect();
            if text.chars().count() > MAX_SNIPPET {
                snippet.push('…');
            }
            Some(snippet)
        }
        _ => None,
    }
}
