use serde::{Deserialize, Serialize};

/// Lexical scope separator in qualified names (`Foo::Bar`).
pub const SCOPE_SEPARATOR: &str = "::";
/// Marker joining a scope to an instance-level member (`Foo#save`, `Foo#@name`).
pub const MEMBER_MARKER: char = '#';
/// Marker joining a scope to a singleton (class-level) method (`Foo.create`).
pub const SINGLETON_MARKER: char = '.';

/// Join a scope path and a name into a qualified name.
///
/// Member names already carry their marker (`#save`, `.create`) and are
/// concatenated without an extra separator; everything else gets the
/// lexical `::` join. An empty scope yields the name as-is, which is how
/// top-level methods end up keyed as `#save` or `.create`.
pub fn join_qualified(scope: &str, name: &str) -> String {
    if name.starts_with(MEMBER_MARKER) || name.starts_with(SINGLETON_MARKER) {
        format!("{scope}{name}")
    } else if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}{SCOPE_SEPARATOR}{name}")
    }
}

/// Drop the last lexical segment of a scope path (`A::B::C` -> `A::B`,
/// `A` -> ``). Used by the outward lexical search in resolution.
pub fn parent_scope(scope: &str) -> &str {
    match scope.rfind(SCOPE_SEPARATOR) {
        Some(idx) => &scope[..idx],
        None => "",
    }
}

/// Split a scope path into its lexical segments. Empty scope has none.
pub fn scope_segments(scope: &str) -> Vec<&str> {
    if scope.is_empty() {
        Vec::new()
    } else {
        scope.split(SCOPE_SEPARATOR).collect()
    }
}

/// A zero-based source position. Columns follow tree-sitter's byte-column
/// convention, end-exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

/// A source span owned by exactly one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start_line: u32, start_char: u32, end_line: u32, end_char: u32) -> Self {
        Self {
            start: Position {
                line: start_line,
                character: start_char,
            },
            end: Position {
                line: end_line,
                character: end_char,
            },
        }
    }

    pub fn from_node(node: &tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self::new(
            start.row as u32,
            start.column as u32,
            end.row as u32,
            end.column as u32,
        )
    }
}

/// The kinds of entities the collector records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Class,
    Module,
    Method,
    SingletonMethod,
    Constant,
    InstanceVariable,
    ClassVariable,
}

impl DeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Class => "class",
            DeclarationKind::Module => "module",
            DeclarationKind::Method => "method",
            DeclarationKind::SingletonMethod => "singleton_method",
            DeclarationKind::Constant => "constant",
            DeclarationKind::InstanceVariable => "instance_variable",
            DeclarationKind::ClassVariable => "class_variable",
        }
    }

    /// Classes and modules form the lexical namespace; everything else is
    /// a member of one.
    pub fn is_namespace(&self) -> bool {
        matches!(self, DeclarationKind::Class | DeclarationKind::Module)
    }
}

/// Method visibility as mutated by `public`/`private`/`protected` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Protected,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
        }
    }
}

/// One physical declaration of a logical entity. A qualified name owns
/// 0..N of these; reopened classes and modules own several.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub kind: DeclarationKind,
    /// Fully qualified name, e.g. `Billing::Invoice#total`.
    pub qualified_name: String,
    /// Simple name, e.g. `total`.
    pub name: String,
    /// Enclosing lexical scope (`Billing::Invoice`), empty at top level.
    pub scope: String,
    /// Repository-relative source file path.
    pub file: String,
    pub range: Range,
    /// Unresolved superclass name as written (`< Base`); classes only.
    pub superclass: Option<String>,
    /// Methods only.
    pub visibility: Option<Visibility>,
    /// Parameter list text for methods (`(a, b = 1)`).
    pub signature: Option<String>,
    /// Literal right-hand side snippet for constants, when statically known.
    pub value: Option<String>,
    /// Set for declarations materialized from accessor macros; their
    /// range is anchored at the macro-call argument.
    pub synthetic: bool,
}

impl Declaration {
    pub fn new(
        kind: DeclarationKind,
        qualified_name: String,
        name: String,
        scope: String,
        file: String,
        range: Range,
    ) -> Self {
        Self {
            kind,
            qualified_name,
            name,
            scope,
            file,
            range,
            superclass: None,
            visibility: None,
            signature: None,
            value: None,
            synthetic: false,
        }
    }

    /// Render the kind-specific hover text used for hover payloads and
    /// SCIP documentation.
    pub fn hover_text(&self) -> String {
        match self.kind {
            DeclarationKind::Class => match &self.superclass {
                Some(superclass) => format!("class {} < {}", self.qualified_name, superclass),
                None => format!("class {}", self.qualified_name),
            },
            DeclarationKind::Module => format!("module {}", self.qualified_name),
            DeclarationKind::Method => {
                format!("def {}{}", self.name, self.signature.as_deref().unwrap_or(""))
            }
            DeclarationKind::SingletonMethod => format!(
                "def self.{}{}",
                self.name,
                self.signature.as_deref().unwrap_or("")
            ),
            DeclarationKind::Constant => match &self.value {
                Some(value) => format!("{} = {}", self.qualified_name, value),
                None => self.qualified_name.clone(),
            },
            DeclarationKind::InstanceVariable | DeclarationKind::ClassVariable => {
                self.name.clone()
            }
        }
    }
}

/// One occurrence where a name is used rather than declared, paired with
/// the qualified name it resolved to.
#[derive(Debug, Clone)]
pub struct Reference {
    /// Resolved qualified name of the target entity.
    pub target: String,
    pub file: String,
    pub range: Range,
    /// Scope the occurrence was resolved from.
    pub scope: String,
}

/// A recorded mixin inclusion (`include`/`extend`/`prepend`), used only
/// as a resolution fallback.
#[derive(Debug, Clone)]
pub struct AncestorEdge {
    pub scope: String,
    pub ancestor: String,
}
