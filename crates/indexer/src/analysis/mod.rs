pub mod declarations;
pub mod references;
pub mod symbol_table;
pub mod types;

pub use declarations::{CollectedFile, collect_declarations};
pub use references::{Candidate, ResolvedReferences, collect_references, method_call_candidates};
pub use symbol_table::{ResolutionPolicy, SymbolTable};
pub use types::{
    AncestorEdge, Declaration, DeclarationKind, Position, Range, Reference, Visibility,
};
