//! Module resolution seam.
//!
//! The solver never loads files. When a constraint needs the type surface of
//! another module (a `require`), it asks the embedder-provided resolver for
//! the already-checked module and takes the first type of its return pack.

use crate::diagnostics::ModuleName;
use crate::solver::types::TypePackId;
use crate::span::Span;

/// What kind of source a resolved module came from. Only `Module` sources
/// may be required; requiring a script or REPL chunk is an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Module,
    Script,
}

/// The checked surface of another module, as the solver sees it.
#[derive(Clone, Debug)]
pub struct ResolvedModule {
    /// The pack of types the module returns.
    pub return_type: TypePackId,
    pub source_kind: SourceKind,
    pub human_readable_name: String,
}

/// Resolves module names to checked modules.
pub trait ModuleResolver {
    /// The checked module for `name`, if it has been checked.
    fn get_module(&self, name: &str) -> Option<ResolvedModule>;

    /// Whether `name` corresponds to a module at all (checked or not).
    fn module_exists(&self, name: &str) -> bool;

    /// A display name for diagnostics.
    fn human_readable_name(&self, name: &str) -> String;
}

/// A reference to a module as it appears at a require site.
#[derive(Clone, Debug, Default)]
pub struct ModuleRef {
    /// Resolved module name; empty when the argument could not be resolved.
    pub name: ModuleName,
    /// Optional requires do not report when the module is missing.
    pub optional: bool,
}

/// One known require cycle: the span of the offending require and the module
/// path that closes the loop. Cycles are detected up front by the driver;
/// the solver only consults the list.
#[derive(Clone, Debug)]
pub struct RequireCycle {
    pub span: Span,
    pub path: Vec<ModuleName>,
}
