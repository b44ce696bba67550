//! Type representation for the constraint solver.
//!
//! Types are represented as lightweight `TypeId` / `TypePackId` handles that
//! point into the `TypeArena`. The actual structure is stored in `Type` and
//! `TypePack` nodes, which the solver mutates in place as inference
//! progresses.
//!
//! # Sentinel Value Semantics
//!
//! A handful of singleton nodes are pre-allocated by `TypeArena::new` at
//! fixed indices and shared by every consumer:
//!
//! ## `TypeId::ERROR`
//! The error-recovery type. Bound at any site where inference failed
//! structurally (unknown alias, occurs violation, illegal require). ERROR is
//! contagious by convention: operations on it produce ERROR without further
//! diagnostics, so one root cause does not cascade.
//!
//! ## `TypeId::ANY`
//! Gradual typing's escape hatch. Property access and calls on ANY succeed
//! and produce ANY.
//!
//! ## `TypeId::UNKNOWN` / `TypeId::NEVER`
//! Top and bottom. A fresh free type starts with bounds `[NEVER, UNKNOWN]`.
//!
//! ## `TypeId::NIL`
//! The unit type of the language; also what over-long unpack targets are
//! filled with.

use crate::interner::{Atom, Interner};
use crate::scope::ScopeId;
use crate::solver::constraint::ConstraintId;
use bitflags::bitflags;
use rustc_hash::FxHashMap;
use serde::Serialize;

/// A lightweight handle to a type node in the arena.
/// Equality is O(1) — it compares indices, not structure. Two structurally
/// identical nodes are distinct types to the solver; identity is what the
/// blocking index and the binding discipline operate on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Error-recovery sentinel. See module docs.
    pub const ERROR: TypeId = TypeId(0);

    /// The bottom type.
    pub const NEVER: TypeId = TypeId(1);

    /// The top type.
    pub const UNKNOWN: TypeId = TypeId(2);

    /// The gradual type; opts out of checking.
    pub const ANY: TypeId = TypeId(3);

    /// The `nil` type.
    pub const NIL: TypeId = TypeId(4);

    /// The `boolean` primitive.
    pub const BOOLEAN: TypeId = TypeId(5);

    /// The `number` primitive.
    pub const NUMBER: TypeId = TypeId(6);

    /// The `string` primitive.
    pub const STRING: TypeId = TypeId(7);

    /// The `table` primitive (the type of all tables, not any specific one).
    pub const TABLE: TypeId = TypeId(8);

    /// The `true` singleton.
    pub const TRUE: TypeId = TypeId(9);

    /// The `false` singleton.
    pub const FALSE: TypeId = TypeId(10);

    /// First index handed out for non-singleton allocations.
    pub const FIRST_USER: u32 = 16;

    pub fn is_error(self) -> bool {
        self == Self::ERROR
    }

    pub fn is_any(self) -> bool {
        self == Self::ANY
    }

    pub fn is_never(self) -> bool {
        self == Self::NEVER
    }

    pub fn is_unknown(self) -> bool {
        self == Self::UNKNOWN
    }
}

/// A lightweight handle to a type pack node in the arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypePackId(pub u32);

impl TypePackId {
    /// The error-recovery pack: every element reads as `ERROR`.
    pub const ERROR: TypePackId = TypePackId(0);

    /// `...any`.
    pub const ANY: TypePackId = TypePackId(1);

    /// `...never`.
    pub const NEVER: TypePackId = TypePackId(2);

    /// `...unknown`.
    pub const UNKNOWN: TypePackId = TypePackId(3);

    /// The empty pack `()`.
    pub const EMPTY: TypePackId = TypePackId(4);

    /// First index handed out for non-singleton allocations.
    pub const FIRST_USER: u32 = 8;

    pub fn is_error(self) -> bool {
        self == Self::ERROR
    }
}

/// The structure of a type node.
#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    /// Built-in ground primitives (`boolean`, `number`, `string`, `table`),
    /// optionally carrying an attached metatable (the string library, say).
    Primitive(PrimitiveType),
    /// Literal singleton types: `true`, `false`, `"tag"`.
    Singleton(SingletonType),
    Function(FunctionType),
    Table(TableType),
    /// A table paired with its metatable.
    Metatable(MetatableType),
    /// Host-defined nominal class.
    Class(ClassType),
    Union(Vec<TypeId>),
    Intersection(Vec<TypeId>),
    Never,
    Any,
    Unknown,
    Error,
    Nil,
    /// A quantified type variable introduced by generalization.
    Generic(GenericType),
    /// An unknown being narrowed from both sides; see `FreeType`.
    Free(FreeType),
    /// A placeholder awaiting a single committing binding from its owner.
    Blocked(BlockedType),
    /// An unexpanded reference to a parametric type alias.
    PendingExpansion(PendingExpansionType),
    /// A deferred type-level computation, reduced by a `Reduce` constraint.
    FamilyInstance(FamilyInstanceType),
    /// A single-assignment local accumulating its domain; see `LocalType`.
    Local(LocalType),
    /// Indirection to another node. The only variant the solver introduces
    /// in place of a placeholder; all reads chase these via `follow`.
    Bound(TypeId),
}

/// The structure of a type pack node.
#[derive(Clone, Debug, PartialEq)]
pub enum TypePack {
    /// A concrete pack: some head types and an optional tail pack.
    Pack {
        head: Vec<TypeId>,
        tail: Option<TypePackId>,
    },
    /// Zero or more repetitions of one type (`...T`).
    Variadic(TypeId),
    /// A pack-shaped unknown.
    Free(FreePack),
    /// A quantified pack variable.
    Generic(GenericPack),
    /// A pack placeholder awaiting its owner's binding.
    Blocked(BlockedPack),
    /// A deferred pack-level computation.
    FamilyInstance(FamilyInstancePack),
    /// The error-recovery pack.
    Error,
    /// Indirection to another pack node.
    Bound(TypePackId),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Number,
    String,
    Table,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PrimitiveType {
    pub kind: PrimitiveKind,
    /// Some primitives carry a metatable (`string` values do).
    pub metatable: Option<TypeId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SingletonType {
    Boolean(bool),
    String(Atom),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionType {
    /// Generic types this function is quantified over.
    pub generics: Vec<TypeId>,
    /// Generic packs this function is quantified over.
    pub generic_packs: Vec<TypePackId>,
    pub arg_types: TypePackId,
    pub ret_types: TypePackId,
}

/// Mutability discipline for tables.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TableState {
    /// An inferred table still collecting properties from use sites.
    Free,
    /// A literal table that admits new string-keyed properties.
    Unsealed,
    /// A finished table; its shape is fixed.
    Sealed,
    /// A table quantified inside a generic function.
    Generic,
}

bitflags! {
    #[derive(Default, Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct TableFlags: u32 {
        /// Set by the generator on tables born from table-literal
        /// expressions; the literal matcher keys bidirectional inference
        /// off this.
        const FRESH_LITERAL = 1 << 0;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableType {
    pub props: FxHashMap<Atom, Property>,
    pub indexer: Option<TableIndexer>,
    pub state: TableState,
    pub scope: ScopeId,
    pub flags: TableFlags,
    /// The user-visible alias name, once a `Name` constraint stamps one.
    pub name: Option<Atom>,
    /// A fallback display name for anonymous tables.
    pub synthetic_name: Option<Atom>,
    /// Arguments this table was instantiated with, for rendering `T<number>`.
    pub instantiated_type_params: Vec<TypeId>,
    pub instantiated_pack_params: Vec<TypePackId>,
}

impl TableType {
    pub fn new(state: TableState, scope: ScopeId) -> Self {
        TableType {
            props: FxHashMap::default(),
            indexer: None,
            state,
            scope,
            flags: TableFlags::empty(),
            name: None,
            synthetic_name: None,
            instantiated_type_params: Vec::new(),
            instantiated_pack_params: Vec::new(),
        }
    }
}

/// A property with a read/write split. Most properties are read-write with
/// both sides equal; read-only and write-only properties leave one side out.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Property {
    pub read_ty: Option<TypeId>,
    pub write_ty: Option<TypeId>,
}

impl Property {
    pub fn rw(ty: TypeId) -> Self {
        Property {
            read_ty: Some(ty),
            write_ty: Some(ty),
        }
    }

    pub fn readonly(ty: TypeId) -> Self {
        Property {
            read_ty: Some(ty),
            write_ty: None,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_ty.is_some() && self.write_ty.is_none()
    }

    /// The canonical type of the property for contexts that do not care
    /// about the read/write split.
    pub fn ty(&self) -> Option<TypeId> {
        self.read_ty.or(self.write_ty)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableIndexer {
    pub key_type: TypeId,
    pub value_type: TypeId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MetatableType {
    pub table: TypeId,
    pub metatable: TypeId,
    pub synthetic_name: Option<Atom>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassType {
    pub name: Atom,
    pub props: FxHashMap<Atom, Property>,
    pub indexer: Option<TableIndexer>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericType {
    pub name: Atom,
}

/// A type being solved for. Its bounds are monotone: `lower_bound` only ever
/// widens (via union) and `upper_bound` only ever narrows (via
/// intersection). A free type is committed by generalization or by a
/// `PrimitiveType` constraint, never by ordinary unification.
#[derive(Clone, Debug, PartialEq)]
pub struct FreeType {
    pub scope: ScopeId,
    pub lower_bound: TypeId,
    pub upper_bound: TypeId,
}

/// A placeholder that exactly one constraint is allowed to bind.
///
/// `owner == None` relaxes the discipline: any constraint may bind it. This
/// is the arena's only mutation rule for placeholders; everything else is
/// either a fresh allocation or a monotone bound update on a `FreeType`.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockedType {
    pub owner: Option<ConstraintId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PendingExpansionType {
    /// Import prefix for qualified references (`Dep.Shape`).
    pub prefix: Option<Atom>,
    pub name: Atom,
    pub type_arguments: Vec<TypeId>,
    pub pack_arguments: Vec<TypePackId>,
}

/// The built-in type families. A family instance is a *deferred* application
/// of one of these; the reducer turns it into a concrete type once its
/// arguments are known.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    Union,
    Intersect,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FamilyInstanceType {
    pub family: TypeFamily,
    pub type_args: Vec<TypeId>,
    pub pack_args: Vec<TypePackId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FamilyInstancePack {
    pub family: TypeFamily,
    pub type_args: Vec<TypeId>,
    pub pack_args: Vec<TypePackId>,
}

/// A local binding with a definite-assignment count. Each assignment widens
/// `domain` and decrements `block_count`; at zero the node is bound to its
/// accumulated domain.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalType {
    pub domain: TypeId,
    pub block_count: u32,
    /// The local's source name, for diagnostics.
    pub name: Atom,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FreePack {
    pub scope: ScopeId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericPack {
    pub name: Atom,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockedPack {
    pub owner: Option<ConstraintId>,
}

/// A named, possibly parametric type alias as recorded in a scope:
/// `type Pair<A, B = A> = {first: A, second: B}`.
#[derive(Clone, Debug)]
pub struct TypeAlias {
    pub type_params: Vec<GenericTypeParam>,
    pub pack_params: Vec<GenericPackParam>,
    /// The alias body; generic parameter nodes appear inside it.
    pub ty: TypeId,
}

#[derive(Clone, Debug)]
pub struct GenericTypeParam {
    /// The `Generic` node standing for this parameter inside the body.
    pub ty: TypeId,
    pub default: Option<TypeId>,
}

#[derive(Clone, Debug)]
pub struct GenericPackParam {
    pub tp: TypePackId,
    pub default: Option<TypePackId>,
}

/// Interned atoms for the metamethod names the solver consults.
#[derive(Copy, Clone, Debug)]
pub struct Metamethods {
    /// `__index`: fallback for missing properties.
    pub index: Atom,
    /// `__iter`: produces the iterator triple for `for ... in`.
    pub iter: Atom,
    /// `__call`: makes a table callable.
    pub call: Atom,
}

impl Metamethods {
    pub fn intern(interner: &mut Interner) -> Self {
        Metamethods {
            index: interner.intern("__index"),
            iter: interner.intern("__iter"),
            call: interner.intern("__call"),
        }
    }
}

/// Whether a property access reads or writes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueContext {
    RValue,
    LValue,
}

#[cfg(test)]
#[path = "tests/types_tests.rs"]
mod tests;
