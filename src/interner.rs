//! String interning.
//!
//! Property names, type alias names and module prefixes are interned into
//! `Atom` handles so that the solver's hot paths compare and hash `u32`s
//! instead of strings.

use rustc_hash::FxHashMap;
use serde::Serialize;

/// A handle to an interned string. Equality is O(1).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Atom(pub u32);

impl Atom {
    /// The empty string. Interning `""` always yields this.
    pub const NONE: Atom = Atom(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

/// Owning intern table. One per solver instance; not thread-safe by design.
pub struct Interner {
    strings: Vec<String>,
    map: FxHashMap<String, Atom>,
}

impl Interner {
    pub fn new() -> Self {
        let mut interner = Interner {
            strings: Vec::new(),
            map: FxHashMap::default(),
        };
        // Slot 0 is reserved for the empty string so that Atom::NONE resolves.
        let empty = interner.intern("");
        debug_assert_eq!(empty, Atom::NONE);
        interner
    }

    /// Intern a string, returning its stable handle.
    pub fn intern(&mut self, s: &str) -> Atom {
        if let Some(&atom) = self.map.get(s) {
            return atom;
        }
        let atom = Atom(self.strings.len() as u32);
        self.strings.push(s.to_string());
        self.map.insert(s.to_string(), atom);
        atom
    }

    /// Resolve a handle back to its string.
    pub fn resolve(&self, atom: Atom) -> &str {
        &self.strings[atom.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}
