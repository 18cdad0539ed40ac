// intern.rs
//
// String interning for Symbol IDs.

use std::hash::BuildHasher;

use rustc_hash::FxBuildHasher;

use crate::Symbol;

/// Interns strings to unique Symbol IDs.
///
/// Interning is append-only: a clone taken at snapshot-freeze time can still
/// resolve every symbol issued up to that point.
#[derive(Debug, Clone)]
pub struct Interner {
    map: hashbrown::HashMap<String, Symbol, FxBuildHasher>,
    strings: Vec<String>,
}

impl Default for Interner {
    fn default() -> Self {
        Self {
            map: hashbrown::HashMap::with_hasher(FxBuildHasher),
            strings: Vec::new(),
        }
    }
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        use hashbrown::hash_map::RawEntryMut;

        // Hash once, reuse for both lookup and insert.
        let hash = self.map.hasher().hash_one(s);

        match self.map.raw_entry_mut().from_hash(hash, |k| k == s) {
            RawEntryMut::Occupied(e) => *e.get(),
            RawEntryMut::Vacant(e) => {
                let sym = Symbol::new(self.strings.len() as u32);
                let owned = s.to_string();
                self.strings.push(owned.clone());
                e.insert_hashed_nocheck(hash, owned, sym);
                sym
            }
        }
    }

    /// Resolve a symbol to its string. Panics if the symbol was issued by a
    /// newer interner generation than this one.
    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.strings[sym.index() as usize]
    }

    /// Resolve a symbol that may have been issued after this interner was
    /// cloned. Returns None rather than panicking.
    pub fn try_resolve(&self, sym: Symbol) -> Option<&str> {
        self.strings.get(sym.index() as usize).map(String::as_str)
    }

    /// Look up a string to get its symbol, if it has been interned.
    pub fn lookup(&self, s: &str) -> Option<Symbol> {
        self.map.get(s).copied()
    }

    /// Returns the number of interned strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns true if no strings have been interned.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_returns_same_symbol() {
        let mut interner = Interner::new();
        let a = interner.intern("add");
        let b = interner.intern("add");
        assert_eq!(a, b);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn distinct_strings_get_distinct_symbols() {
        let mut interner = Interner::new();
        let a = interner.intern("get");
        let b = interner.intern("set");
        assert_ne!(a, b);
        assert_eq!(interner.resolve(a), "get");
        assert_eq!(interner.resolve(b), "set");
    }

    #[test]
    fn clone_resolves_earlier_symbols() {
        let mut interner = Interner::new();
        let a = interner.intern("before");
        let frozen = interner.clone();
        let b = interner.intern("after");

        assert_eq!(frozen.resolve(a), "before");
        assert_eq!(frozen.try_resolve(b), None);
    }

    #[test]
    fn lookup_without_interning() {
        let mut interner = Interner::new();
        assert_eq!(interner.lookup("missing"), None);
        let sym = interner.intern("present");
        assert_eq!(interner.lookup("present"), Some(sym));
    }
}
