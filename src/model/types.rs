// src/model/types.rs
//
// Interned structural types with TypeId handles for O(1) equality.
//
// The table is owned by the Program and shared (as a frozen clone) by every
// snapshot derived from it, so TypeIds compare across snapshots the same way
// Symbols do.

use rustc_hash::FxHashMap;
use weft_identity::{Interner, Symbol};

/// Handle to an interned type. Copy, trivial Eq/Hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    // Reserved TypeIds, guaranteed to be interned at these indices by
    // TypeTable::new().
    pub const VOID: TypeId = TypeId(0);
    pub const BOOL: TypeId = TypeId(1);
    pub const INT: TypeId = TypeId(2);
    pub const LONG: TypeId = TypeId(3);
    pub const DOUBLE: TypeId = TypeId(4);
    pub const STRING: TypeId = TypeId(5);

    /// First non-reserved index.
    const FIRST_DYNAMIC: u32 = 6;

    pub fn index(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_reserved(self) -> bool {
        self.0 < Self::FIRST_DYNAMIC
    }
}

/// Structural shape of an interned type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    /// A built-in scalar, addressed through the reserved TypeId constants.
    Primitive(&'static str),
    /// A nominal type, identified by its qualified name symbol.
    Named(Symbol),
    /// An array of the element type. A trailing variadic parameter must be
    /// array-shaped; its element type drives variadic argument matching.
    Array(TypeId),
}

/// Per-program type storage with automatic deduplication.
#[derive(Debug, Clone)]
pub struct TypeTable {
    tys: Vec<Ty>,
    lookup: FxHashMap<Ty, TypeId>,
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = Self {
            tys: Vec::new(),
            lookup: FxHashMap::default(),
        };
        for name in ["void", "bool", "int", "long", "double", "string"] {
            table.intern(Ty::Primitive(name));
        }
        debug_assert_eq!(table.tys.len() as u32, TypeId::FIRST_DYNAMIC);
        table
    }

    pub fn intern(&mut self, ty: Ty) -> TypeId {
        if let Some(&id) = self.lookup.get(&ty) {
            return id;
        }
        let id = TypeId(self.tys.len() as u32);
        self.tys.push(ty.clone());
        self.lookup.insert(ty, id);
        id
    }

    pub fn get(&self, id: TypeId) -> &Ty {
        &self.tys[id.index() as usize]
    }

    /// Intern a nominal type by name symbol.
    pub fn named(&mut self, name: Symbol) -> TypeId {
        self.intern(Ty::Named(name))
    }

    /// Intern an array of `element`.
    pub fn array(&mut self, element: TypeId) -> TypeId {
        self.intern(Ty::Array(element))
    }

    #[inline]
    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(self.get(id), Ty::Array(_))
    }

    /// The element type of an array, or None for non-array types.
    pub fn element_of(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            Ty::Array(element) => Some(*element),
            _ => None,
        }
    }

    /// Render a type for serialized ids and error messages.
    pub fn display(&self, id: TypeId, names: &Interner) -> String {
        match self.get(id) {
            Ty::Primitive(name) => (*name).to_string(),
            Ty::Named(sym) => names
                .try_resolve(*sym)
                .unwrap_or("<unknown>")
                .to_string(),
            Ty::Array(element) => format!("{}[]", self.display(*element, names)),
        }
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}
