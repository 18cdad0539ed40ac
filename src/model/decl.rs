// src/model/decl.rs
//
// Declaration definitions and structural paths.
//
// A Decl is the live, snapshot-bound view of a declaration: it is owned by
// the snapshot that produced it, never by the references pointing at it.
// DeclPath is the snapshot-independent structural identity used for
// cross-snapshot translation, reference equality, and serialized ids.

use std::sync::Arc;

use smallvec::SmallVec;
use weft_identity::{DeclId, Interner, SnapshotId, Symbol};

use crate::model::snapshot::Snapshot;
use crate::model::types::{TypeId, TypeTable};
use crate::reference::{AnyDecl, DeclRef, ParamDecl, TypeDecl};
use crate::{LazyDeclList, MemberLookup};

/// What kind of declaration this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    Module,
    Type,
    Method,
    Field,
    Property,
    Parameter,
}

impl DeclKind {
    pub fn describe(self) -> &'static str {
        match self {
            DeclKind::Module => "module",
            DeclKind::Type => "type",
            DeclKind::Method => "method",
            DeclKind::Field => "field",
            DeclKind::Property => "property",
            DeclKind::Parameter => "parameter",
        }
    }

    /// Tag letter used in serialized ids.
    pub(crate) fn tag(self) -> char {
        match self {
            DeclKind::Module => 'N',
            DeclKind::Type => 'T',
            DeclKind::Method => 'M',
            DeclKind::Field => 'F',
            DeclKind::Property => 'P',
            DeclKind::Parameter => 'A',
        }
    }
}

/// How a parameter is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Value,
    Ref,
    Out,
}

/// One declared parameter of a method-shaped declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Param {
    pub name: Symbol,
    pub ty: TypeId,
    pub ref_kind: RefKind,
    /// A variadic (rest) parameter absorbs extra trailing arguments. It must
    /// be the last declared parameter and array-shaped.
    pub is_variadic: bool,
}

impl Param {
    pub fn by_value(name: Symbol, ty: TypeId) -> Self {
        Self {
            name,
            ty,
            ref_kind: RefKind::Value,
            is_variadic: false,
        }
    }

    pub fn variadic(name: Symbol, ty: TypeId) -> Self {
        Self {
            name,
            ty,
            ref_kind: RefKind::Value,
            is_variadic: true,
        }
    }
}

/// Shape of a method-like declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: SmallVec<[Param; 4]>,
    pub return_ty: TypeId,
    pub generic_arity: u32,
    pub is_static: bool,
}

impl Signature {
    pub fn new(params: impl IntoIterator<Item = Param>, return_ty: TypeId) -> Self {
        Self {
            params: params.into_iter().collect(),
            return_ty,
            generic_arity: 0,
            is_static: false,
        }
    }

    pub fn with_generic_arity(mut self, arity: u32) -> Self {
        self.generic_arity = arity;
        self
    }

    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn param_types(&self) -> SmallVec<[TypeId; 4]> {
        self.params.iter().map(|p| p.ty).collect()
    }

    /// Positional (type, ref-kind) pairs, the overload identity of the
    /// signature.
    pub fn param_keys(&self) -> SmallVec<[(TypeId, RefKind); 4]> {
        self.params.iter().map(|p| (p.ty, p.ref_kind)).collect()
    }
}

/// Position of a parameter declaration within its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamSlot {
    Positional(u32),
    /// The method's return slot, addressed by the `ReturnSlot` facet.
    Return,
}

/// Snapshot-independent structural identity of a declaration.
///
/// Two snapshots derived from the same origin agree on the path of "the
/// same" declaration, which is what makes handle translation and
/// snapshot-independent reference equality possible. Method paths carry
/// their parameter types to keep overloads apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclPath {
    pub segments: SmallVec<[Symbol; 4]>,
    pub kind: DeclKind,
    /// Overload disambiguator: the positional parameter types and ref-kinds
    /// of a method path.
    pub overload: Option<SmallVec<[(TypeId, RefKind); 4]>>,
    /// Parameter position for parameter-kind paths.
    pub slot: Option<ParamSlot>,
}

impl DeclPath {
    pub fn new(kind: DeclKind, segments: impl IntoIterator<Item = Symbol>) -> Self {
        Self {
            segments: segments.into_iter().collect(),
            kind,
            overload: None,
            slot: None,
        }
    }

    pub fn child(&self, kind: DeclKind, name: Symbol) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name);
        Self {
            segments,
            kind,
            overload: None,
            slot: None,
        }
    }

    pub fn with_overload(
        mut self,
        param_keys: impl IntoIterator<Item = (TypeId, RefKind)>,
    ) -> Self {
        self.overload = Some(param_keys.into_iter().collect());
        self
    }

    pub fn parameter(&self, slot: ParamSlot, name: Symbol) -> Self {
        let mut path = match slot {
            ParamSlot::Positional(_) => self.child(DeclKind::Parameter, name),
            // The return slot keeps the parent's segments; the slot alone
            // distinguishes it.
            ParamSlot::Return => {
                let mut p = self.clone();
                p.kind = DeclKind::Parameter;
                p
            }
        };
        path.overload = self.overload.clone();
        path.slot = Some(slot);
        path
    }

    /// The declaration's own (final) name segment.
    pub fn name(&self) -> Symbol {
        *self
            .segments
            .last()
            .expect("a declaration path always has at least one segment")
    }

    /// Render the opaque serialized-id form, e.g.
    /// `M:main.Calculator.add(int,int)` or `A:main.Calculator.add.lhs(int)@0`.
    pub fn render(&self, names: &Interner, types: &TypeTable) -> String {
        let mut out = String::new();
        out.push(self.kind.tag());
        out.push(':');
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push_str(names.try_resolve(*segment).unwrap_or("<unknown>"));
        }
        if let Some(overload) = &self.overload {
            out.push('(');
            for (i, (ty, ref_kind)) in overload.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                match ref_kind {
                    RefKind::Value => {}
                    RefKind::Ref => out.push('&'),
                    RefKind::Out => out.push('^'),
                }
                out.push_str(&types.display(*ty, names));
            }
            out.push(')');
        }
        match self.slot {
            Some(ParamSlot::Positional(index)) => {
                out.push('@');
                out.push_str(&index.to_string());
            }
            Some(ParamSlot::Return) => out.push_str("@ret"),
            None => {}
        }
        out
    }
}

/// A live declaration, owned by its snapshot.
pub type Decl = Arc<DeclData>;

/// The materialized form of a declaration within one snapshot.
///
/// The table is uniform across kinds; kind-specific payloads are optional
/// fields. Member and parameter lists hold references, not declarations, so
/// they stay valid while later snapshots are derived.
#[derive(Debug, Clone)]
pub struct DeclData {
    /// Handle within the owning snapshot's declaration table.
    pub id: DeclId,
    /// The snapshot this view is bound to.
    pub snapshot: SnapshotId,
    pub kind: DeclKind,
    pub name: Symbol,
    pub path: DeclPath,

    /// Method shape, for method-kind declarations.
    pub signature: Option<Signature>,
    /// Stored type, for field and property declarations.
    pub ty: Option<TypeId>,
    /// Base type link, for type-kind declarations.
    pub base: Option<DeclRef<TypeDecl>>,
    /// Member references in declaration order, for container kinds.
    pub members: Vec<DeclRef<AnyDecl>>,
    /// Parameter references in positional order, for method declarations.
    pub params: Vec<DeclRef<ParamDecl>>,
    /// The synthesized return-slot declaration of a method.
    pub return_slot: Option<DeclId>,
    /// The synthesized backing field of an auto-implemented property.
    pub backing_field: Option<DeclId>,
    /// The synthesized setter value parameter of a writable property.
    pub setter_param: Option<DeclId>,
    /// Own parameter payload, for parameter-kind declarations.
    pub param: Option<Param>,
}

impl DeclData {
    pub fn is_method(&self) -> bool {
        self.kind == DeclKind::Method
    }

    /// The members of this declaration as a lazily resolving list bound to
    /// `snapshot`.
    pub fn members<'s>(&self, snapshot: &'s Snapshot) -> LazyDeclList<'s, AnyDecl> {
        LazyDeclList::new(snapshot, self.members.iter().cloned())
    }

    /// The parameters of this method as a lazily resolving list bound to
    /// `snapshot`.
    pub fn parameters<'s>(&self, snapshot: &'s Snapshot) -> LazyDeclList<'s, ParamDecl> {
        LazyDeclList::new(snapshot, self.params.iter().cloned())
    }

    /// Signature-based lookup over this type's methods.
    pub fn method_lookup<'s>(self: Arc<Self>, snapshot: &'s Snapshot) -> MemberLookup<'s> {
        MemberLookup::new(snapshot, self)
    }
}
