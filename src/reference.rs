// src/reference.rs
//
// Snapshot-independent declaration references.
//
// A DeclRef is a cheap, copyable, comparable handle to "a declaration" that
// survives the program's snapshot being re-derived. Separating what is
// referenced (the structural path, a builder identity, a serialized id) from
// the snapshot it was last seen against is what lets references live on
// long-lived declaration objects while the snapshot underneath churns with
// every transformation pass.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use weft_identity::{DeclId, SnapshotId, Symbol};

use crate::errors::{ResolveError, ResolveResult};
use crate::model::builder::DeclBuilder;
use crate::model::decl::{Decl, DeclData, DeclKind, DeclPath};
use crate::model::snapshot::Snapshot;

/// Typed view marker for a reference. Casting between markers is a pure
/// relabeling; the declared kind is validated when the reference resolves.
pub trait DeclMarker {
    /// Describes the view for kind-mismatch errors.
    const DESCRIPTION: &'static str;

    fn admits(kind: DeclKind) -> bool;
}

macro_rules! decl_marker {
    ($name:ident, $description:literal, $pattern:pat) => {
        #[doc = concat!("Typed view over ", $description, " declarations.")]
        pub enum $name {}

        impl DeclMarker for $name {
            const DESCRIPTION: &'static str = $description;

            fn admits(kind: DeclKind) -> bool {
                matches!(kind, $pattern)
            }
        }
    };
}

decl_marker!(AnyDecl, "any", _);
decl_marker!(ModuleDecl, "module", DeclKind::Module);
decl_marker!(TypeDecl, "type", DeclKind::Type);
decl_marker!(MethodDecl, "method", DeclKind::Method);
decl_marker!(FieldDecl, "field", DeclKind::Field);
decl_marker!(PropertyDecl, "property", DeclKind::Property);
decl_marker!(ParamDecl, "parameter", DeclKind::Parameter);

/// Which projection of the target a reference denotes. A single symbol
/// handle cannot express "the backing storage of this property" versus "the
/// property itself"; the facet disambiguates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefFacet {
    Default,
    /// The method's return slot.
    ReturnSlot,
    /// The root module itself; pairs only with the root target.
    Module,
    /// The compilation root itself; pairs only with the root target.
    Assembly,
    /// The backing field synthesized for an auto-implemented property.
    PropertyField,
    /// The setter's value parameter of a writable property.
    AccessorParam,
}

impl RefFacet {
    /// The declaration category a symbol target must have for this facet.
    /// None means the facet never pairs with a symbol target.
    fn required_kind(self) -> Option<&'static str> {
        match self {
            RefFacet::Default => Some("any"),
            RefFacet::ReturnSlot => Some("method"),
            RefFacet::PropertyField | RefFacet::AccessorParam => Some("property"),
            RefFacet::Module | RefFacet::Assembly => None,
        }
    }

    fn compatible_with(self, kind: DeclKind) -> bool {
        match self {
            RefFacet::Default => true,
            RefFacet::ReturnSlot => kind == DeclKind::Method,
            RefFacet::PropertyField | RefFacet::AccessorParam => kind == DeclKind::Property,
            RefFacet::Module | RefFacet::Assembly => false,
        }
    }
}

/// What a reference points at. Exactly one variant is populated for the
/// lifetime of the reference.
#[derive(Debug, Clone)]
pub enum RefTarget {
    /// A snapshot-minted symbol handle plus the structural path that lets it
    /// be translated into other snapshots.
    Symbol {
        id: DeclId,
        origin: SnapshotId,
        path: DeclPath,
    },
    /// A not-yet-committed builder, resolved by identity.
    Builder(Arc<DeclBuilder>),
    /// An opaque textual declaration id, for cross-session persistence.
    Serialized(String),
    /// The compilation root; which projection is taken depends on the facet.
    Root,
}

/// An immutable, snapshot-independent handle to a declaration.
pub struct DeclRef<K: DeclMarker = AnyDecl> {
    target: RefTarget,
    facet: RefFacet,
    _marker: PhantomData<fn() -> K>,
}

impl DeclRef<AnyDecl> {
    /// Wrap a snapshot-bound declaration with the default facet. Infallible:
    /// every declaration category admits the default facet.
    pub fn from_decl(decl: &DeclData) -> Self {
        Self {
            target: RefTarget::Symbol {
                id: decl.id,
                origin: decl.snapshot,
                path: decl.path.clone(),
            },
            facet: RefFacet::Default,
            _marker: PhantomData,
        }
    }

    /// Wrap a snapshot-bound declaration with an explicit facet.
    pub fn from_symbol(decl: &DeclData, facet: RefFacet) -> ResolveResult<Self> {
        if !facet.compatible_with(decl.kind) {
            return Err(ResolveError::KindMismatch {
                expected: facet.required_kind().unwrap_or("root"),
                found: decl.kind.describe(),
            });
        }
        let mut reference = Self::from_decl(decl);
        reference.facet = facet;
        Ok(reference)
    }

    /// Wrap a not-yet-committed builder. No snapshot binding is needed:
    /// builders are resolved by identity, not by symbol-table lookup.
    pub fn from_builder(builder: Arc<DeclBuilder>) -> Self {
        Self {
            target: RefTarget::Builder(builder),
            facet: RefFacet::Default,
            _marker: PhantomData,
        }
    }

    /// Wrap a serialized textual id produced by [`DeclRef::serialized_id`]
    /// in an earlier session.
    pub fn from_serialized_id(id: impl Into<String>) -> Self {
        Self {
            target: RefTarget::Serialized(id.into()),
            facet: RefFacet::Default,
            _marker: PhantomData,
        }
    }

    /// A reference to the compilation root itself.
    pub fn compilation_root() -> Self {
        Self {
            target: RefTarget::Root,
            facet: RefFacet::Assembly,
            _marker: PhantomData,
        }
    }

    /// A reference to the root module.
    pub fn root_module() -> Self {
        Self {
            target: RefTarget::Root,
            facet: RefFacet::Module,
            _marker: PhantomData,
        }
    }
}

impl<K: DeclMarker> DeclRef<K> {
    /// Reinterpret this reference under another typed view. A pure
    /// relabeling of the stored target, never a resolution; kind validity is
    /// checked when the reference resolves.
    pub fn cast<K2: DeclMarker>(self) -> DeclRef<K2> {
        DeclRef {
            target: self.target,
            facet: self.facet,
            _marker: PhantomData,
        }
    }

    pub fn target(&self) -> &RefTarget {
        &self.target
    }

    pub fn facet(&self) -> RefFacet {
        self.facet
    }

    /// The snapshot this reference's symbol handle was minted against.
    pub fn origin(&self) -> Option<SnapshotId> {
        match &self.target {
            RefTarget::Symbol { origin, .. } => Some(*origin),
            _ => None,
        }
    }

    /// The referenced declaration's name, without resolving. Serialized and
    /// root targets expose no cheap name.
    pub fn name(&self) -> Option<Symbol> {
        match &self.target {
            RefTarget::Symbol { path, .. } => Some(path.name()),
            RefTarget::Builder(builder) => Some(builder.name()),
            RefTarget::Serialized(_) | RefTarget::Root => None,
        }
    }

    /// The declaration kind this reference will resolve to, if it is known
    /// without resolving.
    pub fn kind_hint(&self) -> Option<DeclKind> {
        match self.facet {
            RefFacet::ReturnSlot | RefFacet::AccessorParam => Some(DeclKind::Parameter),
            RefFacet::PropertyField => Some(DeclKind::Field),
            RefFacet::Module | RefFacet::Assembly => Some(DeclKind::Module),
            RefFacet::Default => match &self.target {
                RefTarget::Symbol { path, .. } => Some(path.kind),
                RefTarget::Builder(builder) => Some(builder.kind()),
                RefTarget::Serialized(_) | RefTarget::Root => None,
            },
        }
    }

    /// Whether this reference's target is permanently dead in `snapshot`:
    /// a discarded builder, or a symbol whose declaration no longer exists
    /// there. Lazy collections use this for their one-time construction
    /// filter.
    pub fn is_dead(&self, snapshot: &Snapshot) -> bool {
        match &self.target {
            RefTarget::Builder(builder) => builder.is_discarded(),
            RefTarget::Symbol { id, origin, path } => {
                if *origin == snapshot.id() {
                    snapshot.decl(*id).is_none()
                } else {
                    snapshot.decl_by_path(path).is_none()
                }
            }
            RefTarget::Serialized(_) | RefTarget::Root => false,
        }
    }

    /// Resolve this reference into the live declaration bound to `snapshot`.
    ///
    /// The returned declaration is owned by the snapshot, never by the
    /// reference. Resolution is synchronous and lock-free; it may do
    /// moderate work (translating a handle between snapshots) but performs
    /// no I/O and takes no locks.
    pub fn resolve(&self, snapshot: &Snapshot) -> ResolveResult<Decl> {
        let decl = match &self.target {
            RefTarget::Root => match self.facet {
                RefFacet::Module | RefFacet::Assembly => Arc::clone(snapshot.root_module()),
                _ => {
                    return Err(ResolveError::Unresolvable {
                        target: "the root target without a root facet".to_string(),
                    });
                }
            },
            RefTarget::Symbol { id, origin, path } => {
                let base = if *origin == snapshot.id() {
                    snapshot.decl(*id).cloned().ok_or_else(|| {
                        self.stale(path, *origin, snapshot)
                    })?
                } else {
                    self.translate(path, *origin, snapshot)?
                };
                self.project_facet(base, snapshot)?
            }
            RefTarget::Builder(builder) => {
                snapshot.committed(builder.id()).cloned().ok_or_else(|| {
                    ResolveError::BuilderNotCommitted {
                        name: snapshot
                            .names()
                            .try_resolve(builder.name())
                            .map(str::to_string)
                            .unwrap_or_else(|| builder.id().to_string()),
                        snapshot: snapshot.id(),
                    }
                })?
            }
            RefTarget::Serialized(serial) => snapshot
                .decl_by_serialized_id(serial)
                .cloned()
                .ok_or_else(|| ResolveError::UnresolvableId {
                    id: serial.clone(),
                    snapshot: snapshot.id(),
                })?,
        };

        if !K::admits(decl.kind) {
            return Err(ResolveError::KindMismatch {
                expected: K::DESCRIPTION,
                found: decl.kind.describe(),
            });
        }
        Ok(decl)
    }

    /// Translate a handle minted against `origin` into `snapshot` by
    /// structural matching.
    #[tracing::instrument(level = "trace", skip_all, fields(origin = %origin, target = %snapshot.id()))]
    fn translate(
        &self,
        path: &DeclPath,
        origin: SnapshotId,
        snapshot: &Snapshot,
    ) -> ResolveResult<Decl> {
        match snapshot.decl_by_path(path) {
            Some(decl) => Ok(Arc::clone(decl)),
            None => {
                tracing::debug!(
                    path = %path.render(snapshot.names(), snapshot.types()),
                    "declaration vanished between snapshots"
                );
                Err(self.stale(path, origin, snapshot))
            }
        }
    }

    fn stale(&self, path: &DeclPath, origin: SnapshotId, snapshot: &Snapshot) -> ResolveError {
        ResolveError::Stale {
            path: path.render(snapshot.names(), snapshot.types()),
            origin,
            snapshot: snapshot.id(),
        }
    }

    /// Project the resolved base declaration to the facet this reference
    /// denotes.
    fn project_facet(&self, base: Decl, snapshot: &Snapshot) -> ResolveResult<Decl> {
        let display_name = |sym| {
            snapshot
                .names()
                .try_resolve(sym)
                .unwrap_or("<unknown>")
                .to_string()
        };
        match self.facet {
            RefFacet::Default => Ok(base),
            RefFacet::ReturnSlot => base
                .return_slot
                .and_then(|slot| snapshot.decl(slot).cloned())
                .ok_or_else(|| ResolveError::Unresolvable {
                    target: format!("the return slot of `{}`", display_name(base.name)),
                }),
            RefFacet::PropertyField => base
                .backing_field
                .and_then(|field| snapshot.decl(field).cloned())
                .ok_or_else(|| ResolveError::NoBackingStorage {
                    property: display_name(base.name),
                }),
            RefFacet::AccessorParam => base
                .setter_param
                .and_then(|param| snapshot.decl(param).cloned())
                .ok_or_else(|| ResolveError::Unresolvable {
                    target: format!(
                        "the setter parameter of read-only property `{}`",
                        display_name(base.name)
                    ),
                }),
            // Root facets never pair with a symbol target; `from_symbol`
            // rejects them at mint time.
            RefFacet::Module | RefFacet::Assembly => Err(ResolveError::Unresolvable {
                target: "a root facet on a symbol target".to_string(),
            }),
        }
    }

    /// Render the opaque serialized id for cross-session persistence.
    ///
    /// Only references minted from a snapshot-bound symbol handle with the
    /// default facet (or references that already carry a serialized id) can
    /// be serialized; builder-backed references denote declarations that may
    /// not exist in every snapshot.
    pub fn serialized_id(&self, snapshot: &Snapshot) -> ResolveResult<String> {
        match (&self.target, self.facet) {
            (RefTarget::Symbol { path, .. }, RefFacet::Default) => {
                Ok(path.render(snapshot.names(), snapshot.types()))
            }
            (RefTarget::Serialized(serial), RefFacet::Default) => Ok(serial.clone()),
            (RefTarget::Symbol { .. }, _) | (RefTarget::Serialized(_), _) => {
                Err(ResolveError::NotSerializable { target: "faceted" })
            }
            (RefTarget::Builder(_), _) => Err(ResolveError::NotSerializable {
                target: "builder-backed",
            }),
            (RefTarget::Root, _) => Err(ResolveError::NotSerializable {
                target: "root-target",
            }),
        }
    }
}

// Manual impls: deriving would demand bounds on the uninhabited marker type.

impl<K: DeclMarker> Clone for DeclRef<K> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            facet: self.facet,
            _marker: PhantomData,
        }
    }
}

impl<K: DeclMarker> fmt::Debug for DeclRef<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclRef")
            .field("target", &self.target)
            .field("facet", &self.facet)
            .field("view", &K::DESCRIPTION)
            .finish()
    }
}

/// Snapshot-independent equality: two references are equal iff they denote
/// the same underlying declaration under the same facet. Symbol targets
/// compare by structural path (not by handle or origin snapshot); builder
/// targets by builder identity; a symbol reference never equals a builder
/// reference.
impl<K1: DeclMarker, K2: DeclMarker> PartialEq<DeclRef<K2>> for DeclRef<K1> {
    fn eq(&self, other: &DeclRef<K2>) -> bool {
        if self.facet != other.facet {
            return false;
        }
        match (&self.target, &other.target) {
            (RefTarget::Symbol { path: a, .. }, RefTarget::Symbol { path: b, .. }) => a == b,
            (RefTarget::Builder(a), RefTarget::Builder(b)) => a.id() == b.id(),
            (RefTarget::Serialized(a), RefTarget::Serialized(b)) => a == b,
            (RefTarget::Root, RefTarget::Root) => true,
            _ => false,
        }
    }
}

impl<K: DeclMarker> Eq for DeclRef<K> {}

impl<K: DeclMarker> Hash for DeclRef<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.facet.hash(state);
        match &self.target {
            RefTarget::Symbol { path, .. } => {
                0u8.hash(state);
                path.hash(state);
            }
            RefTarget::Builder(builder) => {
                1u8.hash(state);
                builder.id().hash(state);
            }
            RefTarget::Serialized(serial) => {
                2u8.hash(state);
                serial.hash(state);
            }
            RefTarget::Root => 3u8.hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use rustc_hash::FxHashSet;

    use super::*;
    use crate::model::decl::{Param, Signature};
    use crate::model::snapshot::Program;
    use crate::model::types::TypeId;

    fn two_snapshots() -> (Program, SnapshotId, SnapshotId) {
        let mut program = Program::new();
        let mut builder = program.build_snapshot();
        let calc = builder.add_type("Calculator", None);
        let lhs = builder.intern("lhs");
        builder.add_method(
            calc,
            "add",
            Signature::new([Param::by_value(lhs, TypeId::INT)], TypeId::INT),
        );
        let s1 = builder.freeze();
        let s2 = program.derive_snapshot(s1).freeze();
        (program, s1, s2)
    }

    #[test]
    fn references_compare_across_snapshots() {
        let (program, s1, s2) = two_snapshots();
        let a = DeclRef::from_decl(
            program
                .snapshot(s1)
                .decl_by_serialized_id("T:main.Calculator")
                .unwrap(),
        );
        let b = DeclRef::from_decl(
            program
                .snapshot(s2)
                .decl_by_serialized_id("T:main.Calculator")
                .unwrap(),
        );
        assert_eq!(a, b);

        let mut set = FxHashSet::default();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn cast_is_a_pure_relabeling() {
        let (program, s1, _) = two_snapshots();
        let snapshot = program.snapshot(s1);
        let any = DeclRef::from_decl(snapshot.decl_by_serialized_id("T:main.Calculator").unwrap());

        // Widening and narrowing never fail; only resolution checks kinds.
        let as_method: DeclRef<MethodDecl> = any.clone().cast();
        let err = as_method.resolve(snapshot).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::KindMismatch {
                expected: "method",
                found: "type"
            }
        ));

        let back: DeclRef<TypeDecl> = as_method.cast();
        assert!(back.resolve(snapshot).is_ok());
    }

    #[test]
    fn facet_mint_rejects_incompatible_kinds() {
        let (program, s1, _) = two_snapshots();
        let snapshot = program.snapshot(s1);
        let ty = snapshot.decl_by_serialized_id("T:main.Calculator").unwrap();

        let err = DeclRef::from_symbol(ty, RefFacet::ReturnSlot).unwrap_err();
        assert!(matches!(err, ResolveError::KindMismatch { .. }));
        assert!(DeclRef::from_symbol(ty, RefFacet::Default).is_ok());
    }

    #[test]
    fn names_are_available_without_resolution() {
        let (program, s1, _) = two_snapshots();
        let snapshot = program.snapshot(s1);
        let method = snapshot
            .decl_by_serialized_id("M:main.Calculator.add(int)")
            .unwrap();
        let reference = DeclRef::from_decl(method);

        assert_eq!(reference.name(), Some(method.name));
        assert_eq!(reference.kind_hint(), Some(DeclKind::Method));
        assert_eq!(DeclRef::from_serialized_id("M:x").name(), None);
    }

    #[test]
    fn root_references_resolve_to_the_root_module() {
        let (program, s1, _) = two_snapshots();
        let snapshot = program.snapshot(s1);

        let root = DeclRef::compilation_root().resolve(snapshot).unwrap();
        assert_eq!(root.kind, DeclKind::Module);
        assert!(Arc::ptr_eq(&root, snapshot.root_module()));

        let module = DeclRef::root_module().resolve(snapshot).unwrap();
        assert!(Arc::ptr_eq(&module, snapshot.root_module()));
    }

    #[test]
    fn symbol_and_builder_references_never_compare_equal() {
        let (mut program, s1, _) = two_snapshots();
        let name = program.intern("Calculator");
        let builder = DeclBuilder::new(name, DeclKind::Type);

        let symbolic = DeclRef::from_decl(
            program
                .snapshot(s1)
                .decl_by_serialized_id("T:main.Calculator")
                .unwrap(),
        );
        let built = DeclRef::from_builder(builder);
        assert_ne!(symbolic, built);
    }
}
