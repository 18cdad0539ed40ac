// src/lookup.rs
//
// Signature-based member lookup.
//
// Method references cannot be keyed by name alone; overloading means the
// parameter types, ref-kinds, generic arity and staticness all participate
// in identity. MemberLookup answers "which method of this type matches this
// shape" queries, walking the base-type chain with override deduplication.
// Queries run over lazily resolving lists, so repeated queries against the
// same lookup resolve each member at most once per level.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use weft_identity::Symbol;

use crate::errors::ResolveResult;
use crate::model::decl::{Decl, DeclData, DeclKind, RefKind, Signature};
use crate::model::snapshot::Snapshot;
use crate::model::types::TypeId;
use crate::reference::{DeclRef, MethodDecl};
use crate::LazyDeclList;

/// The part of a method's shape that participates in override identity.
/// A derived method with the same key as a base method replaces it in
/// lookup results.
#[derive(PartialEq, Eq, Hash)]
struct SigKey {
    name: Symbol,
    generic_arity: u32,
    params: SmallVec<[(TypeId, RefKind); 4]>,
}

impl SigKey {
    fn of(name: Symbol, signature: &Signature) -> Self {
        Self {
            name,
            generic_arity: signature.generic_arity,
            params: signature.param_keys(),
        }
    }
}

/// Signature-based queries over one type's methods, bound to a snapshot.
pub struct MemberLookup<'s> {
    snapshot: &'s Snapshot,
    owner: Decl,
    /// The owner's declared methods; shared by every query so resolutions
    /// are cached across queries.
    declared: LazyDeclList<'s, MethodDecl>,
}

impl<'s> MemberLookup<'s> {
    pub fn new(snapshot: &'s Snapshot, owner: Decl) -> Self {
        let declared = method_list(snapshot, &owner);
        Self {
            snapshot,
            owner,
            declared,
        }
    }

    pub fn owner(&self) -> &Decl {
        &self.owner
    }

    /// The owner's declared methods as a lazily resolving list, in
    /// declaration order. Does not include inherited methods. This is the
    /// same list the queries scan, so anything a query resolved is already
    /// cached here and vice versa.
    pub fn methods(&self) -> &LazyDeclList<'s, MethodDecl> {
        &self.declared
    }

    /// Find the single method whose signature matches `params` exactly,
    /// position by position, with no conversions.
    ///
    /// Walks the base chain nearest-first unless `declared_only` is set, so
    /// an override shadows the method it replaces. Returns `Ok(None)` when
    /// nothing matches. Panics if one type declares two methods with an
    /// identical signature; the snapshot builder rejects that shape, so a
    /// match here means the declaration table is corrupt.
    #[tracing::instrument(level = "debug", skip_all, fields(owner = %self.snapshot.names().resolve(self.owner.name)))]
    pub fn by_exact_signature(
        &self,
        name: Symbol,
        generic_arity: u32,
        params: &[(TypeId, RefKind)],
        is_static: Option<bool>,
        declared_only: bool,
    ) -> ResolveResult<Option<Decl>> {
        let mut seen_types = FxHashSet::default();
        let mut current = Some(Arc::clone(&self.owner));
        while let Some(decl) = current {
            if !seen_types.insert(decl.path.clone()) {
                break;
            }
            let owned;
            let list = if Arc::ptr_eq(&decl, &self.owner) {
                &self.declared
            } else {
                owned = method_list(self.snapshot, &decl);
                &owned
            };
            let mut found: Option<Decl> = None;
            for method in list.find_by_name(name)? {
                let signature = method
                    .signature
                    .as_ref()
                    .expect("method declaration carries a signature");
                if signature.generic_arity != generic_arity
                    || is_static.is_some_and(|wanted| signature.is_static != wanted)
                    || signature.param_keys().as_slice() != params
                {
                    continue;
                }
                if found.is_some() {
                    panic!(
                        "duplicate signature for `{}` in one type",
                        self.snapshot.names().resolve(name)
                    );
                }
                found = Some(Arc::clone(method));
            }
            if found.is_some() {
                return Ok(found);
            }
            if declared_only {
                break;
            }
            current = self.base_of(&decl)?;
        }
        Ok(None)
    }

    /// Find every method compatible with the given shape constraints. Each
    /// constraint is optional; `None` means "any". Results come back in
    /// chain order, nearest type first and declaration order within a type,
    /// with overridden base methods deduplicated away.
    ///
    /// With `expand_variadic` set, a trailing variadic parameter also
    /// accepts zero or more extra arguments of its element type.
    #[tracing::instrument(level = "debug", skip_all, fields(owner = %self.snapshot.names().resolve(self.owner.name)))]
    pub fn by_compatible_signature(
        &self,
        name: Option<Symbol>,
        generic_arity: Option<u32>,
        args: Option<&[(TypeId, RefKind)]>,
        is_static: Option<bool>,
        declared_only: bool,
        expand_variadic: bool,
    ) -> ResolveResult<Vec<Decl>> {
        let mut results = Vec::new();
        let mut seen_sigs = FxHashSet::default();
        let mut seen_types = FxHashSet::default();
        let mut current = Some(Arc::clone(&self.owner));
        while let Some(decl) = current {
            // Malformed base edges could form a cycle; stop rather than spin.
            if !seen_types.insert(decl.path.clone()) {
                break;
            }
            let owned;
            let list = if Arc::ptr_eq(&decl, &self.owner) {
                &self.declared
            } else {
                owned = method_list(self.snapshot, &decl);
                &owned
            };
            let candidates = match name {
                Some(wanted) => list.find_by_name(wanted)?,
                None => list.iter().collect::<ResolveResult<Vec<_>>>()?,
            };
            for method in candidates {
                let signature = method
                    .signature
                    .as_ref()
                    .expect("method declaration carries a signature");
                if generic_arity.is_some_and(|wanted| signature.generic_arity != wanted)
                    || is_static.is_some_and(|wanted| signature.is_static != wanted)
                {
                    continue;
                }
                if let Some(args) = args
                    && !self.accepts(signature, args, expand_variadic)
                {
                    continue;
                }
                if seen_sigs.insert(SigKey::of(method.name, signature)) {
                    results.push(Arc::clone(method));
                }
            }
            if declared_only {
                break;
            }
            current = self.base_of(&decl)?;
        }
        Ok(results)
    }

    fn base_of(&self, decl: &Decl) -> ResolveResult<Option<Decl>> {
        match &decl.base {
            Some(base) => base.resolve(self.snapshot).map(Some),
            None => Ok(None),
        }
    }

    /// Whether `signature` accepts `args`, either positionally or through
    /// trailing-variadic expansion.
    fn accepts(&self, signature: &Signature, args: &[(TypeId, RefKind)], expand_variadic: bool) -> bool {
        let keys = signature.param_keys();
        if keys.len() == args.len() && keys.iter().zip(args).all(|(param, arg)| param == arg) {
            return true;
        }
        if !expand_variadic {
            return false;
        }
        let Some(position) = signature.params.iter().position(|param| param.is_variadic) else {
            return false;
        };
        assert_eq!(
            position,
            signature.params.len() - 1,
            "variadic parameter must be in final position"
        );
        let element = self
            .snapshot
            .types()
            .element_of(signature.params[position].ty)
            .expect("variadic parameter must have an array type");
        let fixed = keys.len() - 1;
        args.len() >= fixed
            && keys[..fixed].iter().zip(args).all(|(param, arg)| param == arg)
            && args[fixed..]
                .iter()
                .all(|(ty, ref_kind)| *ty == element && *ref_kind == RefKind::Value)
    }
}

/// One base-chain level's declared methods as a lazily resolving list.
fn method_list<'s>(snapshot: &'s Snapshot, owner: &DeclData) -> LazyDeclList<'s, MethodDecl> {
    LazyDeclList::new(
        snapshot,
        owner
            .members
            .iter()
            .filter(|reference| reference.kind_hint() == Some(DeclKind::Method))
            .cloned()
            .map(DeclRef::cast),
    )
}
