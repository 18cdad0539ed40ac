// src/model/snapshot.rs
//
// Snapshots and the program pipeline that derives them.
//
// A Program owns the shared interner and type table plus every snapshot
// produced so far. Snapshots are immutable once frozen: the declaration
// table, the structural-path index used for handle translation, the
// serialized-id index, and the committed-builder map never change after
// `SnapshotBuilder::freeze`. That immutability is what makes concurrent,
// lock-free resolution sound.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use weft_identity::{BuilderId, DeclId, Interner, SnapshotId, Symbol};

use crate::model::builder::DeclBuilder;
use crate::model::decl::{Decl, DeclData, DeclKind, DeclPath, Param, ParamSlot, RefKind, Signature};
use crate::model::types::{TypeId, TypeTable};
use crate::reference::DeclRef;

/// The transformation pipeline: shared identity context plus the sequence of
/// snapshots derived so far.
#[derive(Debug, Default)]
pub struct Program {
    names: Interner,
    types: TypeTable,
    snapshots: Vec<Arc<Snapshot>>,
}

impl Program {
    pub fn new() -> Self {
        Self {
            names: Interner::new(),
            types: TypeTable::new(),
            snapshots: Vec::new(),
        }
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        self.names.intern(s)
    }

    pub fn names(&self) -> &Interner {
        &self.names
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    pub fn snapshot(&self, id: SnapshotId) -> &Arc<Snapshot> {
        &self.snapshots[id.index() as usize]
    }

    pub fn latest(&self) -> &Arc<Snapshot> {
        self.snapshots
            .last()
            .expect("no snapshot has been frozen yet")
    }

    /// Start a fresh snapshot containing only the root module.
    pub fn build_snapshot(&mut self) -> SnapshotBuilder<'_> {
        SnapshotBuilder::fresh(self)
    }

    /// Start a snapshot derived from `base`: a structural copy that can then
    /// be edited (declarations added, removed, builders committed) before
    /// freezing.
    pub fn derive_snapshot(&mut self, base: SnapshotId) -> SnapshotBuilder<'_> {
        SnapshotBuilder::derived(self, base)
    }
}

/// One immutable version of the program's structure.
#[derive(Debug)]
pub struct Snapshot {
    id: SnapshotId,
    /// Declaration table; `None` marks a declaration removed by an edit. The
    /// surviving indices of a derived snapshot match its base, but handles
    /// are still translated structurally when they cross snapshots.
    decls: Vec<Option<Decl>>,
    by_path: FxHashMap<DeclPath, DeclId>,
    by_serial: FxHashMap<String, DeclId>,
    committed: FxHashMap<BuilderId, DeclId>,
    root: DeclId,
    names: Arc<Interner>,
    types: Arc<TypeTable>,
}

impl Snapshot {
    pub fn id(&self) -> SnapshotId {
        self.id
    }

    /// Symbol-table lookup by handle. Only valid for handles this snapshot
    /// issued; handles from other snapshots must be translated first.
    pub fn decl(&self, id: DeclId) -> Option<&Decl> {
        self.decls.get(id.index() as usize)?.as_ref()
    }

    /// Structural lookup, used to translate a handle minted against another
    /// snapshot.
    pub fn decl_by_path(&self, path: &DeclPath) -> Option<&Decl> {
        let id = *self.by_path.get(path)?;
        self.decl(id)
    }

    /// Persistence lookup by opaque serialized id.
    pub fn decl_by_serialized_id(&self, serial: &str) -> Option<&Decl> {
        let id = *self.by_serial.get(serial)?;
        self.decl(id)
    }

    /// The declaration a builder materialized into, if this snapshot is at
    /// or after the builder's commit.
    pub fn committed(&self, builder: BuilderId) -> Option<&Decl> {
        let id = *self.committed.get(&builder)?;
        self.decl(id)
    }

    /// The compilation-root accessor.
    pub fn root_module(&self) -> &Decl {
        self.decl(self.root)
            .expect("the root module is never removed")
    }

    pub fn names(&self) -> &Interner {
        &self.names
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// Live declarations, in table order.
    pub fn decls(&self) -> impl Iterator<Item = &Decl> {
        self.decls.iter().filter_map(Option::as_ref)
    }
}

/// Constructs one snapshot, either from scratch or by structural copy of a
/// predecessor.
pub struct SnapshotBuilder<'p> {
    program: &'p mut Program,
    id: SnapshotId,
    decls: Vec<Option<DeclData>>,
    committed: FxHashMap<BuilderId, DeclId>,
    root: DeclId,
}

impl<'p> SnapshotBuilder<'p> {
    fn fresh(program: &'p mut Program) -> Self {
        let id = SnapshotId::new(program.snapshots.len() as u32);
        let main = program.names.intern("main");
        let root = DeclId::new(0);
        let root_decl = DeclData {
            id: root,
            snapshot: id,
            kind: DeclKind::Module,
            name: main,
            path: DeclPath::new(DeclKind::Module, [main]),
            signature: None,
            ty: None,
            base: None,
            members: Vec::new(),
            params: Vec::new(),
            return_slot: None,
            backing_field: None,
            setter_param: None,
            param: None,
        };
        Self {
            program,
            id,
            decls: vec![Some(root_decl)],
            committed: FxHashMap::default(),
            root,
        }
    }

    fn derived(program: &'p mut Program, base: SnapshotId) -> Self {
        let id = SnapshotId::new(program.snapshots.len() as u32);
        let base = Arc::clone(program.snapshot(base));
        let decls = base
            .decls
            .iter()
            .map(|slot| {
                slot.as_ref().map(|decl| {
                    let mut copy = DeclData::clone(decl);
                    copy.snapshot = id;
                    copy
                })
            })
            .collect();
        Self {
            program,
            id,
            decls,
            committed: base.committed.clone(),
            root: base.root,
        }
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        self.program.names.intern(s)
    }

    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.program.types
    }

    pub fn root(&self) -> DeclId {
        self.root
    }

    fn next_id(&self) -> DeclId {
        DeclId::new(self.decls.len() as u32)
    }

    fn decl_at(&self, id: DeclId) -> &DeclData {
        self.decls[id.index() as usize]
            .as_ref()
            .expect("declaration was removed from this snapshot")
    }

    fn decl_at_mut(&mut self, id: DeclId) -> &mut DeclData {
        self.decls[id.index() as usize]
            .as_mut()
            .expect("declaration was removed from this snapshot")
    }

    fn push(&mut self, data: DeclData) -> DeclId {
        let id = data.id;
        debug_assert_eq!(id, self.next_id());
        self.decls.push(Some(data));
        id
    }

    fn attach_member(&mut self, owner: DeclId, member: DeclId) {
        let reference = DeclRef::from_decl(self.decl_at(member));
        self.decl_at_mut(owner).members.push(reference);
    }

    /// Add a type declaration under the root module.
    pub fn add_type(&mut self, name: &str, base: Option<DeclId>) -> DeclId {
        let sym = self.program.names.intern(name);
        let base_ref = base.map(|b| DeclRef::from_decl(self.decl_at(b)).cast());
        let path = self.decl_at(self.root).path.child(DeclKind::Type, sym);
        let data = DeclData {
            id: self.next_id(),
            snapshot: self.id,
            kind: DeclKind::Type,
            name: sym,
            path,
            signature: None,
            ty: None,
            base: base_ref,
            members: Vec::new(),
            params: Vec::new(),
            return_slot: None,
            backing_field: None,
            setter_param: None,
            param: None,
        };
        let id = self.push(data);
        self.attach_member(self.root, id);
        id
    }

    /// Add a method to `owner`, synthesizing its parameter declarations and
    /// return slot.
    pub fn add_method(&mut self, owner: DeclId, name: &str, signature: Signature) -> DeclId {
        let sym = self.program.names.intern(name);
        let id = self.insert_method(owner, sym, signature);
        self.attach_member(owner, id);
        id
    }

    fn insert_method(&mut self, owner: DeclId, sym: Symbol, signature: Signature) -> DeclId {
        let method_path = self
            .decl_at(owner)
            .path
            .child(DeclKind::Method, sym)
            .with_overload(signature.param_keys());

        // Parameter declarations come first so the method can hold
        // references to them.
        let mut param_refs = Vec::with_capacity(signature.params.len());
        for (index, param) in signature.params.iter().enumerate() {
            let data = DeclData {
                id: self.next_id(),
                snapshot: self.id,
                kind: DeclKind::Parameter,
                name: param.name,
                path: method_path.parameter(ParamSlot::Positional(index as u32), param.name),
                signature: None,
                ty: Some(param.ty),
                base: None,
                members: Vec::new(),
                params: Vec::new(),
                return_slot: None,
                backing_field: None,
                setter_param: None,
                param: Some(param.clone()),
            };
            let reference = DeclRef::from_decl(&data).cast();
            self.push(data);
            param_refs.push(reference);
        }

        let return_slot = {
            let data = DeclData {
                id: self.next_id(),
                snapshot: self.id,
                kind: DeclKind::Parameter,
                name: sym,
                path: method_path.parameter(ParamSlot::Return, sym),
                signature: None,
                ty: Some(signature.return_ty),
                base: None,
                members: Vec::new(),
                params: Vec::new(),
                return_slot: None,
                backing_field: None,
                setter_param: None,
                param: Some(Param {
                    name: sym,
                    ty: signature.return_ty,
                    ref_kind: RefKind::Value,
                    is_variadic: false,
                }),
            };
            self.push(data)
        };

        let data = DeclData {
            id: self.next_id(),
            snapshot: self.id,
            kind: DeclKind::Method,
            name: sym,
            path: method_path,
            signature: Some(signature),
            ty: None,
            base: None,
            members: Vec::new(),
            params: param_refs,
            return_slot: Some(return_slot),
            backing_field: None,
            setter_param: None,
            param: None,
        };
        self.push(data)
    }

    /// Add a field to `owner`.
    pub fn add_field(&mut self, owner: DeclId, name: &str, ty: TypeId) -> DeclId {
        let sym = self.program.names.intern(name);
        let id = self.insert_field(owner, sym, ty);
        self.attach_member(owner, id);
        id
    }

    fn insert_field(&mut self, owner: DeclId, sym: Symbol, ty: TypeId) -> DeclId {
        let path = self.decl_at(owner).path.child(DeclKind::Field, sym);
        let data = DeclData {
            id: self.next_id(),
            snapshot: self.id,
            kind: DeclKind::Field,
            name: sym,
            path,
            signature: None,
            ty: Some(ty),
            base: None,
            members: Vec::new(),
            params: Vec::new(),
            return_slot: None,
            backing_field: None,
            setter_param: None,
            param: None,
        };
        self.push(data)
    }

    /// Add a property to `owner`. Auto-implemented properties synthesize a
    /// backing field; writable ones synthesize the setter value parameter.
    pub fn add_property(
        &mut self,
        owner: DeclId,
        name: &str,
        ty: TypeId,
        auto: bool,
        writable: bool,
    ) -> DeclId {
        let sym = self.program.names.intern(name);
        let path = self.decl_at(owner).path.child(DeclKind::Property, sym);

        let backing_field = auto.then(|| {
            let backing = self.program.names.intern(&format!("__{name}"));
            self.insert_field(owner, backing, ty)
        });

        let setter_param = writable.then(|| {
            let value = self.program.names.intern("value");
            let data = DeclData {
                id: self.next_id(),
                snapshot: self.id,
                kind: DeclKind::Parameter,
                name: value,
                path: path.parameter(ParamSlot::Positional(0), value),
                signature: None,
                ty: Some(ty),
                base: None,
                members: Vec::new(),
                params: Vec::new(),
                return_slot: None,
                backing_field: None,
                setter_param: None,
                param: Some(Param::by_value(value, ty)),
            };
            self.push(data)
        });

        let data = DeclData {
            id: self.next_id(),
            snapshot: self.id,
            kind: DeclKind::Property,
            name: sym,
            path,
            signature: None,
            ty: Some(ty),
            base: None,
            members: Vec::new(),
            params: Vec::new(),
            return_slot: None,
            backing_field,
            setter_param,
            param: None,
        };
        let id = self.push(data);
        self.attach_member(owner, id);
        id
    }

    /// Materialize a frozen builder into this snapshot. The builder becomes
    /// resolvable in this snapshot and every snapshot derived from it.
    pub fn commit_builder(
        &mut self,
        builder: &Arc<DeclBuilder>,
        owner: DeclId,
        signature: Option<Signature>,
    ) -> DeclId {
        builder.mark_committed();
        let sym = builder.name();
        let id = match (builder.kind(), signature) {
            (DeclKind::Method, Some(signature)) => self.insert_method(owner, sym, signature),
            (DeclKind::Field, _) => self.insert_field(owner, sym, TypeId::VOID),
            (kind, _) => {
                let path = self.decl_at(owner).path.child(kind, sym);
                let data = DeclData {
                    id: self.next_id(),
                    snapshot: self.id,
                    kind,
                    name: sym,
                    path,
                    signature: None,
                    ty: None,
                    base: None,
                    members: Vec::new(),
                    params: Vec::new(),
                    return_slot: None,
                    backing_field: None,
                    setter_param: None,
                    param: None,
                };
                self.push(data)
            }
        };
        self.committed.insert(builder.id(), id);
        self.attach_member(owner, id);
        id
    }

    /// Remove a declaration in a derived snapshot. The table slot becomes a
    /// tombstone; references still pointing at it resolve to `Stale`.
    pub fn remove(&mut self, id: DeclId) {
        assert_ne!(id, self.root, "the root module cannot be removed");
        self.decls[id.index() as usize] = None;
        self.committed.retain(|_, materialized| *materialized != id);
    }

    /// Freeze the snapshot: build the structural and serialized-id indexes
    /// and publish it into the program.
    pub fn freeze(self) -> SnapshotId {
        let names = Arc::new(self.program.names.clone());
        let types = Arc::new(self.program.types.clone());

        let mut by_path = FxHashMap::default();
        let mut by_serial = FxHashMap::default();
        for slot in self.decls.iter().flatten() {
            let previous = by_path.insert(slot.path.clone(), slot.id);
            if previous.is_some() {
                panic!(
                    "duplicate declaration path `{}`",
                    slot.path.render(&names, &types)
                );
            }
            by_serial.insert(slot.path.render(&names, &types), slot.id);
        }

        let snapshot = Snapshot {
            id: self.id,
            decls: self
                .decls
                .into_iter()
                .map(|slot| slot.map(Arc::new))
                .collect(),
            by_path,
            by_serial,
            committed: self.committed,
            root: self.root,
            names,
            types,
        };
        let id = snapshot.id;
        self.program.snapshots.push(Arc::new(snapshot));
        id
    }
}
