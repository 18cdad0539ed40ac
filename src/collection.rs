// src/collection.rs
//
// Lazily resolving declaration collections.
//
// A container declaration holds its children as snapshot-independent
// references; a LazyDeclList binds that reference list to one snapshot and
// resolves elements on first access only. Enumerating a type with hundreds
// of members costs nothing until individual members are actually touched.

use crate::errors::ResolveResult;
use crate::model::decl::Decl;
use crate::model::snapshot::Snapshot;
use crate::reference::{AnyDecl, DeclMarker, DeclRef};
use crate::sync::OnceSlot;

use weft_identity::Symbol;

/// An ordered, lazily resolving list of declarations bound to one snapshot.
///
/// Construction filters out permanently dead references (discarded builders,
/// declarations removed from the bound snapshot); everything else is kept
/// unresolved. Each element resolves at most once per list; resolution
/// failures are returned but never cached, so a later snapshot state change
/// is not masked by an earlier error.
pub struct LazyDeclList<'s, K: DeclMarker = AnyDecl> {
    snapshot: &'s Snapshot,
    refs: Box<[DeclRef<K>]>,
    cache: OnceSlot<Box<[OnceSlot<Decl>]>>,
}

impl<'s, K: DeclMarker> LazyDeclList<'s, K> {
    /// Bind `refs` to `snapshot`, dropping dead references. Source order of
    /// the surviving references is preserved.
    pub fn new(snapshot: &'s Snapshot, refs: impl IntoIterator<Item = DeclRef<K>>) -> Self {
        let iter = refs.into_iter();
        let mut kept = Vec::with_capacity(iter.size_hint().0);
        for reference in iter {
            if !reference.is_dead(snapshot) {
                kept.push(reference);
            }
        }
        Self {
            snapshot,
            refs: kept.into_boxed_slice(),
            cache: OnceSlot::new(),
        }
    }

    /// Number of live references. Never resolves anything.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn snapshot(&self) -> &'s Snapshot {
        self.snapshot
    }

    /// The unresolved references, in order.
    pub fn refs(&self) -> &[DeclRef<K>] {
        &self.refs
    }

    fn slots(&self) -> &[OnceSlot<Decl>] {
        // The slot array itself is allocated lazily so that lists that are
        // only measured or name-scanned allocate nothing per element.
        self.cache
            .get_or_publish(|| (0..self.refs.len()).map(|_| OnceSlot::new()).collect())
    }

    /// Resolve the element at `index`, caching the result. Panics if
    /// `index` is out of bounds, like slice indexing.
    pub fn get(&self, index: usize) -> ResolveResult<&Decl> {
        let slot = &self.slots()[index];
        if let Some(decl) = slot.get() {
            return Ok(decl);
        }
        let decl = self.refs[index].resolve(self.snapshot)?;
        Ok(slot.publish(decl))
    }

    /// Iterate the elements in order, resolving each on demand.
    pub fn iter(&self) -> impl Iterator<Item = ResolveResult<&Decl>> {
        (0..self.refs.len()).map(|index| self.get(index))
    }

    /// Find every element named `name`, in source order, resolving only the
    /// matches. Overloads share a name, so this can yield several elements.
    ///
    /// The scan compares reference-level names, so elements that expose no
    /// cheap name (serialized-id targets) are skipped without resolution.
    pub fn find_by_name(&self, name: Symbol) -> ResolveResult<Vec<&Decl>> {
        let mut found = Vec::new();
        for (index, reference) in self.refs.iter().enumerate() {
            if reference.name() == Some(name) {
                found.push(self.get(index)?);
            }
        }
        Ok(found)
    }
}

impl<'a, 's, K: DeclMarker> IntoIterator for &'a LazyDeclList<'s, K> {
    type Item = ResolveResult<&'a Decl>;
    type IntoIter = LazyIter<'a, 's, K>;

    fn into_iter(self) -> Self::IntoIter {
        LazyIter {
            list: self,
            index: 0,
        }
    }
}

pub struct LazyIter<'a, 's, K: DeclMarker> {
    list: &'a LazyDeclList<'s, K>,
    index: usize,
}

impl<'a, K: DeclMarker> Iterator for LazyIter<'a, '_, K> {
    type Item = ResolveResult<&'a Decl>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.list.len() {
            return None;
        }
        let item = self.list.get(self.index);
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.list.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl<K: DeclMarker> std::fmt::Debug for LazyDeclList<'_, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyDeclList")
            .field("snapshot", &self.snapshot.id())
            .field("len", &self.refs.len())
            .field("resolved", &self.cache.is_set())
            .finish()
    }
}
