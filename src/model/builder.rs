// src/model/builder.rs
//
// Declaration builders: in-progress declarations that are not yet part of
// any snapshot's symbol table.
//
// The core only reads builders after they are frozen; the mutation API that
// fills them in lives with the transformation passes, outside this crate.
// What matters here is the lifecycle flag: a builder becomes resolvable once
// some snapshot commits it, and a discarded builder is a permanently dead
// reference target.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use weft_identity::{BuilderId, Symbol};

use crate::model::decl::DeclKind;

// Process-global id source, so builder identity survives across snapshots.
static NEXT_BUILDER_ID: AtomicU32 = AtomicU32::new(0);

/// Lifecycle state of a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BuilderState {
    InProgress = 0,
    Committed = 1,
    Discarded = 2,
}

/// A not-yet-committed declaration under construction.
#[derive(Debug)]
pub struct DeclBuilder {
    id: BuilderId,
    name: Symbol,
    kind: DeclKind,
    state: AtomicU8,
}

impl DeclBuilder {
    pub fn new(name: Symbol, kind: DeclKind) -> Arc<Self> {
        Arc::new(Self {
            id: BuilderId::new(NEXT_BUILDER_ID.fetch_add(1, Ordering::Relaxed)),
            name,
            kind,
            state: AtomicU8::new(BuilderState::InProgress as u8),
        })
    }

    pub fn id(&self) -> BuilderId {
        self.id
    }

    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn kind(&self) -> DeclKind {
        self.kind
    }

    pub fn state(&self) -> BuilderState {
        match self.state.load(Ordering::Acquire) {
            0 => BuilderState::InProgress,
            1 => BuilderState::Committed,
            _ => BuilderState::Discarded,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.state() == BuilderState::Committed
    }

    /// A discarded builder never materializes in any snapshot; references to
    /// it are filtered out of lazy collections at construction time.
    pub fn is_discarded(&self) -> bool {
        self.state() == BuilderState::Discarded
    }

    /// Marks the builder as committed. Called by the snapshot builder that
    /// materializes it; panics if the builder was already discarded.
    pub(crate) fn mark_committed(&self) {
        let previous = self
            .state
            .swap(BuilderState::Committed as u8, Ordering::AcqRel);
        if previous == BuilderState::Discarded as u8 {
            panic!("cannot commit a discarded builder");
        }
    }

    /// Abandons the builder. References to it become permanently dead.
    pub fn discard(&self) {
        self.state
            .store(BuilderState::Discarded as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_identity::Symbol;

    #[test]
    fn builders_get_unique_ids() {
        let name = Symbol::new_for_test(0);
        let a = DeclBuilder::new(name, DeclKind::Method);
        let b = DeclBuilder::new(name, DeclKind::Method);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn lifecycle_flags() {
        let builder = DeclBuilder::new(Symbol::new_for_test(1), DeclKind::Field);
        assert_eq!(builder.state(), BuilderState::InProgress);
        assert!(!builder.is_committed());

        builder.mark_committed();
        assert!(builder.is_committed());

        let dead = DeclBuilder::new(Symbol::new_for_test(2), DeclKind::Field);
        dead.discard();
        assert!(dead.is_discarded());
    }

    #[test]
    #[should_panic(expected = "discarded builder")]
    fn committing_a_discarded_builder_panics() {
        let builder = DeclBuilder::new(Symbol::new_for_test(3), DeclKind::Method);
        builder.discard();
        builder.mark_committed();
    }
}
