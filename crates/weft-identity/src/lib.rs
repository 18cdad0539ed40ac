// lib.rs
//
// Identity primitives shared across the Weft core.
// Defines Symbol and Interner as foundational naming primitives, plus the
// typed u32 handles used to address snapshots, declarations, and builders.

use std::fmt;

mod intern;
mod symbol;

pub use intern::Interner;
pub use symbol::Symbol;

/// Identity for one immutable version of the program's structure.
///
/// Snapshot ids are assigned sequentially by the owning `Program`; a larger
/// index means the snapshot was derived later in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotId(u32);

impl SnapshotId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle for a declaration within a single snapshot's declaration table.
///
/// A `DeclId` is only meaningful together with the snapshot that issued it;
/// using it against another snapshot requires structural translation first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId(u32);

impl DeclId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// Identity for a declaration builder.
///
/// Builder ids are process-global and monotonically assigned, so a builder
/// can be recognized in any snapshot's committed-builder table regardless of
/// which snapshot materialized it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuilderId(u32);

impl BuilderId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BuilderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "builder#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_ids_order_by_derivation() {
        assert!(SnapshotId::new(0) < SnapshotId::new(3));
        assert_eq!(SnapshotId::new(2).to_string(), "#2");
    }

    #[test]
    fn decl_id_round_trips_index() {
        assert_eq!(DeclId::new(17).index(), 17);
    }
}
