// src/model/mod.rs
//! The program model the core resolves against.
//!
//! This is the front-end collaborator surface: snapshots with declaration
//! tables, structural paths for cross-snapshot translation, interned types,
//! and declaration builders. The core reads this model; it never mutates it.

pub mod builder;
pub mod decl;
pub mod snapshot;
pub mod types;

pub use builder::{BuilderState, DeclBuilder};
pub use decl::{Decl, DeclData, DeclKind, DeclPath, Param, ParamSlot, RefKind, Signature};
pub use snapshot::{Program, Snapshot, SnapshotBuilder};
pub use types::{Ty, TypeId, TypeTable};
