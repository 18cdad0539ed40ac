// src/lib.rs
//! Declaration identity and lazy resolution for the Weft transformation
//! engine.
//!
//! The crate is organized bottom-up: [`reference`] defines the
//! snapshot-independent declaration handle, [`collection`] the lazily
//! resolving member lists built from those handles, and [`lookup`] the
//! signature-based member queries layered on top. The [`model`] module holds
//! the snapshot/declaration/builder structures the core resolves against.

pub mod collection;
pub mod errors;
pub mod lookup;
pub mod model;
pub mod reference;
pub mod sync;

pub use collection::LazyDeclList;
pub use errors::{ResolveError, ResolveResult};
pub use lookup::MemberLookup;
pub use reference::DeclRef;
