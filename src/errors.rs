// src/errors.rs
//! Resolution errors (E5xxx).
//!
//! All failures in this layer are local and synchronous: they surface
//! directly to the caller of `resolve`/`get`/`serialized_id` and are never
//! retried automatically. Retrying [`ResolveError::Stale`] against the same
//! snapshot cannot succeed; the caller must obtain a newer snapshot first.

use miette::Diagnostic;
use thiserror::Error;
use weft_identity::SnapshotId;

/// An alias type for resolution results.
pub type ResolveResult<T> = Result<T, ResolveError>;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The reference's facet or typed view does not fit the declaration it
    /// denotes, either at mint time (facet vs. handle category) or at
    /// resolve time (typed view vs. resolved kind).
    #[error("expected a {expected} declaration, found {found}")]
    #[diagnostic(code(E5001))]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The reference denotes nothing that can be looked up in a snapshot,
    /// e.g. a root-target reference with a non-root facet.
    #[error("reference to {target} cannot be resolved against a snapshot")]
    #[diagnostic(code(E5002))]
    Unresolvable { target: String },

    /// The declaration existed in the reference's origin snapshot but has no
    /// structural equivalent in the snapshot handed to `resolve`.
    #[error("declaration `{path}` from snapshot {origin} no longer exists in snapshot {snapshot}")]
    #[diagnostic(
        code(E5003),
        help("re-mint the reference against a newer snapshot; retrying here cannot succeed")
    )]
    Stale {
        path: String,
        origin: SnapshotId,
        snapshot: SnapshotId,
    },

    /// The snapshot predates the builder's commit, so no materialized
    /// declaration exists for it there.
    #[error("builder `{name}` is not committed in snapshot {snapshot}")]
    #[diagnostic(
        code(E5004),
        help("resolve against a snapshot produced at or after the builder's commit")
    )]
    BuilderNotCommitted { name: String, snapshot: SnapshotId },

    /// A `PropertyField` facet was resolved against a property that does not
    /// synthesize backing storage.
    #[error("property `{property}` has no backing storage")]
    #[diagnostic(
        code(E5005),
        help("only auto-implemented properties expose a backing field")
    )]
    NoBackingStorage { property: String },

    /// A serialized textual identifier did not match any declaration in the
    /// snapshot's symbol table.
    #[error("serialized id `{id}` does not resolve in snapshot {snapshot}")]
    #[diagnostic(code(E5006))]
    UnresolvableId { id: String, snapshot: SnapshotId },

    /// Only references minted from a snapshot-bound symbol handle with the
    /// default facet can be serialized.
    #[error("a {target} reference cannot be serialized")]
    #[diagnostic(
        code(E5007),
        help("builder-backed and faceted references denote declarations that may not exist in every snapshot")
    )]
    NotSerializable { target: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_error_names_both_snapshots() {
        let err = ResolveError::Stale {
            path: "T:main.Calculator".into(),
            origin: SnapshotId::new(0),
            snapshot: SnapshotId::new(2),
        };
        let msg = err.to_string();
        assert!(msg.contains("#0"));
        assert!(msg.contains("#2"));
        assert!(msg.contains("T:main.Calculator"));
    }

    #[test]
    fn errors_carry_stable_codes() {
        use miette::Diagnostic;

        let err = ResolveError::NotSerializable { target: "builder" };
        assert_eq!(err.code().unwrap().to_string(), "E5007");
    }
}
