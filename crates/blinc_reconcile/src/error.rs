//! Error types for blinc_reconcile

use blinc_core::{Identity, Key, KindId, StoreError};
use thiserror::Error;

/// Errors that abort a build
///
/// A failed build leaves the previous tree valid and releases any state
/// cells it created.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Descriptor names a kind that was never registered
    #[error("kind `{0}` is not registered")]
    UnregisteredKind(KindId),

    /// Props payload does not belong to the descriptor's kind
    #[error("kind mismatch at {identity}: `{expected}` expects props `{found}` to be its own")]
    KindMismatch {
        identity: Identity,
        expected: KindId,
        found: &'static str,
    },

    /// Two siblings of the same kind share a key
    #[error("duplicate key `{key}` for kind `{kind}` under {parent}")]
    DuplicateKey {
        parent: Identity,
        kind: KindId,
        key: Key,
    },

    /// A node's state cell is gone
    #[error("state cell missing for {0}")]
    MissingState(Identity),

    /// The equivalence predicate disagreed with itself when arguments were swapped
    #[error("equivalence predicate of {0} is not symmetric")]
    InconsistentEquivalence(Identity),

    /// Tree is nested deeper than the configured limit
    #[error("tree depth limit {limit} exceeded at {identity}")]
    DepthExceeded { identity: Identity, limit: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Build configuration could not be parsed
    #[error("invalid build configuration: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type for blinc_reconcile operations
pub type Result<T> = std::result::Result<T, ReconcileError>;
