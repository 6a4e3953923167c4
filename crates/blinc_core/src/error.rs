//! State store error types

use thiserror::Error;

use crate::identity::Identity;

/// Errors raised by the [`StateStore`](crate::state::StateStore)
#[derive(Error, Debug)]
pub enum StoreError {
    /// A cell exists but holds a different type than requested
    #[error("state cell for {identity} does not hold a {expected}")]
    StateTypeMismatch {
        identity: Identity,
        expected: &'static str,
    },

    /// No cell is stored under this identity
    #[error("no state cell for {0}")]
    UnknownIdentity(Identity),

    /// The transfer target already owns a cell
    #[error("identity {0} already owns a state cell")]
    IdentityOccupied(Identity),
}

/// Result type for state store operations
pub type Result<T> = std::result::Result<T, StoreError>;
