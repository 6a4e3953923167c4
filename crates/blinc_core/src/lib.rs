//! Blinc Core
//!
//! Foundational primitives shared by the Blinc reconciler:
//!
//! - **Identity**: stable path-based keys for component nodes across builds
//! - **State Store**: per-identity state cells that outlive individual trees
//! - **Dirty Set**: identities that must re-render, plus their ancestor paths
//!
//! # Example
//!
//! ```rust
//! use blinc_core::{DirtySet, Identity, KindId, Segment, Slot, StateStore};
//!
//! struct Root;
//! let root = Identity::root(Segment::new(KindId::of::<Root>(), Slot::Index(0)));
//!
//! let mut store = StateStore::new();
//! let cell = store.acquire(&root, || Box::new(String::from("hello"))).id;
//! assert_eq!(store.state_of(&root), Some(cell));
//!
//! let mut dirty = DirtySet::new();
//! dirty.mark(root.clone());
//! assert!(dirty.contains(&root));
//! ```

pub mod dirty;
pub mod error;
pub mod identity;
pub mod state;

pub use dirty::DirtySet;
pub use error::StoreError;
pub use identity::{Identity, Key, KindId, Segment, Slot};
pub use state::{Acquired, BoxedState, StateId, StateStore, StoreStats};
