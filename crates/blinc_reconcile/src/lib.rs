//! Blinc Reconciler
//!
//! Builds trees of component nodes from declarative descriptors, generation
//! after generation, while preserving per-component state:
//!
//! - **Descriptors**: immutable kind + props + key + declared children
//! - **Components**: per-kind render, initial state, equivalence and reuse hook
//! - **Render driver**: create / render / reuse decisions with dirty propagation
//! - **Host events**: mounts, updates and unmounts for an external host
//!
//! # Example
//!
//! ```rust
//! use blinc_reconcile::prelude::*;
//!
//! struct Panel;
//!
//! impl Component for Panel {
//!     type Props = String;
//!     type State = usize;
//!
//!     fn initial_state(&self, input: InitInput<'_, Self>) -> usize {
//!         input.props.len()
//!     }
//!
//!     fn render(&self, input: RenderInput<'_, Self>) -> Vec<Descriptor> {
//!         input.children.to_vec()
//!     }
//!
//!     fn is_equivalent(&self, previous: &Descriptor, next: &Descriptor) -> bool {
//!         previous.structurally_eq(next)
//!     }
//! }
//!
//! let reconciler = Reconciler::new(KindRegistry::new().with(Panel));
//! let mut store = StateStore::new();
//!
//! let ui = Descriptor::new::<Panel>("main".to_string())
//!     .child(Descriptor::new::<Panel>("side".to_string()));
//!
//! let first = reconciler.build(&mut store, ui.clone(), None, &DirtySet::new()).unwrap();
//! assert_eq!(first.events.len(), 2);
//!
//! // Nothing changed: the whole tree is reused
//! let second = reconciler
//!     .build(&mut store, ui, Some(&first.tree), &DirtySet::new())
//!     .unwrap();
//! assert!(second.events.is_empty());
//! assert_eq!(second.stats.reused, 1);
//! ```

pub mod component;
pub mod config;
pub mod descriptor;
pub mod driver;
pub mod error;
pub mod host;
pub mod key;
pub mod registry;
pub mod tree;


pub use component::{Component, InitInput, RenderInput};
pub use config::{BuildConfig, DirtyPropagation};
pub use descriptor::{AnyProps, Descriptor};
pub use driver::{BuildOutput, BuildStats, Reconciler};
pub use error::{ReconcileError, Result};
pub use host::{HostAdapter, HostAttachments, HostEvent};
pub use registry::KindRegistry;
pub use tree::{Tree, TreeNode};

/// Prelude module - import everything commonly needed
pub mod prelude {
    pub use crate::component::{Component, InitInput, RenderInput};
    pub use crate::config::{BuildConfig, DirtyPropagation};
    pub use crate::descriptor::Descriptor;
    pub use crate::driver::{BuildOutput, BuildStats, Reconciler};
    pub use crate::error::{ReconcileError, Result};
    pub use crate::host::{HostAdapter, HostAttachments, HostEvent};
    pub use crate::registry::KindRegistry;
    pub use crate::tree::{Tree, TreeNode};

    pub use blinc_core::{DirtySet, Identity, Key, KindId, StateId, StateStore};
}
