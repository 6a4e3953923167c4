//! Host adapter interface
//!
//! After each build the reconciler reports what changed as an ordered list of
//! [`HostEvent`]s: mounts and updates in pre-order, then unmounts. Each
//! removed subtree unmounts in post-order. Removed subtrees follow the order
//! the build found them, so the stale children of a rebuilt node come before
//! the stale siblings of its parent. Reused and carried nodes produce no
//! event.
//!
//! Hosts never mutate tree nodes. Per-node data they need to keep goes into a
//! [`HostAttachments`] map keyed by identity.

use std::sync::Arc;

use blinc_core::Identity;
use rustc_hash::FxHashMap;

use crate::descriptor::Descriptor;
use crate::tree::TreeNode;

/// Change notification for one node
#[derive(Clone, Debug)]
pub enum HostEvent {
    /// Node was created this build
    Mounted(Arc<TreeNode>),
    /// Node re-rendered with a persisting identity
    Updated {
        node: Arc<TreeNode>,
        previous: Descriptor,
    },
    /// Identity is absent from the new tree and its state was released
    Unmounted(Identity),
}

impl HostEvent {
    pub fn identity(&self) -> &Identity {
        match self {
            HostEvent::Mounted(node) | HostEvent::Updated { node, .. } => node.identity(),
            HostEvent::Unmounted(identity) => identity,
        }
    }

    pub fn is_mount(&self) -> bool {
        matches!(self, HostEvent::Mounted(_))
    }

    pub fn is_update(&self) -> bool {
        matches!(self, HostEvent::Updated { .. })
    }

    pub fn is_unmount(&self) -> bool {
        matches!(self, HostEvent::Unmounted(_))
    }
}

/// Receiver of build events
///
/// Callbacks run after the build has completed, so they may not observe a
/// half-built tree and cannot re-enter the reconciler's build.
pub trait HostAdapter {
    type Error;

    fn mounted(&mut self, node: &Arc<TreeNode>) -> Result<(), Self::Error>;

    fn updated(&mut self, node: &Arc<TreeNode>, previous: &Descriptor) -> Result<(), Self::Error>;

    fn unmounted(&mut self, identity: &Identity) -> Result<(), Self::Error>;
}

/// Deliver `events` to `host` in order, stopping at the first error
pub fn dispatch<H: HostAdapter + ?Sized>(
    events: &[HostEvent],
    host: &mut H,
) -> Result<(), H::Error> {
    for event in events {
        match event {
            HostEvent::Mounted(node) => host.mounted(node)?,
            HostEvent::Updated { node, previous } => host.updated(node, previous)?,
            HostEvent::Unmounted(identity) => host.unmounted(identity)?,
        }
    }
    Ok(())
}

/// Opaque host data attached to node identities
#[derive(Debug)]
pub struct HostAttachments<T> {
    entries: FxHashMap<Identity, T>,
}

impl<T> HostAttachments<T> {
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    pub fn insert(&mut self, identity: Identity, value: T) -> Option<T> {
        self.entries.insert(identity, value)
    }

    pub fn get(&self, identity: &Identity) -> Option<&T> {
        self.entries.get(identity)
    }

    pub fn get_mut(&mut self, identity: &Identity) -> Option<&mut T> {
        self.entries.get_mut(identity)
    }

    pub fn remove(&mut self, identity: &Identity) -> Option<T> {
        self.entries.remove(identity)
    }

    /// Drop the entries of every unmounted identity in `events`
    pub fn apply(&mut self, events: &[HostEvent]) {
        for event in events {
            if let HostEvent::Unmounted(identity) = event {
                self.entries.remove(identity);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for HostAttachments<T> {
    fn default() -> Self {
        Self::new()
    }
}
