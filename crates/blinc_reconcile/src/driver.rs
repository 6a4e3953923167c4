//! Render driver: builds a new tree generation from a root descriptor
//!
//! For every position the driver picks one of three paths:
//!
//! - **create**: no predecessor with the same identity. A state cell is
//!   acquired, the kind renders, and every child is built with a dirty parent.
//! - **render**: the identity persists but reuse is not allowed or not
//!   accepted. The state cell is kept and the kind renders again.
//! - **reuse**: the kind's equivalence predicate accepted the new descriptor.
//!   Render is skipped, the reuse hook runs, and the previous children are
//!   adopted as-is.
//!
//! A reused subtree is only re-examined along paths that lead to dirty
//! identities. Everything else under it is shared with the previous tree.
//!
//! Host events are collected during the build but only returned once it has
//! succeeded: mounts and updates in pre-order, followed by the unmounts of
//! every removed subtree in post-order.

use std::borrow::Cow;
use std::sync::Arc;

use blinc_core::{DirtySet, Identity, StateId, StateStore, StoreError};
use rustc_hash::FxHashMap;

use crate::component::{ErasedComponent, Mismatch};
use crate::config::{BuildConfig, DirtyPropagation};
use crate::descriptor::Descriptor;
use crate::error::{ReconcileError, Result};
use crate::host::{self, HostAdapter, HostEvent};
use crate::key;
use crate::registry::KindRegistry;
use crate::tree::{Tree, TreeNode};

/// Per-build counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Nodes on the create path
    pub created: usize,
    /// Nodes on the render path
    pub rendered: usize,
    /// Nodes on the reuse path
    pub reused: usize,
    /// Previous subtrees adopted without being examined
    pub carried: usize,
    pub unmounted: usize,
    /// Equivalence predicate consultations (a verified call counts once)
    pub oracle_calls: usize,
}

/// Everything a build produces
#[derive(Debug)]
pub struct BuildOutput {
    pub tree: Tree,
    pub events: Vec<HostEvent>,
    pub stats: BuildStats,
}

impl BuildOutput {
    /// Deliver the events to `host` in order, stopping at the first error.
    ///
    /// The tree and the state store are already final; a host failure
    /// does not undo the build.
    pub fn dispatch<H: HostAdapter + ?Sized>(&self, host: &mut H) -> std::result::Result<(), H::Error> {
        host::dispatch(&self.events, host)
    }
}

/// Builds component trees for a fixed set of kinds
#[derive(Debug, Default)]
pub struct Reconciler {
    registry: KindRegistry,
    config: BuildConfig,
}

impl Reconciler {
    pub fn new(registry: KindRegistry) -> Self {
        Self {
            registry,
            config: BuildConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BuildConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut KindRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build the next generation.
    ///
    /// Scheduled state changes in `store` run first and their identities are
    /// treated as dirty together with `dirty`. Pass the tree returned by the
    /// previous successful build as `previous`.
    ///
    /// On error `previous` stays valid, state cells created by this build are
    /// released again, and identities touched by scheduled changes are queued
    /// to be dirty in the next build. Mutations made by reuse hooks are not
    /// undone.
    pub fn build(
        &self,
        store: &mut StateStore,
        root: Descriptor,
        previous: Option<&Tree>,
        dirty: &DirtySet,
    ) -> Result<BuildOutput> {
        let generation = previous.map_or(0, |tree| tree.generation() + 1);

        let applied = store.apply_pending()?;
        let dirty = if applied.is_empty() {
            Cow::Borrowed(dirty)
        } else {
            let mut merged = dirty.clone();
            merged.extend(applied.iter().cloned());
            Cow::Owned(merged)
        };
        for identity in dirty.iter() {
            if store.state_of(identity).is_none() {
                tracing::warn!("dirty identity {} has no live state cell; ignored", identity);
            }
        }

        let identity = Identity::root(key::root_segment(&root));
        let mut cx = BuildCx {
            registry: &self.registry,
            config: &self.config,
            store,
            dirty: dirty.as_ref(),
            generation,
            events: Vec::new(),
            removed: Vec::new(),
            created_states: Vec::new(),
            stats: BuildStats::default(),
        };

        match cx.build_node(
            &root,
            identity,
            None,
            previous.map(Tree::root),
            dirty.is_root_dirty(),
        ) {
            Ok(node) => {
                let output = cx.finish(node);
                tracing::debug!(
                    "build generation {}: {} created, {} rendered, {} reused, {} carried, {} unmounted",
                    generation,
                    output.stats.created,
                    output.stats.rendered,
                    output.stats.reused,
                    output.stats.carried,
                    output.stats.unmounted
                );
                Ok(output)
            }
            Err(err) => {
                let store = cx.rollback();
                for identity in applied {
                    store.mark_changed(identity);
                }
                tracing::debug!("build generation {} failed: {}", generation, err);
                Err(err)
            }
        }
    }
}

struct BuildCx<'a> {
    registry: &'a KindRegistry,
    config: &'a BuildConfig,
    store: &'a mut StateStore,
    dirty: &'a DirtySet,
    generation: u64,
    /// Mount/update slots reserved in pre-order, filled once the node exists
    events: Vec<Option<HostEvent>>,
    /// Previous subtrees with no counterpart in the new tree
    removed: Vec<Arc<TreeNode>>,
    /// Cells this build created, released again on failure
    created_states: Vec<Identity>,
    stats: BuildStats,
}

impl<'a> BuildCx<'a> {
    // =========================================================================
    // DECISION
    // =========================================================================

    fn build_node(
        &mut self,
        descriptor: &Descriptor,
        identity: Identity,
        parent: Option<&Identity>,
        previous: Option<&Arc<TreeNode>>,
        dirty_parent: bool,
    ) -> Result<Arc<TreeNode>> {
        self.check_depth(&identity)?;
        let record = self.record(&identity, descriptor)?;

        let Some(previous) = previous else {
            return self.create(&record, descriptor, identity, parent, dirty_parent);
        };

        if previous.kind() != descriptor.kind() || previous.identity() != &identity {
            tracing::trace!("{} replaces {}", identity, previous.identity());
            self.removed.push(Arc::clone(previous));
            return self.create(&record, descriptor, identity, parent, dirty_parent);
        }

        if dirty_parent || self.dirty.contains(&identity) {
            return self.render_existing(&record, descriptor, identity, parent, previous, dirty_parent);
        }

        if self.equivalent(&record, &identity, previous.descriptor(), descriptor)? {
            self.reuse(&record, descriptor, identity, parent, previous)
        } else {
            self.render_existing(&record, descriptor, identity, parent, previous, dirty_parent)
        }
    }

    fn record(&self, identity: &Identity, descriptor: &Descriptor) -> Result<Arc<dyn ErasedComponent>> {
        let record = self
            .registry
            .get(descriptor.kind())
            .ok_or(ReconcileError::UnregisteredKind(descriptor.kind()))?;
        if !record.accepts(descriptor) {
            return Err(mismatch(identity, descriptor, record.as_ref(), Mismatch::Props));
        }
        Ok(Arc::clone(record))
    }

    fn check_depth(&self, identity: &Identity) -> Result<()> {
        if identity.depth() > self.config.max_depth {
            return Err(ReconcileError::DepthExceeded {
                identity: identity.clone(),
                limit: self.config.max_depth,
            });
        }
        Ok(())
    }

    fn equivalent(
        &mut self,
        record: &Arc<dyn ErasedComponent>,
        identity: &Identity,
        previous: &Descriptor,
        next: &Descriptor,
    ) -> Result<bool> {
        self.stats.oracle_calls += 1;
        let forward = record.is_equivalent(previous, next);
        if self.config.verify_equivalence && record.is_equivalent(next, previous) != forward {
            return Err(ReconcileError::InconsistentEquivalence(identity.clone()));
        }
        Ok(forward)
    }

    /// Whether children of a node on the render path start with a dirty parent
    fn children_dirty(&self, identity: &Identity, dirty_parent: bool) -> bool {
        match self.config.dirty_propagation {
            DirtyPropagation::OnRender => true,
            DirtyPropagation::OnStateChange => dirty_parent || self.dirty.contains(identity),
        }
    }

    // =========================================================================
    // PATHS
    // =========================================================================

    fn create(
        &mut self,
        record: &Arc<dyn ErasedComponent>,
        descriptor: &Descriptor,
        identity: Identity,
        parent: Option<&Identity>,
        dirty_parent: bool,
    ) -> Result<Arc<TreeNode>> {
        let acquired = self
            .store
            .try_acquire(&identity, || record.initial_state(&identity, descriptor))
            .map_err(|m| mismatch(&identity, descriptor, record.as_ref(), m))?;
        if acquired.created {
            self.created_states.push(identity.clone());
        }
        tracing::trace!("create {}", identity);
        self.stats.created += 1;

        let slot = self.reserve_event();
        let declared = self.render(record, &identity, descriptor, acquired.id)?;
        let children = self.build_children(&identity, &declared, &[], true)?;

        let node = Arc::new(TreeNode {
            identity,
            descriptor: descriptor.clone(),
            state: acquired.id,
            children,
            parent: parent.cloned(),
            generation: self.generation,
            dirty_from_parent: dirty_parent,
            was_reused: false,
        });
        self.events[slot] = Some(HostEvent::Mounted(Arc::clone(&node)));
        Ok(node)
    }

    fn render_existing(
        &mut self,
        record: &Arc<dyn ErasedComponent>,
        descriptor: &Descriptor,
        identity: Identity,
        parent: Option<&Identity>,
        previous: &Arc<TreeNode>,
        dirty_parent: bool,
    ) -> Result<Arc<TreeNode>> {
        let state = self.live_state(&identity)?;
        tracing::trace!("render {}", identity);
        self.stats.rendered += 1;

        let slot = self.reserve_event();
        let declared = self.render(record, &identity, descriptor, state)?;
        let child_dirty = self.children_dirty(&identity, dirty_parent);
        let children = self.build_children(&identity, &declared, previous.children(), child_dirty)?;

        let node = Arc::new(TreeNode {
            identity,
            descriptor: descriptor.clone(),
            state,
            children,
            parent: parent.cloned(),
            generation: self.generation,
            dirty_from_parent: dirty_parent,
            was_reused: false,
        });
        self.events[slot] = Some(HostEvent::Updated {
            node: Arc::clone(&node),
            previous: previous.descriptor().clone(),
        });
        Ok(node)
    }

    fn reuse(
        &mut self,
        record: &Arc<dyn ErasedComponent>,
        descriptor: &Descriptor,
        identity: Identity,
        parent: Option<&Identity>,
        previous: &Arc<TreeNode>,
    ) -> Result<Arc<TreeNode>> {
        let state = self.live_state(&identity)?;
        let cell = self
            .store
            .get_any_mut(state)
            .ok_or_else(|| ReconcileError::MissingState(identity.clone()))?;
        record
            .did_reuse(previous.descriptor(), descriptor, cell)
            .map_err(|m| mismatch(&identity, descriptor, record.as_ref(), m))?;
        tracing::trace!("reuse {}", identity);
        self.stats.reused += 1;

        let children = if self.dirty.has_dirty_descendant(&identity) {
            self.descend(&identity, previous.children())?
        } else {
            self.stats.carried += previous.children().len();
            previous.children().to_vec()
        };

        Ok(Arc::new(TreeNode {
            identity,
            descriptor: descriptor.clone(),
            state,
            children,
            parent: parent.cloned(),
            generation: self.generation,
            dirty_from_parent: false,
            was_reused: true,
        }))
    }

    /// Walk the previous children of a reused node down to dirty identities.
    ///
    /// Nothing here has a new descriptor: dirty nodes re-render from their
    /// previous one, nodes above them are rebuilt around the new children,
    /// and every other subtree is shared.
    fn descend(&mut self, parent: &Identity, previous: &[Arc<TreeNode>]) -> Result<Vec<Arc<TreeNode>>> {
        let mut children = Vec::with_capacity(previous.len());

        for child in previous {
            let identity = child.identity();
            if self.dirty.contains(identity) {
                self.check_depth(identity)?;
                let record = self.record(identity, child.descriptor())?;
                children.push(self.render_existing(
                    &record,
                    child.descriptor(),
                    identity.clone(),
                    Some(parent),
                    child,
                    false,
                )?);
            } else if self.dirty.has_dirty_descendant(identity) {
                self.check_depth(identity)?;
                tracing::trace!("descend through {}", identity);
                let grandchildren = self.descend(identity, child.children())?;
                children.push(Arc::new(TreeNode {
                    identity: identity.clone(),
                    descriptor: child.descriptor().clone(),
                    state: child.state(),
                    children: grandchildren,
                    parent: Some(parent.clone()),
                    generation: self.generation,
                    dirty_from_parent: false,
                    was_reused: true,
                }));
            } else {
                self.stats.carried += 1;
                children.push(Arc::clone(child));
            }
        }

        Ok(children)
    }

    // =========================================================================
    // CHILDREN
    // =========================================================================

    /// Match declared children against the previous children by segment
    fn build_children(
        &mut self,
        parent: &Identity,
        declared: &[Descriptor],
        previous: &[Arc<TreeNode>],
        dirty_parent: bool,
    ) -> Result<Vec<Arc<TreeNode>>> {
        let segments = key::assign_segments(parent, declared)?;
        let mut unmatched: FxHashMap<_, &Arc<TreeNode>> = previous
            .iter()
            .map(|child| (child.identity().last(), child))
            .collect();

        let mut children = Vec::with_capacity(declared.len());
        for (descriptor, segment) in declared.iter().zip(segments) {
            let candidate = unmatched.remove(&segment);
            let identity = parent.child(segment);
            children.push(self.build_node(descriptor, identity, Some(parent), candidate, dirty_parent)?);
        }

        for child in previous {
            if unmatched.contains_key(child.identity().last()) {
                self.removed.push(Arc::clone(child));
            }
        }

        Ok(children)
    }

    fn render(
        &self,
        record: &Arc<dyn ErasedComponent>,
        identity: &Identity,
        descriptor: &Descriptor,
        state: StateId,
    ) -> Result<Vec<Descriptor>> {
        let cell = self
            .store
            .get_any(state)
            .ok_or_else(|| ReconcileError::MissingState(identity.clone()))?;
        record
            .render(identity, descriptor, cell)
            .map_err(|m| mismatch(identity, descriptor, record.as_ref(), m))
    }

    fn live_state(&self, identity: &Identity) -> Result<StateId> {
        self.store
            .state_of(identity)
            .ok_or_else(|| ReconcileError::MissingState(identity.clone()))
    }

    fn reserve_event(&mut self) -> usize {
        self.events.push(None);
        self.events.len() - 1
    }

    // =========================================================================
    // COMPLETION
    // =========================================================================

    fn finish(self, root: Arc<TreeNode>) -> BuildOutput {
        let BuildCx {
            store,
            generation,
            events,
            removed,
            mut stats,
            ..
        } = self;

        let mut events: Vec<HostEvent> = events.into_iter().flatten().collect();
        for node in &removed {
            unmount(store, node, &mut events, &mut stats);
        }

        BuildOutput {
            tree: Tree { root, generation },
            events,
            stats,
        }
    }

    fn rollback(self) -> &'a mut StateStore {
        for identity in &self.created_states {
            self.store.release(identity);
        }
        self.store
    }
}

/// Release `node`'s subtree and record its unmounts, children first
fn unmount(store: &mut StateStore, node: &TreeNode, events: &mut Vec<HostEvent>, stats: &mut BuildStats) {
    for child in node.children() {
        unmount(store, child, events, stats);
    }
    store.release(node.identity());
    stats.unmounted += 1;
    tracing::trace!("unmount {}", node.identity());
    events.push(HostEvent::Unmounted(node.identity().clone()));
}

fn mismatch(
    identity: &Identity,
    descriptor: &Descriptor,
    record: &dyn ErasedComponent,
    mismatch: Mismatch,
) -> ReconcileError {
    match mismatch {
        Mismatch::Props => ReconcileError::KindMismatch {
            identity: identity.clone(),
            expected: descriptor.kind(),
            found: descriptor.props_type_name(),
        },
        Mismatch::State => ReconcileError::Store(StoreError::StateTypeMismatch {
            identity: identity.clone(),
            expected: record.state_type_name(),
        }),
    }
}
