//! Per-component state cells preserved across build generations
//!
//! The [`StateStore`] maps each live [`Identity`] to one type-erased state
//! cell. Cells are created the first time an identity mounts, survive every
//! build in which the identity persists, and are destroyed when it unmounts.
//!
//! The store is the only long-lived mutable state of the reconciler. It is
//! passed into every build explicitly; hosts that want a global one build it
//! themselves.
//!
//! # Scheduled state changes
//!
//! Hosts do not mutate cells while a tree is being built. Instead they queue
//! a mutation with [`StateStore::schedule_state_change`]; the next build
//! applies all queued mutations before traversal and marks their identities
//! dirty.
//!
//! ```rust
//! use blinc_core::identity::{Identity, KindId, Segment, Slot};
//! use blinc_core::state::StateStore;
//!
//! struct Counter;
//! let id = Identity::root(Segment::new(KindId::of::<Counter>(), Slot::Index(0)));
//!
//! let mut store = StateStore::new();
//! let cell = store.acquire(&id, || Box::new(0i32)).id;
//!
//! store.schedule_state_change::<i32>(id.clone(), |count| *count += 1);
//! let dirty = store.apply_pending().unwrap();
//!
//! assert_eq!(dirty, vec![id]);
//! assert_eq!(store.get::<i32>(cell), Some(&1));
//! ```

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::error::{Result, StoreError};
use crate::identity::Identity;

new_key_type! {
    /// Handle to a state cell
    ///
    /// Handles are versioned: once a cell is released its handle never
    /// resolves again, even if the same identity later acquires a new cell.
    pub struct StateId;
}

/// Type-erased state value
pub type BoxedState = Box<dyn Any + Send>;

type StateMutator = Box<dyn FnOnce(&mut (dyn Any + Send)) -> bool + Send>;

struct StateCell {
    identity: Identity,
    value: BoxedState,
}

struct PendingChange {
    identity: Identity,
    expected: &'static str,
    apply: StateMutator,
}

impl PendingChange {
    /// Change that leaves the cell alone but still marks it dirty
    fn marker(identity: Identity) -> Self {
        Self {
            identity,
            expected: "any",
            apply: Box::new(|_: &mut (dyn Any + Send)| true),
        }
    }
}

/// Result of [`StateStore::acquire`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Acquired {
    pub id: StateId,
    /// True if the cell was constructed by this call
    pub created: bool,
}

/// Identity-keyed storage for component state cells
pub struct StateStore {
    cells: SlotMap<StateId, StateCell>,
    by_identity: FxHashMap<Identity, StateId>,
    pending: VecDeque<PendingChange>,
    created_total: u64,
    released_total: u64,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            cells: SlotMap::with_key(),
            by_identity: FxHashMap::default(),
            pending: VecDeque::new(),
            created_total: 0,
            released_total: 0,
        }
    }

    // =========================================================================
    // CELL LIFECYCLE
    // =========================================================================

    /// Return the cell for `identity`, constructing it with `init` if absent
    pub fn acquire<F>(&mut self, identity: &Identity, init: F) -> Acquired
    where
        F: FnOnce() -> BoxedState,
    {
        match self.try_acquire::<_, std::convert::Infallible>(identity, || Ok(init())) {
            Ok(acquired) => acquired,
            Err(never) => match never {},
        }
    }

    /// Like [`acquire`](Self::acquire) with a fallible initializer.
    ///
    /// `init` only runs when no cell exists; its error is returned as-is and
    /// leaves the store unchanged.
    pub fn try_acquire<F, E>(&mut self, identity: &Identity, init: F) -> std::result::Result<Acquired, E>
    where
        F: FnOnce() -> std::result::Result<BoxedState, E>,
    {
        if let Some(&id) = self.by_identity.get(identity) {
            return Ok(Acquired { id, created: false });
        }

        let value = init()?;
        let id = self.cells.insert(StateCell {
            identity: identity.clone(),
            value,
        });
        self.by_identity.insert(identity.clone(), id);
        self.created_total += 1;
        tracing::trace!("state cell created for {}", identity);
        Ok(Acquired { id, created: true })
    }

    /// Destroy the cell owned by `identity`.
    ///
    /// Returns false if there was none. A later `acquire` yields a fresh cell.
    pub fn release(&mut self, identity: &Identity) -> bool {
        let Some(id) = self.by_identity.remove(identity) else {
            return false;
        };
        self.cells.remove(id);
        self.released_total += 1;
        tracing::trace!("state cell released for {}", identity);
        true
    }

    /// Rekey the cell of `from` (and the cells of its descendants) to `to`.
    ///
    /// Used when a key is renamed and the host wants the state to follow.
    /// Fails without changing anything if `from` owns no cell or any
    /// rekeyed identity is already occupied.
    pub fn transfer(&mut self, from: &Identity, to: &Identity) -> Result<StateId> {
        let root = *self
            .by_identity
            .get(from)
            .ok_or_else(|| StoreError::UnknownIdentity(from.clone()))?;

        let mut moves: Vec<(Identity, Identity, StateId)> = self
            .by_identity
            .iter()
            .filter_map(|(identity, &id)| {
                identity
                    .rebase(from, to)
                    .map(|target| (identity.clone(), target, id))
            })
            .collect();
        // Deterministic order for tracing
        moves.sort_by_key(|(identity, _, _)| identity.depth());

        for (_, target, _) in &moves {
            let vacated = moves.iter().any(|(source, _, _)| source == target);
            if self.by_identity.contains_key(target) && !vacated {
                return Err(StoreError::IdentityOccupied(target.clone()));
            }
        }

        for (source, _, _) in &moves {
            self.by_identity.remove(source);
        }
        for (source, target, id) in moves {
            if let Some(cell) = self.cells.get_mut(id) {
                cell.identity = target.clone();
            }
            tracing::debug!("state cell moved from {} to {}", source, target);
            self.by_identity.insert(target, id);
        }

        Ok(root)
    }

    // =========================================================================
    // ACCESS
    // =========================================================================

    /// Cell currently owned by `identity`
    pub fn state_of(&self, identity: &Identity) -> Option<StateId> {
        self.by_identity.get(identity).copied()
    }

    /// Identity that owns the cell
    pub fn identity_of(&self, id: StateId) -> Option<&Identity> {
        self.cells.get(id).map(|cell| &cell.identity)
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.cells.contains_key(id)
    }

    pub fn get<T: 'static>(&self, id: StateId) -> Option<&T> {
        self.cells.get(id).and_then(|cell| cell.value.downcast_ref::<T>())
    }

    pub fn get_mut<T: 'static>(&mut self, id: StateId) -> Option<&mut T> {
        self.cells
            .get_mut(id)
            .and_then(|cell| cell.value.downcast_mut::<T>())
    }

    pub fn get_any(&self, id: StateId) -> Option<&(dyn Any + Send)> {
        self.cells.get(id).map(|cell| cell.value.as_ref())
    }

    pub fn get_any_mut(&mut self, id: StateId) -> Option<&mut (dyn Any + Send)> {
        self.cells.get_mut(id).map(|cell| cell.value.as_mut())
    }

    /// Number of live cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    // =========================================================================
    // SCHEDULED CHANGES
    // =========================================================================

    /// Queue a mutation of the cell owned by `identity`.
    ///
    /// The mutation runs at the start of the next build, which also treats
    /// `identity` as dirty.
    pub fn schedule_state_change<T: 'static>(
        &mut self,
        identity: Identity,
        mutator: impl FnOnce(&mut T) + Send + 'static,
    ) {
        let apply: StateMutator = Box::new(move |value: &mut (dyn Any + Send)| {
            match value.downcast_mut::<T>() {
                Some(state) => {
                    mutator(state);
                    true
                }
                None => false,
            }
        });
        self.pending.push_back(PendingChange {
            identity,
            expected: std::any::type_name::<T>(),
            apply,
        });
    }

    /// Queue a re-render of `identity` without changing its cell
    pub fn mark_changed(&mut self, identity: Identity) {
        self.pending.push_back(PendingChange::marker(identity));
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Run queued mutations in scheduling order.
    ///
    /// Returns the identities whose cells were mutated. Changes targeting an
    /// identity with no live cell are dropped. On a type mismatch the failing
    /// change is dropped, later changes stay queued, and the identities
    /// already mutated are queued ahead of them so they stay dirty.
    pub fn apply_pending(&mut self) -> Result<Vec<Identity>> {
        let mut touched = Vec::new();

        while let Some(change) = self.pending.pop_front() {
            let Some(&id) = self.by_identity.get(&change.identity) else {
                tracing::warn!(
                    "dropping state change for {}: no live state cell",
                    change.identity
                );
                continue;
            };
            let Some(cell) = self.cells.get_mut(id) else {
                continue;
            };

            if !(change.apply)(cell.value.as_mut()) {
                for identity in touched.into_iter().rev() {
                    self.pending.push_front(PendingChange::marker(identity));
                }
                return Err(StoreError::StateTypeMismatch {
                    identity: change.identity,
                    expected: change.expected,
                });
            }
            if !touched.contains(&change.identity) {
                touched.push(change.identity);
            }
        }

        Ok(touched)
    }

    /// Lifetime counters
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            live: self.cells.len(),
            created: self.created_total,
            released: self.released_total,
            pending: self.pending.len(),
        }
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("live", &self.cells.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Statistics about the state store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub live: usize,
    pub created: u64,
    pub released: u64,
    pub pending: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{KindId, Segment, Slot};

    struct Root;
    struct Item;

    fn root() -> Identity {
        Identity::root(Segment::new(KindId::of::<Root>(), Slot::Index(0)))
    }

    fn item(parent: &Identity, key: &str) -> Identity {
        parent.child(Segment::new(KindId::of::<Item>(), Slot::Key(key.into())))
    }

    #[test]
    fn test_acquire_returns_existing_cell() {
        let mut store = StateStore::new();
        let id = root();

        let first = store.acquire(&id, || Box::new(1i32));
        assert!(first.created);

        let second = store.acquire(&id, || Box::new(99i32));
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(store.get::<i32>(second.id), Some(&1));
    }

    #[test]
    fn test_release_then_acquire_is_fresh() {
        let mut store = StateStore::new();
        let id = root();

        let first = store.acquire(&id, || Box::new(1i32)).id;
        assert!(store.release(&id));
        assert!(!store.release(&id));
        assert!(!store.contains(first));

        let second = store.acquire(&id, || Box::new(2i32)).id;
        assert_ne!(first, second);
        assert_eq!(store.get::<i32>(first), None);
        assert_eq!(store.get::<i32>(second), Some(&2));
    }

    #[test]
    fn test_try_acquire_error_leaves_store_unchanged() {
        let mut store = StateStore::new();
        let result: std::result::Result<Acquired, &str> = store.try_acquire(&root(), || Err("nope"));
        assert_eq!(result, Err("nope"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_wrong_type() {
        let mut store = StateStore::new();
        let id = store.acquire(&root(), || Box::new(1i32)).id;
        assert_eq!(store.get::<String>(id), None);
        assert!(store.get_any(id).is_some());
    }

    #[test]
    fn test_transfer_moves_subtree() {
        let mut store = StateStore::new();
        let root = root();
        let old = item(&root, "old");
        let new = item(&root, "new");
        let below = item(&old, "leaf");

        let cell = store.acquire(&old, || Box::new(String::from("kept"))).id;
        let leaf = store.acquire(&below, || Box::new(5u8)).id;

        assert_eq!(store.transfer(&old, &new).unwrap(), cell);

        assert_eq!(store.state_of(&old), None);
        assert_eq!(store.state_of(&new), Some(cell));
        assert_eq!(store.state_of(&item(&new, "leaf")), Some(leaf));
        assert_eq!(store.identity_of(cell), Some(&new));
        assert_eq!(store.get::<String>(cell).map(String::as_str), Some("kept"));
    }

    #[test]
    fn test_transfer_errors() {
        let mut store = StateStore::new();
        let root = root();
        let a = item(&root, "a");
        let b = item(&root, "b");

        assert!(matches!(
            store.transfer(&a, &b),
            Err(StoreError::UnknownIdentity(_))
        ));

        store.acquire(&a, || Box::new(1i32));
        store.acquire(&b, || Box::new(2i32));
        assert!(matches!(
            store.transfer(&a, &b),
            Err(StoreError::IdentityOccupied(_))
        ));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_scheduled_changes_apply_in_order() {
        let mut store = StateStore::new();
        let id = root();
        let cell = store.acquire(&id, || Box::new(Vec::<u32>::new())).id;

        store.schedule_state_change::<Vec<u32>>(id.clone(), |v| v.push(1));
        store.schedule_state_change::<Vec<u32>>(id.clone(), |v| v.push(2));
        assert!(store.has_pending());

        let touched = store.apply_pending().unwrap();
        assert_eq!(touched, vec![id]);
        assert_eq!(store.get::<Vec<u32>>(cell), Some(&vec![1, 2]));
        assert!(!store.has_pending());
    }

    #[test]
    fn test_mark_changed_keeps_value() {
        let mut store = StateStore::new();
        let id = root();
        let cell = store.acquire(&id, || Box::new(7u8)).id;

        store.mark_changed(id.clone());
        store.mark_changed(id.clone());

        assert_eq!(store.apply_pending().unwrap(), vec![id]);
        assert_eq!(store.get::<u8>(cell), Some(&7));
    }

    #[test]
    fn test_scheduled_change_without_cell_is_dropped() {
        let mut store = StateStore::new();
        store.schedule_state_change::<i32>(root(), |v| *v += 1);
        assert_eq!(store.apply_pending().unwrap(), Vec::<Identity>::new());
        assert!(!store.has_pending());
    }

    #[test]
    fn test_scheduled_change_type_mismatch() {
        let mut store = StateStore::new();
        let id = root();
        store.acquire(&id, || Box::new(1i32));

        store.schedule_state_change::<String>(id.clone(), |s| s.push('x'));
        store.schedule_state_change::<i32>(id.clone(), |v| *v += 1);

        assert!(matches!(
            store.apply_pending(),
            Err(StoreError::StateTypeMismatch { .. })
        ));
        // The following change is still queued
        assert_eq!(store.stats().pending, 1);
    }

    #[test]
    fn test_type_mismatch_requeues_mutated_identities() {
        let mut store = StateStore::new();
        let root = root();
        let first = item(&root, "a");
        let second = item(&root, "b");
        let cell = store.acquire(&first, || Box::new(String::from("a"))).id;
        store.acquire(&second, || Box::new(1i32));

        store.schedule_state_change::<String>(first.clone(), |s| s.push('!'));
        store.schedule_state_change::<String>(second.clone(), |s| s.push('?'));
        store.schedule_state_change::<i32>(second.clone(), |v| *v += 1);

        assert!(store.apply_pending().is_err());
        assert_eq!(store.get::<String>(cell).map(String::as_str), Some("a!"));

        // Mutated identity first, then the change after the failing one
        assert_eq!(store.stats().pending, 2);
        assert_eq!(store.apply_pending().unwrap(), vec![first, second]);
        assert_eq!(store.get::<String>(cell).map(String::as_str), Some("a!"));
    }

    #[test]
    fn test_stats() {
        let mut store = StateStore::new();
        let root = root();
        store.acquire(&root, || Box::new(()));
        store.acquire(&item(&root, "x"), || Box::new(()));
        store.release(&root);

        let stats = store.stats();
        assert_eq!(stats.live, 1);
        assert_eq!(stats.created, 2);
        assert_eq!(stats.released, 1);
    }
}
