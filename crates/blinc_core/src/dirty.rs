//! Identities that must re-render in the next build
//!
//! Besides the dirty identities themselves, the set tracks every strict
//! ancestor of a dirty identity. A node on such a path may still be reused,
//! but its previous subtree cannot be carried over verbatim: the build has to
//! walk down to the dirty descendants.

use rustc_hash::FxHashSet;

use crate::identity::Identity;

/// Set of identities known to require re-render
#[derive(Clone, Debug, Default)]
pub struct DirtySet {
    identities: FxHashSet<Identity>,
    on_path: FxHashSet<Identity>,
    root: bool,
}

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set that forces the whole tree to re-render
    pub fn all() -> Self {
        Self {
            root: true,
            ..Self::default()
        }
    }

    /// Mark `identity` dirty
    pub fn mark(&mut self, identity: Identity) {
        if self.identities.contains(&identity) {
            return;
        }
        for ancestor in identity.ancestors() {
            self.on_path.insert(ancestor);
        }
        self.identities.insert(identity);
    }

    /// Treat the root as having a dirty parent
    pub fn mark_root(&mut self) {
        self.root = true;
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.identities.contains(identity)
    }

    /// True if a strict descendant of `identity` is dirty
    pub fn has_dirty_descendant(&self, identity: &Identity) -> bool {
        self.on_path.contains(identity)
    }

    pub fn is_root_dirty(&self) -> bool {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty() && !self.root
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.identities.iter()
    }
}

impl Extend<Identity> for DirtySet {
    fn extend<I: IntoIterator<Item = Identity>>(&mut self, iter: I) {
        for identity in iter {
            self.mark(identity);
        }
    }
}

impl FromIterator<Identity> for DirtySet {
    fn from_iter<I: IntoIterator<Item = Identity>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{KindId, Segment, Slot};

    struct Root;
    struct Item;

    #[test]
    fn test_mark_tracks_ancestors() {
        let root = Identity::root(Segment::new(KindId::of::<Root>(), Slot::Index(0)));
        let a = root.child(Segment::new(KindId::of::<Item>(), Slot::Index(0)));
        let b = a.child(Segment::new(KindId::of::<Item>(), Slot::Index(0)));
        let sibling = root.child(Segment::new(KindId::of::<Item>(), Slot::Index(1)));

        let dirty: DirtySet = [b.clone()].into_iter().collect();

        assert!(dirty.contains(&b));
        assert!(!dirty.contains(&a));
        assert!(dirty.has_dirty_descendant(&root));
        assert!(dirty.has_dirty_descendant(&a));
        assert!(!dirty.has_dirty_descendant(&b));
        assert!(!dirty.has_dirty_descendant(&sibling));
        assert_eq!(dirty.len(), 1);
    }

    #[test]
    fn test_empty_and_all() {
        assert!(DirtySet::new().is_empty());

        let all = DirtySet::all();
        assert!(all.is_root_dirty());
        assert!(!all.is_empty());
        assert_eq!(all.len(), 0);
    }
}
