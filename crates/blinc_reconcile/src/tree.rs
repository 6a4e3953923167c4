//! Reconciled component trees
//!
//! A [`Tree`] is the immutable result of one build. Nodes are shared through
//! `Arc`: a reused subtree in generation N+1 is the very same allocation as
//! in generation N. Parent links are identities, never owning pointers.

use std::sync::Arc;

use blinc_core::{Identity, KindId, StateId};

use crate::descriptor::Descriptor;

/// One reconciled component instance
#[derive(Debug)]
pub struct TreeNode {
    pub(crate) identity: Identity,
    pub(crate) descriptor: Descriptor,
    pub(crate) state: StateId,
    pub(crate) children: Vec<Arc<TreeNode>>,
    pub(crate) parent: Option<Identity>,
    pub(crate) generation: u64,
    pub(crate) dirty_from_parent: bool,
    pub(crate) was_reused: bool,
}

impl TreeNode {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn kind(&self) -> KindId {
        self.descriptor.kind()
    }

    /// Descriptor this node was last built or reused from
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Handle to the node's cell in the state store
    pub fn state(&self) -> StateId {
        self.state
    }

    pub fn children(&self) -> &[Arc<TreeNode>] {
        &self.children
    }

    pub fn parent(&self) -> Option<&Identity> {
        self.parent.as_ref()
    }

    /// Generation that last touched this node.
    ///
    /// Subtrees carried over verbatim keep the generation they were built in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Parent rendered or was created in this node's generation
    pub fn dirty_from_parent(&self) -> bool {
        self.dirty_from_parent
    }

    /// Render was skipped and the previous children were kept
    pub fn was_reused(&self) -> bool {
        self.was_reused
    }

    /// Pre-order iterator over this node and its descendants
    pub fn iter(&self) -> Iter<'_> {
        Iter { stack: vec![self] }
    }

    /// Number of nodes in this subtree
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    fn find(&self, identity: &Identity) -> Option<&TreeNode> {
        let mut node = self;
        let segments = identity.segments();
        if segments.first() != Some(node.identity.last()) {
            return None;
        }
        for segment in &segments[1..] {
            node = node
                .children
                .iter()
                .find(|child| child.identity.last() == segment)?;
        }
        Some(node)
    }
}

/// Result of one build generation
#[derive(Clone, Debug)]
pub struct Tree {
    pub(crate) root: Arc<TreeNode>,
    pub(crate) generation: u64,
}

impl Tree {
    pub fn root(&self) -> &Arc<TreeNode> {
        &self.root
    }

    /// 0 for the first build, then one more than the previous tree's
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Node with the given identity, walking its path from the root
    pub fn find(&self, identity: &Identity) -> Option<&TreeNode> {
        self.root.find(identity)
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.find(identity).is_some()
    }

    /// Pre-order iterator over all nodes
    pub fn iter(&self) -> Iter<'_> {
        self.root.iter()
    }

    pub fn len(&self) -> usize {
        self.root.len()
    }

    /// Identities of all nodes, pre-order
    pub fn identities(&self) -> Vec<Identity> {
        self.iter().map(|node| node.identity.clone()).collect()
    }
}

/// Pre-order node iterator
pub struct Iter<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|child| child.as_ref()));
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blinc_core::{Segment, Slot, StateStore};

    struct Root;
    struct Item;

    fn node(
        store: &mut StateStore,
        identity: Identity,
        parent: Option<Identity>,
        children: Vec<Arc<TreeNode>>,
    ) -> Arc<TreeNode> {
        let state = store.acquire(&identity, || Box::new(())).id;
        Arc::new(TreeNode {
            descriptor: Descriptor::dynamic(identity.kind(), ()),
            identity,
            state,
            children,
            parent,
            generation: 0,
            dirty_from_parent: false,
            was_reused: false,
        })
    }

    fn sample(store: &mut StateStore) -> (Tree, Vec<Identity>) {
        let root = Identity::root(Segment::new(KindId::of::<Root>(), Slot::Index(0)));
        let a = root.child(Segment::new(KindId::of::<Item>(), Slot::Key("a".into())));
        let b = a.child(Segment::new(KindId::of::<Item>(), Slot::Index(0)));
        let c = root.child(Segment::new(KindId::of::<Item>(), Slot::Index(0)));

        let b_node = node(store, b.clone(), Some(a.clone()), Vec::new());
        let a_node = node(store, a.clone(), Some(root.clone()), vec![b_node]);
        let c_node = node(store, c.clone(), Some(root.clone()), Vec::new());
        let root_node = node(store, root.clone(), None, vec![a_node, c_node]);

        let tree = Tree {
            root: root_node,
            generation: 0,
        };
        (tree, vec![root, a, b, c])
    }

    #[test]
    fn test_iter_is_pre_order() {
        let mut store = StateStore::new();
        let (tree, expected) = sample(&mut store);
        assert_eq!(tree.identities(), expected);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_find() {
        let mut store = StateStore::new();
        let (tree, ids) = sample(&mut store);

        for id in &ids {
            let found = tree.find(id).unwrap();
            assert_eq!(found.identity(), id);
            assert_eq!(found.state(), store.state_of(id).unwrap());
        }
        assert_eq!(tree.find(&ids[2]).unwrap().parent(), Some(&ids[1]));

        let missing = ids[0].child(Segment::new(KindId::of::<Item>(), Slot::Index(5)));
        assert!(!tree.contains(&missing));

        let other_root = Identity::root(Segment::new(KindId::of::<Item>(), Slot::Index(0)));
        assert!(tree.find(&other_root).is_none());
    }
}
