//! Stable identity for component tree nodes
//!
//! A node's identity is the path of [`Segment`]s from the root to the node.
//! Each segment names the component kind and the node's slot among its
//! siblings: either the user-supplied [`Key`], or its position among the
//! keyless siblings of the same kind.
//!
//! Because identity is a path, any prefix of an identity is the identity of
//! one of its ancestors. The dirty set relies on this to find the ancestors
//! of a state change without walking the tree.
//!
//! ```rust
//! use blinc_core::identity::{Identity, KindId, Segment, Slot};
//!
//! struct Root;
//! struct Row;
//!
//! let root = Identity::root(Segment::new(KindId::of::<Root>(), Slot::Index(0)));
//! let row = root.child(Segment::new(KindId::of::<Row>(), Slot::Key("first".into())));
//!
//! assert!(root.is_ancestor_of(&row));
//! assert_eq!(row.parent(), Some(root.clone()));
//! assert_eq!(row.to_string(), "Root#0/Row[first]");
//! ```

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use smallvec::SmallVec;

/// Identifies a component class.
///
/// Two kind ids are equal iff they were created from the same Rust type.
/// The name is kept for diagnostics and by-name lookup.
#[derive(Clone, Copy)]
pub struct KindId {
    type_id: TypeId,
    name: &'static str,
}

impl KindId {
    /// Kind id for the component type `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
        }
    }

    /// Short type name of the component (module path stripped)
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }
}

impl PartialEq for KindId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for KindId {}

impl Hash for KindId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KindId({})", self.name)
    }
}

impl fmt::Display for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// User-supplied identity token for a component instance
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(Arc<str>),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(value) => write!(f, "{value}"),
            Key::Str(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(Arc::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(Arc::from(value))
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

/// Position of a node among its siblings
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Explicit key, matched by key within kind
    Key(Key),
    /// Index among the keyless siblings of the same kind
    Index(u32),
}

/// One step of an identity path
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Segment {
    kind: KindId,
    slot: Slot,
}

impl Segment {
    pub fn new(kind: KindId, slot: Slot) -> Self {
        Self { kind, slot }
    }

    pub fn kind(&self) -> KindId {
        self.kind
    }

    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    pub fn key(&self) -> Option<&Key> {
        match &self.slot {
            Slot::Key(key) => Some(key),
            Slot::Index(_) => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.slot {
            Slot::Key(key) => write!(f, "{}[{}]", self.kind, key),
            Slot::Index(index) => write!(f, "{}#{}", self.kind, index),
        }
    }
}

/// Stable identity of a tree node: the segment path from the root.
///
/// Cheap to clone. Never empty.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    segments: Arc<[Segment]>,
}

impl Identity {
    /// Identity of a root node
    pub fn root(segment: Segment) -> Self {
        Self {
            segments: Arc::from([segment]),
        }
    }

    /// Identity of a child of this node
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments: SmallVec<[Segment; 8]> = SmallVec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(segment);
        Self {
            segments: Arc::from(segments.as_slice()),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The node's own segment
    pub fn last(&self) -> &Segment {
        // Constructors never produce an empty path
        &self.segments[self.segments.len() - 1]
    }

    pub fn kind(&self) -> KindId {
        self.last().kind()
    }

    pub fn key(&self) -> Option<&Key> {
        self.last().key()
    }

    /// Number of segments; the root has depth 1
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    pub fn parent(&self) -> Option<Identity> {
        (!self.is_root()).then(|| self.prefix(self.segments.len() - 1))
    }

    /// True if `other` lies strictly below this identity
    pub fn is_ancestor_of(&self, other: &Identity) -> bool {
        other.segments.len() > self.segments.len() && other.segments.starts_with(&self.segments)
    }

    /// All strict ancestors, root first
    pub fn ancestors(&self) -> impl Iterator<Item = Identity> + '_ {
        (1..self.segments.len()).map(move |len| self.prefix(len))
    }

    /// Re-root this identity from `from` onto `to`.
    ///
    /// Returns `None` unless `from` is this identity or one of its ancestors.
    pub fn rebase(&self, from: &Identity, to: &Identity) -> Option<Identity> {
        if !self.segments.starts_with(&from.segments) {
            return None;
        }
        let rest = &self.segments[from.segments.len()..];
        let segments: Vec<Segment> = to.segments.iter().chain(rest).cloned().collect();
        Some(Self {
            segments: Arc::from(segments),
        })
    }

    fn prefix(&self, len: usize) -> Identity {
        Self {
            segments: Arc::from(&self.segments[..len]),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({self})")
    }
}
