//! Immutable declarative component descriptions
//!
//! A [`Descriptor`] is what user code produces: the component kind, its props
//! payload, an optional key, and the declared child descriptors. Descriptors
//! are cheap to clone and never change once built.
//!
//! # Example
//!
//! ```ignore
//! let list = Descriptor::new::<List>(ListProps::default())
//!     .child(Descriptor::new::<Row>(RowProps::new("a")).with_key("a"))
//!     .child(Descriptor::new::<Row>(RowProps::new("b")).with_key("b"));
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use blinc_core::{Key, KindId};

use crate::component::Component;

/// Type-erased props payload with a kind-specific equality predicate.
///
/// Implemented for every `PartialEq + Debug` type. The equality must be
/// reflexive, symmetric, transitive, and free of side effects.
pub trait AnyProps: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;

    /// Props equality; false when `other` has a different type
    fn props_eq(&self, other: &dyn AnyProps) -> bool;

    fn type_name(&self) -> &'static str;
}

impl<T> AnyProps for T
where
    T: PartialEq + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn props_eq(&self, other: &dyn AnyProps) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

#[derive(Clone)]
struct DescriptorInner {
    kind: KindId,
    props: Arc<dyn AnyProps>,
    key: Option<Key>,
    children: Vec<Descriptor>,
}

/// Declarative description of one component instance
#[derive(Clone)]
pub struct Descriptor {
    inner: Arc<DescriptorInner>,
}

impl Descriptor {
    /// Describe an instance of component `C`
    pub fn new<C: Component>(props: C::Props) -> Self {
        Self::dynamic(KindId::of::<C>(), props)
    }

    /// Describe an instance of a kind chosen at runtime.
    ///
    /// The props type is checked against the registered kind when the
    /// descriptor is built into a tree.
    pub fn dynamic<P: AnyProps>(kind: KindId, props: P) -> Self {
        Self {
            inner: Arc::new(DescriptorInner {
                kind,
                props: Arc::new(props),
                key: None,
                children: Vec::new(),
            }),
        }
    }

    /// Set the identity key
    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        Arc::make_mut(&mut self.inner).key = Some(key.into());
        self
    }

    /// Append a declared child
    pub fn child(mut self, child: Descriptor) -> Self {
        Arc::make_mut(&mut self.inner).children.push(child);
        self
    }

    /// Append declared children
    pub fn with_children(mut self, children: impl IntoIterator<Item = Descriptor>) -> Self {
        Arc::make_mut(&mut self.inner).children.extend(children);
        self
    }

    pub fn kind(&self) -> KindId {
        self.inner.kind
    }

    pub fn key(&self) -> Option<&Key> {
        self.inner.key.as_ref()
    }

    pub fn children(&self) -> &[Descriptor] {
        &self.inner.children
    }

    /// Typed props, if they are a `P`
    pub fn props<P: 'static>(&self) -> Option<&P> {
        self.inner.props.as_any().downcast_ref::<P>()
    }

    pub fn props_any(&self) -> &dyn AnyProps {
        self.inner.props.as_ref()
    }

    pub fn props_type_name(&self) -> &'static str {
        self.inner.props.type_name()
    }

    /// Same kind and equal props (key and children not compared)
    pub fn props_eq(&self, other: &Descriptor) -> bool {
        self.kind() == other.kind() && self.inner.props.props_eq(other.inner.props.as_ref())
    }

    /// True if both handles point at the same description
    pub fn ptr_eq(&self, other: &Descriptor) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Kind, key, props and declared children are all equal.
    ///
    /// Kinds whose render output depends only on these can use this as
    /// their equivalence predicate.
    pub fn structurally_eq(&self, other: &Descriptor) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.props_eq(other)
            && self.key() == other.key()
            && self.children().len() == other.children().len()
            && self
                .children()
                .iter()
                .zip(other.children())
                .all(|(a, b)| a.structurally_eq(b))
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.kind().name());
        if let Some(key) = self.key() {
            s.field("key", key);
        }
        s.field("props", &self.inner.props);
        if !self.children().is_empty() {
            s.field("children", &self.inner.children);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Label(&'static str);

    #[derive(Debug, PartialEq)]
    struct Width(u32);

    struct Text;
    struct Frame;

    fn text(s: &'static str) -> Descriptor {
        Descriptor::dynamic(KindId::of::<Text>(), Label(s))
    }

    #[test]
    fn test_builder() {
        let frame = Descriptor::dynamic(KindId::of::<Frame>(), Width(10))
            .with_key("main")
            .child(text("a"))
            .with_children([text("b"), text("c")]);

        assert_eq!(frame.kind(), KindId::of::<Frame>());
        assert_eq!(frame.key(), Some(&Key::from("main")));
        assert_eq!(frame.children().len(), 3);
        assert_eq!(frame.props::<Width>(), Some(&Width(10)));
        assert_eq!(frame.props::<Label>(), None);
    }

    #[test]
    fn test_builder_does_not_touch_clones() {
        let base = text("a");
        let keyed = base.clone().with_key(1);
        assert_eq!(base.key(), None);
        assert_eq!(keyed.key(), Some(&Key::Int(1)));
    }

    #[test]
    fn test_props_eq() {
        assert!(text("a").props_eq(&text("a")));
        assert!(!text("a").props_eq(&text("b")));
        // Same props type under another kind is not equal
        let other = Descriptor::dynamic(KindId::of::<Frame>(), Label("a"));
        assert!(!text("a").props_eq(&other));
    }

    #[test]
    fn test_structurally_eq() {
        let build = |last: &'static str| {
            Descriptor::dynamic(KindId::of::<Frame>(), Width(1))
                .child(text("a"))
                .child(text(last))
        };

        assert!(build("b").structurally_eq(&build("b")));
        assert!(!build("b").structurally_eq(&build("c")));
        assert!(!build("b").structurally_eq(&build("b").child(text("d"))));
        assert!(!text("a").structurally_eq(&text("a").with_key("k")));

        let same = build("b");
        assert!(same.structurally_eq(&same.clone()));
        assert!(same.ptr_eq(&same.clone()));
    }

    #[test]
    fn test_debug_output() {
        let output = format!("{:?}", text("hi").with_key("k"));
        assert!(output.contains("Text"));
        assert!(output.contains("hi"));
    }
}
