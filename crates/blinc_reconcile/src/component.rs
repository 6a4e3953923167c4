//! The render component protocol
//!
//! A component kind supplies its props type, an initial-state function, a
//! render function, and optionally an equivalence predicate and a reuse hook.
//! The reconciler only sees kinds through the type-erased [`ErasedComponent`]
//! record that [`KindRegistry`](crate::registry::KindRegistry) builds for
//! each registered component.
//!
//! # Example
//!
//! ```rust
//! use blinc_reconcile::prelude::*;
//!
//! struct Counter;
//!
//! #[derive(Debug, PartialEq)]
//! struct CounterProps {
//!     start: i64,
//! }
//!
//! impl Component for Counter {
//!     type Props = CounterProps;
//!     type State = i64;
//!
//!     // Initial state may depend on props, key and declared children
//!     fn initial_state(&self, input: InitInput<'_, Self>) -> i64 {
//!         input.props.start
//!     }
//!
//!     fn render(&self, input: RenderInput<'_, Self>) -> Vec<Descriptor> {
//!         let _count = *input.state;
//!         Vec::new()
//!     }
//!
//!     // Opt into reuse when nothing about the instance changed
//!     fn is_equivalent(&self, previous: &Descriptor, next: &Descriptor) -> bool {
//!         previous.structurally_eq(next)
//!     }
//! }
//! ```

use std::any::Any;

use blinc_core::{BoxedState, Identity, Key, KindId};

use crate::descriptor::Descriptor;

/// Everything an initial-state function may look at
pub struct InitInput<'a, C: Component + ?Sized> {
    /// Identity of the node being mounted
    pub identity: &'a Identity,
    pub props: &'a C::Props,
    pub key: Option<&'a Key>,
    pub children: &'a [Descriptor],
}

/// Everything a render function may look at
pub struct RenderInput<'a, C: Component + ?Sized> {
    /// Identity of the node being rendered
    pub identity: &'a Identity,
    pub props: &'a C::Props,
    pub key: Option<&'a Key>,
    /// Children declared by the parent, for container kinds
    pub children: &'a [Descriptor],
    pub state: &'a C::State,
}

/// A component kind
pub trait Component: Send + Sync + 'static {
    type Props: PartialEq + std::fmt::Debug + Send + Sync + 'static;
    type State: Send + 'static;

    /// State for a freshly mounted instance, derived from its descriptor
    fn initial_state(&self, input: InitInput<'_, Self>) -> Self::State;

    /// Produce the child descriptors of this instance.
    ///
    /// Must be synchronous and must not call back into the reconciler.
    /// Container kinds typically return `input.children.to_vec()`.
    fn render(&self, input: RenderInput<'_, Self>) -> Vec<Descriptor>;

    /// Whether `next` may reuse the node built from `previous` without
    /// rendering. Must be pure and cheap.
    ///
    /// The default never reuses.
    fn is_equivalent(&self, previous: &Descriptor, next: &Descriptor) -> bool {
        let _ = (previous, next);
        false
    }

    /// Called on the new generation when the previous one is reused.
    ///
    /// Render is skipped for reused instances, so this is where a kind
    /// carries over anything its render would have recomputed.
    fn did_reuse(&self, previous: &Self::Props, next: &Self::Props, state: &mut Self::State) {
        let _ = (previous, next, state);
    }
}

/// Why an erased call could not reach the typed component
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Mismatch {
    Props,
    State,
}

/// Type-erased kind record: the vtable attached to a kind id
pub(crate) trait ErasedComponent: Send + Sync {
    fn kind(&self) -> KindId;

    fn props_type_name(&self) -> &'static str;

    fn state_type_name(&self) -> &'static str;

    /// True if the descriptor's props belong to this kind
    fn accepts(&self, descriptor: &Descriptor) -> bool;

    fn initial_state(&self, identity: &Identity, descriptor: &Descriptor) -> Result<BoxedState, Mismatch>;

    fn render(
        &self,
        identity: &Identity,
        descriptor: &Descriptor,
        state: &(dyn Any + Send),
    ) -> Result<Vec<Descriptor>, Mismatch>;

    fn is_equivalent(&self, previous: &Descriptor, next: &Descriptor) -> bool;

    fn did_reuse(
        &self,
        previous: &Descriptor,
        next: &Descriptor,
        state: &mut (dyn Any + Send),
    ) -> Result<(), Mismatch>;
}

pub(crate) struct KindRecord<C> {
    component: C,
}

impl<C: Component> KindRecord<C> {
    pub(crate) fn new(component: C) -> Self {
        Self { component }
    }

    fn props<'d>(descriptor: &'d Descriptor) -> Result<&'d C::Props, Mismatch> {
        descriptor.props::<C::Props>().ok_or(Mismatch::Props)
    }
}

impl<C: Component> ErasedComponent for KindRecord<C> {
    fn kind(&self) -> KindId {
        KindId::of::<C>()
    }

    fn props_type_name(&self) -> &'static str {
        std::any::type_name::<C::Props>()
    }

    fn state_type_name(&self) -> &'static str {
        std::any::type_name::<C::State>()
    }

    fn accepts(&self, descriptor: &Descriptor) -> bool {
        descriptor.kind() == self.kind() && descriptor.props::<C::Props>().is_some()
    }

    fn initial_state(&self, identity: &Identity, descriptor: &Descriptor) -> Result<BoxedState, Mismatch> {
        let props = Self::props(descriptor)?;
        Ok(Box::new(self.component.initial_state(InitInput {
            identity,
            props,
            key: descriptor.key(),
            children: descriptor.children(),
        })))
    }

    fn render(
        &self,
        identity: &Identity,
        descriptor: &Descriptor,
        state: &(dyn Any + Send),
    ) -> Result<Vec<Descriptor>, Mismatch> {
        let props = Self::props(descriptor)?;
        let state = state.downcast_ref::<C::State>().ok_or(Mismatch::State)?;
        Ok(self.component.render(RenderInput {
            identity,
            props,
            key: descriptor.key(),
            children: descriptor.children(),
            state,
        }))
    }

    fn is_equivalent(&self, previous: &Descriptor, next: &Descriptor) -> bool {
        self.component.is_equivalent(previous, next)
    }

    fn did_reuse(
        &self,
        previous: &Descriptor,
        next: &Descriptor,
        state: &mut (dyn Any + Send),
    ) -> Result<(), Mismatch> {
        let previous = Self::props(previous)?;
        let next = Self::props(next)?;
        let state = state.downcast_mut::<C::State>().ok_or(Mismatch::State)?;
        self.component.did_reuse(previous, next, state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blinc_core::{Segment, Slot};

    struct Echo;

    #[derive(Debug, PartialEq)]
    struct EchoProps(u8);

    impl Component for Echo {
        type Props = EchoProps;
        type State = u32;

        fn initial_state(&self, input: InitInput<'_, Self>) -> u32 {
            let keyed = match input.key {
                Some(Key::Int(n)) => *n as u32 * 100,
                _ => 0,
            };
            keyed + u32::from(input.props.0) * 10 + input.children.len() as u32
        }

        fn render(&self, input: RenderInput<'_, Self>) -> Vec<Descriptor> {
            input.children.to_vec()
        }

        fn did_reuse(&self, _previous: &EchoProps, next: &EchoProps, state: &mut u32) {
            *state += u32::from(next.0);
        }
    }

    fn identity() -> Identity {
        Identity::root(Segment::new(KindId::of::<Echo>(), Slot::Index(0)))
    }

    #[test]
    fn test_record_dispatches_to_component() {
        let record = KindRecord::new(Echo);
        let descriptor = Descriptor::new::<Echo>(EchoProps(2))
            .child(Descriptor::new::<Echo>(EchoProps(3)));

        assert!(record.accepts(&descriptor));
        let state = record.initial_state(&identity(), &descriptor).unwrap();
        assert_eq!(state.downcast_ref::<u32>(), Some(&21));

        let children = record
            .render(&identity(), &descriptor, state.as_ref())
            .unwrap();
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn test_initial_state_sees_key_and_children() {
        let record = KindRecord::new(Echo);
        let descriptor = Descriptor::new::<Echo>(EchoProps(1))
            .with_key(Key::Int(3))
            .child(Descriptor::new::<Echo>(EchoProps(0)))
            .child(Descriptor::new::<Echo>(EchoProps(0)));

        let state = record.initial_state(&identity(), &descriptor).unwrap();
        assert_eq!(state.downcast_ref::<u32>(), Some(&312));
    }

    #[test]
    fn test_default_equivalence_is_false() {
        let record = KindRecord::new(Echo);
        let d = Descriptor::new::<Echo>(EchoProps(1));
        assert!(!record.is_equivalent(&d, &d));
    }

    #[test]
    fn test_props_mismatch() {
        let record = KindRecord::new(Echo);
        let foreign = Descriptor::dynamic(KindId::of::<Echo>(), String::from("wrong"));

        assert!(!record.accepts(&foreign));
        assert_eq!(record.initial_state(&identity(), &foreign).err(), Some(Mismatch::Props));
    }

    #[test]
    fn test_state_mismatch() {
        let record = KindRecord::new(Echo);
        let descriptor = Descriptor::new::<Echo>(EchoProps(1));
        let mut wrong: BoxedState = Box::new("not a u32");

        assert_eq!(
            record.render(&identity(), &descriptor, wrong.as_ref()).err(),
            Some(Mismatch::State)
        );
        assert_eq!(
            record.did_reuse(&descriptor, &descriptor, wrong.as_mut()),
            Err(Mismatch::State)
        );
    }

    #[test]
    fn test_did_reuse_updates_state() {
        let record = KindRecord::new(Echo);
        let previous = Descriptor::new::<Echo>(EchoProps(1));
        let next = Descriptor::new::<Echo>(EchoProps(4));
        let mut state: BoxedState = Box::new(10u32);

        record.did_reuse(&previous, &next, state.as_mut()).unwrap();
        assert_eq!(state.downcast_ref::<u32>(), Some(&14));
    }
}
