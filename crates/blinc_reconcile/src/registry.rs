//! Component kind registry
//!
//! Maps each [`KindId`] to the type-erased record of its component, and each
//! kind's short name to its id for hosts that build descriptors at runtime.

use std::fmt;
use std::sync::Arc;

use blinc_core::KindId;
use rustc_hash::FxHashMap;

use crate::component::{Component, ErasedComponent, KindRecord};

/// Set of component kinds a [`Reconciler`](crate::driver::Reconciler) can build
#[derive(Clone, Default)]
pub struct KindRegistry {
    kinds: FxHashMap<KindId, Arc<dyn ErasedComponent>>,
    names: FxHashMap<&'static str, KindId>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `component` as the implementation of kind `C`.
    ///
    /// Registering the same kind again replaces the previous record.
    pub fn register<C: Component>(&mut self, component: C) -> KindId {
        let kind = KindId::of::<C>();
        if self
            .kinds
            .insert(kind, Arc::new(KindRecord::new(component)))
            .is_some()
        {
            tracing::debug!("kind {} re-registered", kind);
        }

        match self.names.get(kind.name()) {
            Some(existing) if *existing != kind => {
                tracing::warn!(
                    "kind name `{}` is shared by two types; by-name lookup resolves to the latest",
                    kind.name()
                );
            }
            _ => {}
        }
        self.names.insert(kind.name(), kind);
        kind
    }

    /// Builder form of [`register`](Self::register)
    pub fn with<C: Component>(mut self, component: C) -> Self {
        self.register(component);
        self
    }

    pub(crate) fn get(&self, kind: KindId) -> Option<&Arc<dyn ErasedComponent>> {
        self.kinds.get(&kind)
    }

    pub fn contains(&self, kind: KindId) -> bool {
        self.kinds.contains_key(&kind)
    }

    /// Look up a kind by its short type name
    pub fn kind_by_name(&self, name: &str) -> Option<KindId> {
        self.names.get(name).copied()
    }

    /// Props type expected by a registered kind
    pub fn props_type_name(&self, kind: KindId) -> Option<&'static str> {
        self.get(kind).map(|record| record.props_type_name())
    }

    /// State type held by a registered kind
    pub fn state_type_name(&self, kind: KindId) -> Option<&'static str> {
        self.get(kind).map(|record| record.state_type_name())
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Registered kind names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.names.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindRegistry")
            .field("kinds", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{InitInput, RenderInput};
    use crate::descriptor::Descriptor;

    struct Spacer;
    struct Text;

    impl Component for Spacer {
        type Props = u32;
        type State = ();

        fn initial_state(&self, _input: InitInput<'_, Self>) {}

        fn render(&self, _input: RenderInput<'_, Self>) -> Vec<Descriptor> {
            Vec::new()
        }
    }

    impl Component for Text {
        type Props = String;
        type State = ();

        fn initial_state(&self, _input: InitInput<'_, Self>) {}

        fn render(&self, _input: RenderInput<'_, Self>) -> Vec<Descriptor> {
            Vec::new()
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = KindRegistry::new().with(Spacer).with(Text);

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(KindId::of::<Spacer>()));
        assert_eq!(registry.kind_by_name("Text"), Some(KindId::of::<Text>()));
        assert_eq!(registry.kind_by_name("Missing"), None);
        assert_eq!(registry.names(), vec!["Spacer", "Text"]);
        assert_eq!(
            registry.props_type_name(KindId::of::<Text>()),
            Some(std::any::type_name::<String>())
        );
    }

    #[test]
    fn test_re_register_replaces() {
        let mut registry = KindRegistry::new();
        let first = registry.register(Spacer);
        let second = registry.register(Spacer);
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_record_accepts_own_props() {
        let registry = KindRegistry::new().with(Spacer);
        let record = registry.get(KindId::of::<Spacer>()).unwrap();
        assert!(record.accepts(&Descriptor::new::<Spacer>(4)));
        assert!(!record.accepts(&Descriptor::dynamic(KindId::of::<Spacer>(), String::new())));
    }
}
