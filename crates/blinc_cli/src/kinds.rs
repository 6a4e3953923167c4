//! Component kinds available to scene files
//!
//! Scene nodes are untyped, so every kind takes string attributes as props.
//! All kinds opt into reuse when nothing about the node changed.

use std::collections::BTreeMap;

use blinc_reconcile::prelude::*;

/// String attributes of a scene node
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attrs(pub BTreeMap<String, String>);

impl Attrs {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Container that renders the children it is given
pub struct Stack;

impl Component for Stack {
    type Props = Attrs;
    type State = ();

    fn initial_state(&self, _input: InitInput<'_, Self>) {}

    fn render(&self, input: RenderInput<'_, Self>) -> Vec<Descriptor> {
        input.children.to_vec()
    }

    fn is_equivalent(&self, previous: &Descriptor, next: &Descriptor) -> bool {
        previous.structurally_eq(next)
    }
}

/// Leaf showing its `text` attribute
pub struct Label;

impl Component for Label {
    type Props = Attrs;
    type State = ();

    fn initial_state(&self, _input: InitInput<'_, Self>) {}

    fn render(&self, _input: RenderInput<'_, Self>) -> Vec<Descriptor> {
        Vec::new()
    }

    fn is_equivalent(&self, previous: &Descriptor, next: &Descriptor) -> bool {
        previous.structurally_eq(next)
    }
}

/// Leaf holding an integer that scenes can increment.
///
/// Starts at its `start` attribute (0 if absent or not a number).
pub struct Counter;

impl Counter {
    pub fn start(props: &Attrs) -> i64 {
        props
            .get("start")
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0)
    }
}

impl Component for Counter {
    type Props = Attrs;
    type State = i64;

    fn initial_state(&self, input: InitInput<'_, Self>) -> i64 {
        Self::start(input.props)
    }

    fn render(&self, input: RenderInput<'_, Self>) -> Vec<Descriptor> {
        tracing::trace!("counter {} at {}", input.identity, input.state);
        Vec::new()
    }

    fn is_equivalent(&self, previous: &Descriptor, next: &Descriptor) -> bool {
        previous.structurally_eq(next)
    }
}

pub fn registry() -> KindRegistry {
    KindRegistry::new().with(Stack).with(Label).with(Counter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attrs {
        Attrs(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_registry_names() {
        assert_eq!(registry().names(), vec!["Counter", "Label", "Stack"]);
    }

    #[test]
    fn test_counter_start() {
        assert_eq!(Counter::start(&attrs(&[("start", " 7 ")])), 7);
        assert_eq!(Counter::start(&attrs(&[("start", "seven")])), 0);
        assert_eq!(Counter::start(&Attrs::default()), 0);
    }
}
