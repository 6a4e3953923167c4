//! Scene scripts
//!
//! A scene is a TOML file listing build generations. Each generation gives
//! the declarative tree to build and the state changes to apply first:
//!
//! ```toml
//! [config]
//! dirty_propagation = "on_render"
//!
//! [[generation]]
//! [generation.root]
//! kind = "Stack"
//!
//! [[generation.root.children]]
//! kind = "Counter"
//! key = "clicks"
//! props = { start = "3" }
//!
//! [[generation]]
//! increment = ["Stack#0/Counter[clicks]"]
//! ```
//!
//! A generation without a `root` rebuilds the previous generation's tree.
//! `increment` and `dirty` name nodes of the previous tree by identity path.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use blinc_core::{DirtySet, Identity, Key, StateStore};
use blinc_reconcile::{BuildConfig, Descriptor, HostAdapter, KindRegistry, Reconciler, Tree, TreeNode};
use serde::Deserialize;

use crate::kinds::Attrs;

#[derive(Debug, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub config: BuildConfig,
    #[serde(rename = "generation", default)]
    pub generations: Vec<Generation>,
}

#[derive(Debug, Deserialize)]
pub struct Generation {
    #[serde(default)]
    pub root: Option<NodeSpec>,
    /// Counters to increment through scheduled state changes
    #[serde(default)]
    pub increment: Vec<String>,
    /// Identities to mark dirty
    #[serde(default)]
    pub dirty: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    #[serde(default)]
    pub key: Option<KeySpec>,
    #[serde(default)]
    pub props: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum KeySpec {
    Int(i64),
    Str(String),
}

impl From<&KeySpec> for Key {
    fn from(spec: &KeySpec) -> Self {
        match spec {
            KeySpec::Int(value) => Key::Int(*value),
            KeySpec::Str(value) => Key::from(value.as_str()),
        }
    }
}

impl NodeSpec {
    /// Resolve kinds by name and build the descriptor tree
    pub fn to_descriptor(&self, registry: &KindRegistry) -> Result<Descriptor> {
        let kind = registry.kind_by_name(&self.kind).with_context(|| {
            format!(
                "unknown kind `{}` (known: {})",
                self.kind,
                registry.names().join(", ")
            )
        })?;

        let mut descriptor = Descriptor::dynamic(kind, Attrs(self.props.clone()));
        if let Some(key) = &self.key {
            descriptor = descriptor.with_key(Key::from(key));
        }
        let children = self
            .children
            .iter()
            .map(|child| child.to_descriptor(registry))
            .collect::<Result<Vec<_>>>()?;
        Ok(descriptor.with_children(children))
    }
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Build every generation in order and return the printed host events
    pub fn replay(&self, reconciler: &Reconciler) -> Result<Vec<String>> {
        let mut store = StateStore::new();
        let mut tree: Option<Tree> = None;
        let mut root: Option<&NodeSpec> = None;
        let mut lines = Vec::new();

        for (index, generation) in self.generations.iter().enumerate() {
            root = generation.root.as_ref().or(root);
            let Some(spec) = root else {
                anyhow::bail!("generation {index} has no root and nothing to rebuild");
            };

            let mut dirty = DirtySet::new();
            match &tree {
                Some(previous) => {
                    for path in &generation.increment {
                        let identity = resolve(previous, path)?;
                        store.schedule_state_change::<i64>(identity, |count| *count += 1);
                    }
                    for path in &generation.dirty {
                        dirty.mark(resolve(previous, path)?);
                    }
                }
                None if !generation.increment.is_empty() || !generation.dirty.is_empty() => {
                    tracing::warn!("generation {}: state changes before the first build are ignored", index);
                }
                None => {}
            }

            let descriptor = spec.to_descriptor(reconciler.registry())?;
            let output = reconciler
                .build(&mut store, descriptor, tree.as_ref(), &dirty)
                .with_context(|| format!("generation {index} failed"))?;

            lines.push(format!("generation {}", output.tree.generation()));
            output.dispatch(&mut Printer {
                store: &store,
                lines: &mut lines,
            })?;
            tracing::info!(
                "generation {}: {} created, {} rendered, {} reused, {} unmounted, {} live cells",
                output.tree.generation(),
                output.stats.created,
                output.stats.rendered,
                output.stats.reused,
                output.stats.unmounted,
                store.len()
            );

            tree = Some(output.tree);
        }

        Ok(lines)
    }
}

fn resolve(tree: &Tree, path: &str) -> Result<Identity> {
    tree.iter()
        .map(TreeNode::identity)
        .find(|identity| identity.to_string() == path)
        .cloned()
        .with_context(|| format!("no node at `{path}` in the previous tree"))
}

/// Host that renders events as text lines
struct Printer<'a> {
    store: &'a StateStore,
    lines: &'a mut Vec<String>,
}

impl Printer<'_> {
    fn detail(&self, node: &TreeNode) -> String {
        let mut detail = String::new();
        if let Some(text) = node.descriptor().props::<Attrs>().and_then(|attrs| attrs.get("text")) {
            detail.push_str(&format!(" text={text:?}"));
        }
        if let Some(count) = self.store.get::<i64>(node.state()) {
            detail.push_str(&format!(" count={count}"));
        }
        detail
    }
}

impl HostAdapter for Printer<'_> {
    type Error = Infallible;

    fn mounted(&mut self, node: &Arc<TreeNode>) -> std::result::Result<(), Infallible> {
        let line = format!("  mount   {}{}", node.identity(), self.detail(node));
        self.lines.push(line);
        Ok(())
    }

    fn updated(&mut self, node: &Arc<TreeNode>, _previous: &Descriptor) -> std::result::Result<(), Infallible> {
        let line = format!("  update  {}{}", node.identity(), self.detail(node));
        self.lines.push(line);
        Ok(())
    }

    fn unmounted(&mut self, identity: &Identity) -> std::result::Result<(), Infallible> {
        self.lines.push(format!("  unmount {identity}"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{self, Counter};
    use blinc_reconcile::DirtyPropagation;

    const SCENE: &str = r#"
[config]
dirty_propagation = "on_state_change"

[[generation]]
[generation.root]
kind = "Stack"

[[generation.root.children]]
kind = "Label"
props = { text = "hello" }

[[generation.root.children]]
kind = "Counter"
key = "clicks"
props = { start = "3" }

[[generation]]
increment = ["Stack#0/Counter[clicks]"]

[[generation]]
[generation.root]
kind = "Stack"

[[generation.root.children]]
kind = "Counter"
key = "clicks"
props = { start = "3" }
"#;

    #[test]
    fn test_parse_scene() {
        let scene = Scene::parse(SCENE).unwrap();
        assert_eq!(scene.config.dirty_propagation, DirtyPropagation::OnStateChange);
        assert_eq!(scene.generations.len(), 3);
        assert!(scene.generations[1].root.is_none());

        let root = scene.generations[0].root.as_ref().unwrap();
        assert_eq!(root.children.len(), 2);
        assert_eq!(Counter::start(&Attrs(root.children[1].props.clone())), 3);
    }

    #[test]
    fn test_replay() {
        let scene = Scene::parse(SCENE).unwrap();
        let reconciler = Reconciler::new(kinds::registry()).with_config(scene.config.clone());
        let lines = scene.replay(&reconciler).unwrap();

        assert_eq!(
            lines,
            vec![
                "generation 0",
                "  mount   Stack#0",
                "  mount   Stack#0/Label#0 text=\"hello\"",
                "  mount   Stack#0/Counter[clicks] count=3",
                "generation 1",
                "  update  Stack#0/Counter[clicks] count=4",
                "generation 2",
                "  update  Stack#0",
                "  unmount Stack#0/Label#0",
            ]
        );
    }

    #[test]
    fn test_unknown_kind() {
        let spec = NodeSpec {
            kind: "Window".to_string(),
            key: None,
            props: BTreeMap::new(),
            children: Vec::new(),
        };
        let err = spec.to_descriptor(&kinds::registry()).unwrap_err();
        assert!(err.to_string().contains("unknown kind `Window`"));
    }

    #[test]
    fn test_integer_keys() {
        let spec: NodeSpec = toml::from_str("kind = \"Label\"\nkey = 4\n").unwrap();
        let descriptor = spec.to_descriptor(&kinds::registry()).unwrap();
        assert_eq!(descriptor.key(), Some(&Key::Int(4)));
    }
}
