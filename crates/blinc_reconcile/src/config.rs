//! Build configuration
//!
//! Loaded from TOML, or constructed in code:
//!
//! ```toml
//! dirty_propagation = "on_state_change"
//! verify_equivalence = true
//! max_depth = 256
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// When a node marks its children dirty
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirtyPropagation {
    /// Every rendered or created node marks its children dirty
    #[default]
    OnRender,
    /// Only created nodes and nodes in the dirty set mark their children dirty.
    ///
    /// Children of a plain re-render consult their oracle.
    OnStateChange,
}

/// Knobs for [`Reconciler::build`](crate::driver::Reconciler::build)
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildConfig {
    pub dirty_propagation: DirtyPropagation,
    /// Call each oracle a second time with swapped arguments and fail the
    /// build if the answers differ
    pub verify_equivalence: bool,
    pub max_depth: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            dirty_propagation: DirtyPropagation::default(),
            verify_equivalence: cfg!(debug_assertions),
            max_depth: 512,
        }
    }
}

impl BuildConfig {
    /// Parse a configuration table; missing fields take their defaults
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn with_dirty_propagation(mut self, mode: DirtyPropagation) -> Self {
        self.dirty_propagation = mode;
        self
    }

    pub fn with_verify_equivalence(mut self, verify: bool) -> Self {
        self.verify_equivalence = verify;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;

    #[test]
    fn test_defaults() {
        let config = BuildConfig::default();
        assert_eq!(config.dirty_propagation, DirtyPropagation::OnRender);
        assert_eq!(config.max_depth, 512);
        assert_eq!(config.verify_equivalence, cfg!(debug_assertions));
    }

    #[test]
    fn test_from_toml_partial() {
        let config = BuildConfig::from_toml_str("dirty_propagation = \"on_state_change\"").unwrap();
        assert_eq!(config.dirty_propagation, DirtyPropagation::OnStateChange);
        assert_eq!(config.max_depth, 512);

        let empty = BuildConfig::from_toml_str("").unwrap();
        assert_eq!(empty, BuildConfig::default());
    }

    #[test]
    fn test_from_toml_full() {
        let config = BuildConfig::from_toml_str(
            "dirty_propagation = \"on_render\"\nverify_equivalence = false\nmax_depth = 8\n",
        )
        .unwrap();
        assert_eq!(
            config,
            BuildConfig::default()
                .with_verify_equivalence(false)
                .with_max_depth(8)
        );
    }

    #[test]
    fn test_from_toml_rejects_unknown_mode() {
        let err = BuildConfig::from_toml_str("dirty_propagation = \"sometimes\"").unwrap_err();
        assert!(matches!(err, ReconcileError::Config(_)));
    }
}
