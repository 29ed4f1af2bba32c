use serde::{Deserialize, Serialize};

use crate::bitset::MAX_ENTITIES;
use crate::entity_set::MAX_PARENT_DEPTH;

/// Tuning for a [`World`](crate::World)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcsConfig {
    /// Entity slot ceiling. Values above `MAX_ENTITIES` are clamped.
    pub capacity: usize,
    /// Hop limit for parent-chain walks (descendant expansion, ancestor lookups)
    pub max_parent_depth: usize,
}

impl Default for EcsConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_ENTITIES,
            max_parent_depth: MAX_PARENT_DEPTH,
        }
    }
}

impl EcsConfig {
    pub fn capacity(&self) -> usize {
        self.capacity.min(MAX_ENTITIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_uses_defaults() {
        let config: EcsConfig = toml::from_str("max_parent_depth = 8").unwrap();
        assert_eq!(config.max_parent_depth, 8);
        assert_eq!(config.capacity, MAX_ENTITIES);
    }

    #[test]
    fn capacity_is_clamped() {
        let config = EcsConfig {
            capacity: 1_000_000,
            ..Default::default()
        };
        assert_eq!(config.capacity(), MAX_ENTITIES);
    }
}
