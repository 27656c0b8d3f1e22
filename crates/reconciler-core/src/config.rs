//! §6.5 feature flags, read once per update.

use serde::{Deserialize, Serialize};

use crate::keyed_diff::DEFAULT_STABILITY_THRESHOLD_PCT;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub use_optimized_reconciler: bool,
    pub use_strict_mode: bool,
    pub use_fenwick_delta: bool,
    pub use_central_aggregation: bool,
    pub use_keyed_diff: bool,
    pub use_block_rebuild: bool,
    pub use_insert_block_fenwick: bool,
    pub use_delete_block_fenwick: bool,
    pub use_pre_post_attributes_only: bool,
    pub use_shadow_compare: bool,
    pub reconciler_sanity_check: bool,
    pub verbose_logging: bool,
    pub pre_post_attrs_only_max_targets: u32,
    pub keyed_diff_stability_threshold_pct: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        ReconcilerConfig {
            use_optimized_reconciler: true,
            use_strict_mode: false,
            use_fenwick_delta: true,
            use_central_aggregation: true,
            use_keyed_diff: true,
            use_block_rebuild: true,
            use_insert_block_fenwick: true,
            use_delete_block_fenwick: true,
            use_pre_post_attributes_only: true,
            use_shadow_compare: false,
            reconciler_sanity_check: cfg!(debug_assertions),
            verbose_logging: false,
            pre_post_attrs_only_max_targets: 64,
            keyed_diff_stability_threshold_pct: DEFAULT_STABILITY_THRESHOLD_PCT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_defaults() {
        let config = ReconcilerConfig::default();
        assert!(config.use_optimized_reconciler);
        assert!(!config.use_strict_mode);
        assert!(!config.use_shadow_compare);
        assert_eq!(config.pre_post_attrs_only_max_targets, 64);
        assert_eq!(config.keyed_diff_stability_threshold_pct, 10);
    }
}
