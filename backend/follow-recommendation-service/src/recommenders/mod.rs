//! Content (CB), graph (CF) and hybrid follow recommenders.

pub mod content;
pub mod graph;
pub mod hybrid;

pub use content::{ContentRecommender, FeatureModel};
pub use graph::GraphRecommender;
pub use hybrid::HybridRecommender;

use serde::{Deserialize, Serialize};

/// How the hybrid recommender merges its two sides. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum EnsemblePolicy {
    /// Blend both sides: `cf_weight * cf + cb_weight * cb`, absent side = 0.
    Weighted { cf_weight: f32, cb_weight: f32 },
    /// Route warm users (`followers >= follower_threshold`) to CF, the rest to CB.
    Switch { follower_threshold: u64 },
}

impl Default for EnsemblePolicy {
    fn default() -> Self {
        EnsemblePolicy::Weighted {
            cf_weight: 0.5,
            cb_weight: 0.5,
        }
    }
}

/// Number of neighbours considered when ranking an explanation.
pub const EXPLAIN_TOP_N: usize = 50;
