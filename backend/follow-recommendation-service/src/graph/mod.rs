//! Read-only access to the follow graph.

mod memory;
mod neo4j;

pub use memory::InMemoryGraph;
pub use neo4j::Neo4jGraphSource;

use crate::error::Result;
use crate::models::{FollowEdge, UserProfile};
use crate::walks::{WalkConfig, WalkCorpus};
use async_trait::async_trait;

/// Everything the recommender needs from the graph database.
///
/// Implementations map transport failures to
/// [`RecommendError::UpstreamUnavailable`](crate::error::RecommendError::UpstreamUnavailable).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Profile for one user, `None` if the user does not exist.
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// Every profile, ordered by user id.
    async fn fetch_profiles(&self) -> Result<Vec<UserProfile>>;

    /// Every user id, including users without edges.
    async fn user_ids(&self) -> Result<Vec<String>>;

    /// Every directed follow edge.
    async fn follow_edges(&self) -> Result<Vec<FollowEdge>>;

    /// Number of users following `user_id`; 0 for unknown users.
    async fn follower_count(&self, user_id: &str) -> Result<u64>;

    /// Ids `user_id` already follows.
    async fn following(&self, user_id: &str) -> Result<Vec<String>>;

    /// Walks sampled inside the graph engine.
    ///
    /// `Ok(None)` means the engine cannot do it and the caller should walk
    /// in-process instead.
    async fn sample_walks(&self, _config: &WalkConfig) -> Result<Option<WalkCorpus>> {
        Ok(None)
    }
}
