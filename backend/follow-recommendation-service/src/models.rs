use serde::{Deserialize, Serialize};

/// Profile attributes of a user node in the follow graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub age: Option<i64>,
    pub favorite_sport: Option<String>,
    pub competitive_level: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

/// Directed "follows" edge: `follower` follows `followee`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follower: String,
    pub followee: String,
}

impl FollowEdge {
    pub fn new(follower: impl Into<String>, followee: impl Into<String>) -> Self {
        Self {
            follower: follower.into(),
            followee: followee.into(),
        }
    }
}

/// A recommended user and its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredUser {
    pub user_id: String,
    pub score: f32,
}

impl ScoredUser {
    pub fn new(user_id: impl Into<String>, score: f32) -> Self {
        Self {
            user_id: user_id.into(),
            score,
        }
    }
}

/// Diagnostic breakdown of a graph-model recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub target_user: String,
    pub recommended_user: String,
    pub similarity_score: f32,
    /// 1-based rank within the target's top neighbours, if it made the cut.
    pub rank_in_top_similar: Option<usize>,
    pub explanation: String,
}

/// Hybrid score with the contribution of each underlying model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridScore {
    pub user_id: String,
    pub score: f32,
    pub cf_score: Option<f32>,
    pub cb_score: Option<f32>,
}

impl From<HybridScore> for ScoredUser {
    fn from(hybrid: HybridScore) -> Self {
        ScoredUser {
            user_id: hybrid.user_id,
            score: hybrid.score,
        }
    }
}
