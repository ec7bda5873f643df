//! Follow recommendations for the sports social graph.
//!
//! Two models are trained offline and served together:
//! - a graph model: DeepWalk-style embeddings trained on random walks over
//!   the follow graph ([`walks`], [`embedding`]);
//! - a content model: explicit profile features ([`features`]).
//!
//! [`recommenders::HybridRecommender`] merges them under an
//! [`recommenders::EnsemblePolicy`]; [`service::RecommendationService`] owns
//! the loaded models.

pub mod artifacts;
pub mod config;
pub mod embedding;
pub mod error;
pub mod features;
pub mod graph;
pub mod models;
pub mod pipeline;
pub mod ranking;
pub mod recommenders;
pub mod service;
pub mod walks;

pub use config::Config;
pub use error::{RecommendError, Result};
pub use graph::{GraphSource, InMemoryGraph, Neo4jGraphSource};
pub use models::{Explanation, FollowEdge, HybridScore, ScoredUser, UserProfile};
pub use recommenders::{
    ContentRecommender, EnsemblePolicy, FeatureModel, GraphRecommender, HybridRecommender,
};
pub use service::RecommendationService;
