use super::GraphSource;
use crate::error::Result;
use crate::models::{FollowEdge, UserProfile};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Graph held in memory. Used by tests, local runs and offline fixtures.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraph {
    profiles: BTreeMap<String, UserProfile>,
    edges: Vec<FollowEdge>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.insert_profile(profile);
        self
    }

    /// Adds a follow edge, creating bare profiles for unseen endpoints.
    pub fn with_follow(mut self, follower: &str, followee: &str) -> Self {
        self.insert_follow(follower, followee);
        self
    }

    pub fn insert_profile(&mut self, profile: UserProfile) {
        self.profiles.insert(profile.user_id.clone(), profile);
    }

    pub fn insert_follow(&mut self, follower: &str, followee: &str) {
        for user in [follower, followee] {
            self.profiles
                .entry(user.to_string())
                .or_insert_with(|| UserProfile::new(user));
        }
        let edge = FollowEdge::new(follower, followee);
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }
}

#[async_trait]
impl GraphSource for InMemoryGraph {
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.profiles.get(user_id).cloned())
    }

    async fn fetch_profiles(&self) -> Result<Vec<UserProfile>> {
        Ok(self.profiles.values().cloned().collect())
    }

    async fn user_ids(&self) -> Result<Vec<String>> {
        Ok(self.profiles.keys().cloned().collect())
    }

    async fn follow_edges(&self) -> Result<Vec<FollowEdge>> {
        Ok(self.edges.clone())
    }

    async fn follower_count(&self, user_id: &str) -> Result<u64> {
        Ok(self.edges.iter().filter(|e| e.followee == user_id).count() as u64)
    }

    async fn following(&self, user_id: &str) -> Result<Vec<String>> {
        Ok(self
            .edges
            .iter()
            .filter(|e| e.follower == user_id)
            .map(|e| e.followee.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_follow_creates_profiles_and_counts() {
        let graph = InMemoryGraph::new()
            .with_follow("alice", "bob")
            .with_follow("carol", "bob")
            .with_follow("carol", "bob");

        assert_eq!(graph.follower_count("bob").await.unwrap(), 2);
        assert_eq!(graph.follower_count("alice").await.unwrap(), 0);
        assert_eq!(graph.following("carol").await.unwrap(), vec!["bob"]);
        assert_eq!(graph.user_ids().await.unwrap(), vec!["alice", "bob", "carol"]);
        assert!(graph.fetch_profile("bob").await.unwrap().is_some());
        assert!(graph.fetch_profile("dave").await.unwrap().is_none());
        assert!(graph
            .sample_walks(&Default::default())
            .await
            .unwrap()
            .is_none());
    }
}
