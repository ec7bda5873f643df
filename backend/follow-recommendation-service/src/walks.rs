//! Uniform first-order random walks over the follow graph.
//!
//! Walks are unbiased (DeepWalk style): no return/in-out parameters.

use crate::error::{RecommendError, Result};
use crate::models::FollowEdge;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkConfig {
    /// Maximum number of nodes in a walk, start node included.
    pub walk_length: usize,
    pub walks_per_node: usize,
    pub random_seed: u64,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            walk_length: 80,
            walks_per_node: 10,
            random_seed: 42,
        }
    }
}

impl WalkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.walk_length == 0 || self.walks_per_node == 0 {
            return Err(RecommendError::InvalidInput(format!(
                "walk_length ({}) and walks_per_node ({}) must be at least 1",
                self.walk_length, self.walks_per_node
            )));
        }
        Ok(())
    }
}

/// Where walks are sampled. Both strategies perform the same uniform walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalkStrategy {
    /// Inside the graph engine, falling back to in-process when unsupported.
    ///
    /// The engine starts exactly `walks_per_node` walks at every user with a
    /// followee. In-process sampling instead draws `walks_per_node * |S|`
    /// starts uniformly from that set `S`, so per-user start counts match
    /// only in expectation. Step distributions are identical.
    Native,
    /// Always load the edges and walk in this process.
    InProcess,
}

/// Out-neighbour lists keyed by user, in first-seen user order.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    users: Vec<String>,
    neighbors: HashMap<String, Vec<String>>,
}

impl Adjacency {
    /// Builds adjacency from every known user plus the follow edges.
    ///
    /// Users without followees get an empty list; edge endpoints missing from
    /// `users` are added in edge order.
    pub fn from_edges<I, S>(users: I, edges: &[FollowEdge]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut adjacency = Adjacency::default();
        for user in users {
            adjacency.ensure_user(user.into());
        }
        for edge in edges {
            adjacency.ensure_user(edge.follower.clone());
            adjacency.ensure_user(edge.followee.clone());
            if let Some(list) = adjacency.neighbors.get_mut(&edge.follower) {
                list.push(edge.followee.clone());
            }
        }
        adjacency
    }

    fn ensure_user(&mut self, user: String) {
        if user.is_empty() || self.neighbors.contains_key(&user) {
            return;
        }
        self.neighbors.insert(user.clone(), Vec::new());
        self.users.push(user);
    }

    pub fn users(&self) -> &[String] {
        &self.users
    }

    pub fn neighbors(&self, user: &str) -> &[String] {
        self.neighbors.get(user).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.neighbors(from).iter().any(|n| n == to)
    }

    pub fn edge_count(&self) -> usize {
        self.neighbors.values().map(Vec::len).sum()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Ordered collection of walks, rebuilt from scratch on every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalkCorpus {
    walks: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub walk_count: usize,
    pub min_length: usize,
    pub max_length: usize,
    pub mean_length: f64,
    pub unique_users: usize,
}

impl WalkCorpus {
    /// Drops empty ids and the walks left empty by that.
    pub fn new(walks: Vec<Vec<String>>) -> Self {
        let walks = walks
            .into_iter()
            .map(|walk| walk.into_iter().filter(|id| !id.is_empty()).collect::<Vec<_>>())
            .filter(|walk| !walk.is_empty())
            .collect();
        Self { walks }
    }

    pub fn walks(&self) -> &[Vec<String>] {
        &self.walks
    }

    pub fn len(&self) -> usize {
        self.walks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walks.is_empty()
    }

    pub fn into_walks(self) -> Vec<Vec<String>> {
        self.walks
    }

    pub fn stats(&self) -> CorpusStats {
        if self.walks.is_empty() {
            return CorpusStats::default();
        }

        let lengths = self.walks.iter().map(Vec::len);
        let total: usize = lengths.clone().sum();
        let unique: HashSet<&str> = self
            .walks
            .iter()
            .flat_map(|walk| walk.iter().map(String::as_str))
            .collect();

        CorpusStats {
            walk_count: self.walks.len(),
            min_length: lengths.clone().min().unwrap_or(0),
            max_length: lengths.max().unwrap_or(0),
            mean_length: total as f64 / self.walks.len() as f64,
            unique_users: unique.len(),
        }
    }
}

/// In-process sampler; seeded so the same graph yields the same corpus.
pub struct WalkSampler {
    config: WalkConfig,
}

impl WalkSampler {
    pub fn new(config: WalkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &WalkConfig {
        &self.config
    }

    /// Fails with `InvalidInput` when the walk count overflows `usize`.
    pub fn sample(&self, adjacency: &Adjacency) -> Result<WalkCorpus> {
        let mut rng = StdRng::seed_from_u64(self.config.random_seed);

        let start_nodes: Vec<&String> = adjacency
            .users()
            .iter()
            .filter(|user| !adjacency.neighbors(user).is_empty())
            .collect();

        if start_nodes.is_empty() {
            if adjacency.is_empty() {
                warn!("No users in graph, walk corpus is empty");
                return Ok(WalkCorpus::default());
            }

            self.walk_count(adjacency.len())?;
            warn!(
                users = adjacency.len(),
                "No follow edges in graph; emitting single-node walks only"
            );
            let walks = adjacency
                .users()
                .iter()
                .flat_map(|user| {
                    std::iter::repeat_with(move || vec![user.clone()])
                        .take(self.config.walks_per_node)
                })
                .collect();
            return Ok(WalkCorpus { walks });
        }

        let n_walks = self.walk_count(start_nodes.len())?;
        let mut walks = Vec::with_capacity(n_walks);

        for _ in 0..n_walks {
            let mut current = start_nodes[rng.gen_range(0..start_nodes.len())];
            let mut walk = Vec::with_capacity(self.config.walk_length);
            walk.push(current.clone());

            for _ in 1..self.config.walk_length {
                let neighbors = adjacency.neighbors(current);
                if neighbors.is_empty() {
                    break;
                }
                current = &neighbors[rng.gen_range(0..neighbors.len())];
                walk.push(current.clone());
            }

            walks.push(walk);
        }

        info!(
            walks = walks.len(),
            start_nodes = start_nodes.len(),
            edges = adjacency.edge_count(),
            "Generated random walks in-process"
        );

        Ok(WalkCorpus { walks })
    }

    fn walk_count(&self, nodes: usize) -> Result<usize> {
        self.config.walks_per_node.checked_mul(nodes).ok_or_else(|| {
            RecommendError::InvalidInput(format!(
                "walks_per_node ({}) x {} nodes overflows the walk count",
                self.config.walks_per_node, nodes
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(&str, &str)]) -> Vec<FollowEdge> {
        pairs.iter().map(|(a, b)| FollowEdge::new(*a, *b)).collect()
    }

    fn config(walk_length: usize, walks_per_node: usize) -> WalkConfig {
        WalkConfig {
            walk_length,
            walks_per_node,
            random_seed: 7,
        }
    }

    #[test]
    fn test_adjacency_keeps_isolated_users() {
        let adjacency = Adjacency::from_edges(["a", "b", "c"], &edges(&[("a", "b"), ("d", "a")]));

        assert_eq!(adjacency.users(), &["a", "b", "c", "d"]);
        assert_eq!(adjacency.neighbors("a"), &["b".to_string()]);
        assert!(adjacency.neighbors("c").is_empty());
        assert!(adjacency.has_edge("d", "a"));
        assert!(!adjacency.has_edge("a", "d"));
        assert_eq!(adjacency.edge_count(), 2);
    }

    #[test]
    fn test_no_edges_emits_single_node_walks() {
        let adjacency = Adjacency::from_edges(["a", "b", "c", "d"], &[]);
        let sampler = WalkSampler::new(config(10, 3)).unwrap();

        let corpus = sampler.sample(&adjacency).unwrap();

        assert_eq!(corpus.len(), 4 * 3);
        assert!(corpus.walks().iter().all(|w| w.len() == 1));
        let stats = corpus.stats();
        assert_eq!(stats.unique_users, 4);
        assert_eq!(stats.max_length, 1);
    }

    #[test]
    fn test_walks_follow_real_edges() {
        let graph = edges(&[
            ("a", "b"),
            ("b", "c"),
            ("c", "a"),
            ("c", "d"),
            ("e", "a"),
        ]);
        let adjacency = Adjacency::from_edges(["a", "b", "c", "d", "e", "f"], &graph);
        let sampler = WalkSampler::new(config(6, 5)).unwrap();

        let corpus = sampler.sample(&adjacency).unwrap();

        // a, b, c and e have outgoing edges
        assert_eq!(corpus.len(), 4 * 5);
        for walk in corpus.walks() {
            assert!((1..=6).contains(&walk.len()));
            assert_ne!(walk[0], "d");
            assert_ne!(walk[0], "f");
            for pair in walk.windows(2) {
                assert!(adjacency.has_edge(&pair[0], &pair[1]), "{:?}", pair);
            }
        }
    }

    #[test]
    fn test_walk_stops_at_sink() {
        let adjacency = Adjacency::from_edges(["a", "b"], &edges(&[("a", "b")]));
        let sampler = WalkSampler::new(config(80, 2)).unwrap();

        let corpus = sampler.sample(&adjacency).unwrap();

        assert_eq!(corpus.len(), 2);
        for walk in corpus.walks() {
            assert_eq!(walk, &vec!["a".to_string(), "b".to_string()]);
        }
    }

    #[test]
    fn test_same_seed_same_corpus() {
        let graph = edges(&[("a", "b"), ("a", "c"), ("b", "a"), ("c", "b"), ("c", "a")]);
        let adjacency = Adjacency::from_edges(Vec::<String>::new(), &graph);

        let first = WalkSampler::new(config(8, 4)).unwrap().sample(&adjacency).unwrap();
        let second = WalkSampler::new(config(8, 4))
            .unwrap()
            .sample(&adjacency)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_graph_and_invalid_config() {
        let sampler = WalkSampler::new(config(5, 1)).unwrap();
        assert!(sampler.sample(&Adjacency::default()).unwrap().is_empty());

        assert!(WalkSampler::new(config(0, 1)).is_err());
        assert!(WalkSampler::new(config(5, 0)).is_err());
    }

    #[test]
    fn test_walk_count_overflow_is_rejected() {
        let sampler = WalkSampler::new(config(5, usize::MAX)).unwrap();

        let linked = Adjacency::from_edges(["a", "b"], &edges(&[("a", "b"), ("b", "a")]));
        assert!(matches!(
            sampler.sample(&linked),
            Err(RecommendError::InvalidInput(_))
        ));

        let isolated = Adjacency::from_edges(["a", "b"], &[]);
        assert!(matches!(
            sampler.sample(&isolated),
            Err(RecommendError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_starts_are_drawn_from_the_source_set() {
        let graph = edges(&[("a", "b"), ("b", "a"), ("c", "a")]);
        let adjacency = Adjacency::from_edges(["a", "b", "c", "d"], &graph);
        let sampler = WalkSampler::new(config(3, 20)).unwrap();

        let corpus = sampler.sample(&adjacency).unwrap();

        // 20 walks per source on average, not per source exactly
        assert_eq!(corpus.len(), 3 * 20);
        let mut starts: HashMap<&str, usize> = HashMap::new();
        for walk in corpus.walks() {
            *starts.entry(walk[0].as_str()).or_default() += 1;
        }
        assert!(!starts.contains_key("d"));
        assert_eq!(starts.values().sum::<usize>(), 60);
    }

    #[test]
    fn test_corpus_drops_empty_ids() {
        let corpus = WalkCorpus::new(vec![
            vec!["a".to_string(), String::new(), "b".to_string()],
            vec![String::new()],
        ]);
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.walks()[0], vec!["a".to_string(), "b".to_string()]);
    }
}
