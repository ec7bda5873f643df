use super::GraphSource;
use crate::config::Neo4jSettings;
use crate::error::{RecommendError, Result};
use crate::models::{FollowEdge, UserProfile};
use crate::walks::{WalkConfig, WalkCorpus};
use anyhow::Context;
use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name of the in-memory GDS projection used for native walks.
const WALK_GRAPH_NAME: &str = "user-follow-graph";

/// Follow graph stored in Neo4j as `(:User {name})-[:FOLLOWS]->(:User)`.
#[derive(Clone)]
pub struct Neo4jGraphSource {
    graph: Arc<Graph>,
}

fn upstream(err: anyhow::Error) -> RecommendError {
    RecommendError::UpstreamUnavailable(format!("{:#}", err))
}

fn profile_from_row(row: &Row) -> Option<UserProfile> {
    let user_id: String = row.get("username").ok()?;
    Some(UserProfile {
        user_id,
        age: row.get::<Option<i64>>("age").unwrap_or(None),
        favorite_sport: row.get::<Option<String>>("favorite_sport").unwrap_or(None),
        competitive_level: row
            .get::<Option<String>>("competitive_level")
            .unwrap_or(None),
        latitude: row.get::<Option<f64>>("latitude").unwrap_or(None),
        longitude: row.get::<Option<f64>>("longitude").unwrap_or(None),
    })
}

/// Maps a GDS walk to user ids, cutting it at the first node without one.
/// Skipping the node instead would join two users that share no edge.
fn map_walk(node_ids: &[i64], id_to_user: &HashMap<i64, String>) -> Vec<String> {
    node_ids
        .iter()
        .map_while(|id| id_to_user.get(id).cloned())
        .collect()
}

fn is_missing_procedure(err: &neo4rs::Error) -> bool {
    let message = err.to_string();
    message.contains("ProcedureNotFound") || message.to_lowercase().contains("no procedure")
}

impl Neo4jGraphSource {
    pub async fn connect(settings: &Neo4jSettings) -> anyhow::Result<Self> {
        let mut builder = ConfigBuilder::default()
            .uri(settings.uri.as_str())
            .user(settings.username.as_str())
            .password(settings.password.as_str());
        if let Some(db) = &settings.database {
            builder = builder.db(db.as_str());
        }
        let config = builder.build().context("Invalid Neo4j configuration")?;

        let graph = Graph::connect(config)
            .await
            .context("Failed to connect to Neo4j")?;

        Ok(Self {
            graph: Arc::new(graph),
        })
    }

    pub async fn health_check(&self) -> anyhow::Result<bool> {
        let mut result = self
            .graph
            .execute(query("RETURN 1 AS health"))
            .await
            .context("Health check query failed")?;

        if let Some(row) = result.next().await? {
            let health: i64 = row.get("health").unwrap_or(0);
            Ok(health == 1)
        } else {
            Ok(false)
        }
    }

    async fn query_profiles(&self, cypher: neo4rs::Query) -> anyhow::Result<Vec<UserProfile>> {
        let mut result = self
            .graph
            .execute(cypher)
            .await
            .context("Failed to query user profiles")?;

        let mut profiles = Vec::new();
        while let Some(row) = result.next().await? {
            if let Some(profile) = profile_from_row(&row) {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }

    async fn query_strings(&self, cypher: neo4rs::Query, column: &str) -> anyhow::Result<Vec<String>> {
        let mut result = self
            .graph
            .execute(cypher)
            .await
            .with_context(|| format!("Failed to query {}", column))?;

        let mut values = Vec::new();
        while let Some(row) = result.next().await? {
            if let Ok(value) = row.get::<String>(column) {
                if !value.is_empty() {
                    values.push(value);
                }
            }
        }
        Ok(values)
    }

    async fn drain(&self, cypher: neo4rs::Query) -> std::result::Result<(), neo4rs::Error> {
        let mut result = self.graph.execute(cypher).await?;
        while result.next().await?.is_some() {}
        Ok(())
    }

    /// Re-creates the `User`/`FOLLOWS` projection and streams GDS random walks
    /// from every user with at least one followee.
    async fn gds_walks(
        &self,
        config: &WalkConfig,
    ) -> std::result::Result<Option<WalkCorpus>, anyhow::Error> {
        let drop = query("CALL gds.graph.drop($graphName, false) YIELD graphName RETURN graphName")
            .param("graphName", WALK_GRAPH_NAME);
        match self.drain(drop).await {
            Ok(()) => {}
            Err(e) if is_missing_procedure(&e) => {
                info!("GDS not available, using in-process walks");
                return Ok(None);
            }
            Err(e) => debug!("Drop walk projection (may not exist): {}", e),
        }

        let project = query(
            r#"
            CALL gds.graph.project($graphName, 'User', 'FOLLOWS')
            YIELD graphName, nodeCount, relationshipCount
            RETURN graphName, nodeCount, relationshipCount
            "#,
        )
        .param("graphName", WALK_GRAPH_NAME);
        match self.drain(project).await {
            Ok(()) => {}
            Err(e) if is_missing_procedure(&e) => {
                info!("GDS not available, using in-process walks");
                return Ok(None);
            }
            Err(e) => return Err(anyhow::Error::new(e).context("Failed to project walk graph")),
        }

        let mut sources = self
            .graph
            .execute(query(
                "MATCH (u:User) WHERE (u)-[:FOLLOWS]->(:User) RETURN id(u) AS nodeId",
            ))
            .await
            .context("Failed to load walk start nodes")?;
        let mut source_nodes: Vec<i64> = Vec::new();
        while let Some(row) = sources.next().await? {
            if let Ok(id) = row.get::<i64>("nodeId") {
                source_nodes.push(id);
            }
        }
        if source_nodes.is_empty() {
            // single-node walks are produced in-process
            return Ok(None);
        }

        let walks_query = query(
            r#"
            CALL gds.randomWalk.stream($graphName, {
                sourceNodes: $sourceNodes,
                walkLength: $walkLength,
                walksPerNode: $walksPerNode,
                randomSeed: $randomSeed,
                concurrency: 1
            })
            YIELD nodeIds
            RETURN nodeIds
            "#,
        )
        .param("graphName", WALK_GRAPH_NAME)
        .param("sourceNodes", source_nodes)
        .param("walkLength", config.walk_length as i64)
        .param("walksPerNode", config.walks_per_node as i64)
        .param("randomSeed", config.random_seed as i64);

        let mut result = match self.graph.execute(walks_query).await {
            Ok(result) => result,
            Err(e) if is_missing_procedure(&e) => return Ok(None),
            Err(e) => return Err(anyhow::Error::new(e).context("Failed to stream random walks")),
        };

        let mut raw_walks: Vec<Vec<i64>> = Vec::new();
        while let Some(row) = result.next().await? {
            if let Ok(node_ids) = row.get::<Vec<i64>>("nodeIds") {
                raw_walks.push(node_ids);
            }
        }

        if raw_walks.is_empty() {
            warn!("GDS returned no walks");
            return Ok(Some(WalkCorpus::default()));
        }

        // one batch lookup for every node id seen in any walk
        let mut all_ids: Vec<i64> = raw_walks.iter().flatten().copied().collect();
        all_ids.sort_unstable();
        all_ids.dedup();

        let mut mapping = self
            .graph
            .execute(
                query(
                    r#"
                    UNWIND $nodeIds AS nodeId
                    MATCH (u:User) WHERE id(u) = nodeId
                    RETURN nodeId, u.name AS username
                    "#,
                )
                .param("nodeIds", all_ids),
            )
            .await
            .context("Failed to map walk node ids")?;

        let mut id_to_user: HashMap<i64, String> = HashMap::new();
        while let Some(row) = mapping.next().await? {
            if let (Ok(node_id), Ok(name)) = (row.get::<i64>("nodeId"), row.get::<String>("username"))
            {
                id_to_user.insert(node_id, name);
            }
        }

        let walks = raw_walks
            .iter()
            .map(|ids| map_walk(ids, &id_to_user))
            .collect();
        let corpus = WalkCorpus::new(walks);

        info!(walks = corpus.len(), "Generated random walks with GDS");
        Ok(Some(corpus))
    }
}

#[async_trait]
impl GraphSource for Neo4jGraphSource {
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let cypher = query(
            r#"
            MATCH (u:User {name: $username})
            RETURN
                u.name AS username,
                u.age AS age,
                u.sport AS favorite_sport,
                u.competitive_level AS competitive_level,
                u.latitude AS latitude,
                u.longitude AS longitude
            "#,
        )
        .param("username", user_id);

        let profiles = self.query_profiles(cypher).await.map_err(upstream)?;
        Ok(profiles.into_iter().next())
    }

    async fn fetch_profiles(&self) -> Result<Vec<UserProfile>> {
        let cypher = query(
            r#"
            MATCH (u:User)
            RETURN
                u.name AS username,
                u.age AS age,
                u.sport AS favorite_sport,
                u.competitive_level AS competitive_level,
                u.latitude AS latitude,
                u.longitude AS longitude
            ORDER BY u.name
            "#,
        );

        let profiles = self.query_profiles(cypher).await.map_err(upstream)?;
        debug!(count = profiles.len(), "Fetched user profiles from Neo4j");
        Ok(profiles)
    }

    async fn user_ids(&self) -> Result<Vec<String>> {
        self.query_strings(
            query("MATCH (u:User) RETURN u.name AS username ORDER BY u.name"),
            "username",
        )
        .await
        .map_err(upstream)
    }

    async fn follow_edges(&self) -> Result<Vec<FollowEdge>> {
        let load = async {
            let mut result = self
                .graph
                .execute(query(
                    "MATCH (u:User)-[:FOLLOWS]->(v:User) RETURN u.name AS src, v.name AS dst",
                ))
                .await
                .context("Failed to load FOLLOWS edges")?;

            let mut edges = Vec::new();
            while let Some(row) = result.next().await? {
                if let (Ok(src), Ok(dst)) = (row.get::<String>("src"), row.get::<String>("dst")) {
                    if !src.is_empty() && !dst.is_empty() {
                        edges.push(FollowEdge::new(src, dst));
                    }
                }
            }
            anyhow::Ok(edges)
        };

        let edges = load.await.map_err(upstream)?;
        debug!(count = edges.len(), "Loaded follow edges from Neo4j");
        Ok(edges)
    }

    async fn follower_count(&self, user_id: &str) -> Result<u64> {
        let count = async {
            let mut result = self
                .graph
                .execute(
                    query(
                        r#"
                        OPTIONAL MATCH (f:User)-[:FOLLOWS]->(u:User {name: $username})
                        RETURN count(f) AS followers
                        "#,
                    )
                    .param("username", user_id),
                )
                .await
                .context("Failed to count followers")?;

            let followers = match result.next().await? {
                Some(row) => row.get::<i64>("followers").unwrap_or(0),
                None => 0,
            };
            anyhow::Ok(followers.max(0) as u64)
        };

        count.await.map_err(upstream)
    }

    async fn following(&self, user_id: &str) -> Result<Vec<String>> {
        self.query_strings(
            query("MATCH (:User {name: $username})-[:FOLLOWS]->(v:User) RETURN v.name AS username")
                .param("username", user_id),
            "username",
        )
        .await
        .map_err(upstream)
    }

    async fn sample_walks(&self, config: &WalkConfig) -> Result<Option<WalkCorpus>> {
        self.gds_walks(config).await.map_err(upstream)
    }
}
