use crate::embedding::{Objective, TrainerConfig};
use crate::error::{RecommendError, Result};
use crate::recommenders::EnsemblePolicy;
use crate::walks::{WalkConfig, WalkStrategy};
use serde::Deserialize;
use std::path::PathBuf;

/// Flat service configuration, read from the environment (and `.env`).
///
/// Every key maps to the upper-case environment variable of the same name,
/// e.g. `walk_length` <- `WALK_LENGTH`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Neo4j connection; required by anything that talks to the graph
    pub neo4j_uri: Option<String>,
    pub neo4j_username: Option<String>,
    pub neo4j_password: Option<String>,
    pub neo4j_database: Option<String>,

    // Random walks
    pub walk_length: usize,
    pub walks_per_node: usize,
    pub random_seed: u64,
    pub walk_strategy: String,

    // Embedding training
    pub vector_size: usize,
    pub window: usize,
    pub min_count: usize,
    pub training_objective: String,
    pub epochs: usize,
    pub negative: usize,
    pub learning_rate: f32,
    pub min_learning_rate: f32,

    // Ensemble
    pub cf_weight: f32,
    pub cb_weight: f32,
    pub default_k: usize,
    pub follower_threshold: u64,
    pub ensemble_policy: String,
    pub exclude_following: bool,

    // Artifacts
    pub embeddings_path: PathBuf,
    pub walks_path: PathBuf,
    pub cb_model_path: PathBuf,
}

/// Resolved Neo4j connection settings.
#[derive(Debug, Clone)]
pub struct Neo4jSettings {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub database: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            neo4j_uri: None,
            neo4j_username: None,
            neo4j_password: None,
            neo4j_database: None,
            walk_length: 80,
            walks_per_node: 10,
            random_seed: 42,
            walk_strategy: "native".to_string(),
            vector_size: 128,
            window: 10,
            min_count: 1,
            training_objective: "skip-gram".to_string(),
            epochs: 10,
            negative: 5,
            learning_rate: 0.025,
            min_learning_rate: 0.0001,
            cf_weight: 0.5,
            cb_weight: 0.5,
            default_k: 10,
            follower_threshold: 10,
            ensemble_policy: "weighted".to_string(),
            exclude_following: false,
            embeddings_path: PathBuf::from("data/embeddings/cf_embeddings.json"),
            walks_path: PathBuf::from("data/walks/random_walks.jsonl"),
            cb_model_path: PathBuf::from("data/models/cb_model.json"),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();
        let config = config::Config::builder()
            .set_default("walk_length", defaults.walk_length as u64)?
            .set_default("walks_per_node", defaults.walks_per_node as u64)?
            .set_default("random_seed", defaults.random_seed)?
            .set_default("walk_strategy", defaults.walk_strategy.clone())?
            .set_default("vector_size", defaults.vector_size as u64)?
            .set_default("window", defaults.window as u64)?
            .set_default("min_count", defaults.min_count as u64)?
            .set_default("training_objective", defaults.training_objective.clone())?
            .set_default("epochs", defaults.epochs as u64)?
            .set_default("negative", defaults.negative as u64)?
            .set_default("learning_rate", defaults.learning_rate as f64)?
            .set_default("min_learning_rate", defaults.min_learning_rate as f64)?
            .set_default("cf_weight", defaults.cf_weight as f64)?
            .set_default("cb_weight", defaults.cb_weight as f64)?
            .set_default("default_k", defaults.default_k as u64)?
            .set_default("follower_threshold", defaults.follower_threshold)?
            .set_default("ensemble_policy", defaults.ensemble_policy.clone())?
            .set_default("exclude_following", defaults.exclude_following)?
            .set_default(
                "embeddings_path",
                defaults.embeddings_path.to_string_lossy().into_owned(),
            )?
            .set_default("walks_path", defaults.walks_path.to_string_lossy().into_owned())?
            .set_default(
                "cb_model_path",
                defaults.cb_model_path.to_string_lossy().into_owned(),
            )?
            .add_source(config::Environment::default())
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the model parameters. Connection settings are checked separately by
    /// [`Config::neo4j`] because only graph-facing entrypoints need them.
    pub fn validate(&self) -> Result<()> {
        if self.walk_length == 0 {
            return Err(RecommendError::Configuration(
                "WALK_LENGTH must be at least 1".to_string(),
            ));
        }

        if self.walks_per_node == 0 {
            return Err(RecommendError::Configuration(
                "WALKS_PER_NODE must be at least 1".to_string(),
            ));
        }

        if self.vector_size == 0 || self.window == 0 || self.epochs == 0 {
            return Err(RecommendError::Configuration(
                "VECTOR_SIZE, WINDOW and EPOCHS must be greater than 0".to_string(),
            ));
        }

        if self.default_k == 0 {
            return Err(RecommendError::Configuration(
                "DEFAULT_K must be greater than 0".to_string(),
            ));
        }

        self.walk_strategy()?;
        self.objective()?;
        self.ensemble_policy()?;

        Ok(())
    }

    pub fn neo4j(&self) -> Result<Neo4jSettings> {
        let required = |value: &Option<String>, name: &str| -> Result<String> {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
                .ok_or_else(|| RecommendError::Configuration(format!("{} is required", name)))
        };

        Ok(Neo4jSettings {
            uri: required(&self.neo4j_uri, "NEO4J_URI")?,
            username: required(&self.neo4j_username, "NEO4J_USERNAME")?,
            password: required(&self.neo4j_password, "NEO4J_PASSWORD")?,
            database: self
                .neo4j_database
                .clone()
                .filter(|db| !db.trim().is_empty()),
        })
    }

    pub fn walk_strategy(&self) -> Result<WalkStrategy> {
        match self.walk_strategy.trim().to_ascii_lowercase().as_str() {
            "native" | "gds" => Ok(WalkStrategy::Native),
            "in-process" | "in_process" | "inprocess" | "cypher" => Ok(WalkStrategy::InProcess),
            other => Err(RecommendError::Configuration(format!(
                "unknown WALK_STRATEGY '{}'",
                other
            ))),
        }
    }

    pub fn objective(&self) -> Result<Objective> {
        match self.training_objective.trim().to_ascii_lowercase().as_str() {
            "skip-gram" | "skipgram" | "sg" | "1" => Ok(Objective::SkipGram),
            "context-average" | "cbow" | "0" => Ok(Objective::ContextAverage),
            other => Err(RecommendError::Configuration(format!(
                "unknown TRAINING_OBJECTIVE '{}'",
                other
            ))),
        }
    }

    pub fn ensemble_policy(&self) -> Result<EnsemblePolicy> {
        match self.ensemble_policy.trim().to_ascii_lowercase().as_str() {
            "weighted" => Ok(EnsemblePolicy::Weighted {
                cf_weight: self.cf_weight,
                cb_weight: self.cb_weight,
            }),
            "switch" => Ok(EnsemblePolicy::Switch {
                follower_threshold: self.follower_threshold,
            }),
            other => Err(RecommendError::Configuration(format!(
                "unknown ENSEMBLE_POLICY '{}'",
                other
            ))),
        }
    }

    pub fn walk_config(&self) -> WalkConfig {
        WalkConfig {
            walk_length: self.walk_length,
            walks_per_node: self.walks_per_node,
            random_seed: self.random_seed,
        }
    }

    pub fn trainer_config(&self) -> Result<TrainerConfig> {
        Ok(TrainerConfig {
            vector_size: self.vector_size,
            window: self.window,
            min_count: self.min_count,
            objective: self.objective()?,
            epochs: self.epochs,
            negative: self.negative,
            learning_rate: self.learning_rate,
            min_learning_rate: self.min_learning_rate,
            random_seed: self.random_seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.walk_strategy().unwrap(), WalkStrategy::Native);
        assert_eq!(config.objective().unwrap(), Objective::SkipGram);
        assert_eq!(
            config.ensemble_policy().unwrap(),
            EnsemblePolicy::Weighted {
                cf_weight: 0.5,
                cb_weight: 0.5
            }
        );
    }

    #[test]
    fn test_missing_credentials_is_configuration_error() {
        let mut config = Config {
            neo4j_uri: Some("bolt://localhost:7687".to_string()),
            neo4j_username: Some("neo4j".to_string()),
            ..Config::default()
        };

        assert!(matches!(
            config.neo4j(),
            Err(RecommendError::Configuration(msg)) if msg.contains("NEO4J_PASSWORD")
        ));

        config.neo4j_password = Some("   ".to_string());
        assert!(config.neo4j().is_err());

        config.neo4j_password = Some("secret".to_string());
        let settings = config.neo4j().unwrap();
        assert_eq!(settings.uri, "bolt://localhost:7687");
        assert!(settings.database.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = Config {
            walk_length: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            ensemble_policy: "blend".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            training_objective: "glove".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_switch_policy_and_cbow() {
        let config = Config {
            ensemble_policy: "Switch".to_string(),
            follower_threshold: 25,
            training_objective: "cbow".to_string(),
            walk_strategy: "in-process".to_string(),
            ..Config::default()
        };

        assert_eq!(
            config.ensemble_policy().unwrap(),
            EnsemblePolicy::Switch {
                follower_threshold: 25
            }
        );
        let trainer = config.trainer_config().unwrap();
        assert_eq!(trainer.objective, Objective::ContextAverage);
        assert_eq!(config.walk_strategy().unwrap(), WalkStrategy::InProcess);
    }
}
