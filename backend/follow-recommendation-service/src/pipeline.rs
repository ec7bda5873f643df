//! Offline model building: walks, embeddings and the feature model.
//!
//! Every step writes its artifact through [`artifacts`] so a serving process
//! reloading mid-run never sees a half-written file.

use crate::artifacts::{self, EmbeddingArtifact};
use crate::config::Config;
use crate::embedding::{EmbeddingTable, EmbeddingTrainer, TrainerConfig};
use crate::error::Result;
use crate::features::FeatureEngineer;
use crate::graph::GraphSource;
use crate::recommenders::FeatureModel;
use crate::walks::{Adjacency, WalkConfig, WalkCorpus, WalkSampler, WalkStrategy};
use std::time::Instant;
use tracing::{info, warn};

/// Samples a fresh walk corpus, inside the graph engine when asked and able.
pub async fn generate_walks(
    graph: &dyn GraphSource,
    config: &WalkConfig,
    strategy: WalkStrategy,
) -> Result<WalkCorpus> {
    // rejects bad parameters before touching the graph
    let sampler = WalkSampler::new(*config)?;

    if strategy == WalkStrategy::Native {
        match graph.sample_walks(config).await? {
            Some(corpus) => return Ok(corpus),
            None => info!("Native walk sampling unavailable, falling back to in-process walks"),
        }
    }

    let users = graph.user_ids().await?;
    let edges = graph.follow_edges().await?;
    info!(
        users = users.len(),
        edges = edges.len(),
        "Loaded follow graph for walk sampling"
    );

    let adjacency = Adjacency::from_edges(users, &edges);
    sampler.sample(&adjacency)
}

pub fn train_embeddings(corpus: &WalkCorpus, config: TrainerConfig) -> Result<EmbeddingTable> {
    let trainer = EmbeddingTrainer::new(config)?;
    trainer.train(corpus)
}

/// Featurizes every profile in the graph, ordered by user id.
pub async fn build_feature_model(graph: &dyn GraphSource) -> Result<FeatureModel> {
    let profiles = graph.fetch_profiles().await?;
    if profiles.is_empty() {
        warn!("No user profiles found, feature model is empty");
    }

    let engineer = FeatureEngineer::new();
    let matrix = engineer.featurize_batch(&profiles);
    let ids = profiles.into_iter().map(|p| p.user_id).collect();

    FeatureModel::new(ids, matrix, engineer.feature_names().to_vec())
}

/// Generates walks and writes them to `walks_path`.
pub async fn run_walks(graph: &dyn GraphSource, config: &Config) -> Result<WalkCorpus> {
    let started = Instant::now();
    let corpus = generate_walks(graph, &config.walk_config(), config.walk_strategy()?).await?;

    let stats = corpus.stats();
    info!(
        walks = stats.walk_count,
        unique_users = stats.unique_users,
        mean_length = stats.mean_length,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Walk corpus ready"
    );

    artifacts::save_corpus(&config.walks_path, &corpus)?;
    Ok(corpus)
}

/// Trains on `corpus` and writes the embedding artifact.
pub fn run_embeddings(corpus: &WalkCorpus, config: &Config) -> Result<EmbeddingTable> {
    let started = Instant::now();
    let trainer_config = config.trainer_config()?;
    let table = train_embeddings(corpus, trainer_config.clone())?;

    info!(
        users = table.len(),
        dimension = table.dimension(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Trained graph embeddings"
    );

    let mut artifact = EmbeddingArtifact::from_table(&table);
    artifact.walk_config = Some(config.walk_config());
    artifact.trainer_config = Some(trainer_config);
    artifact.corpus_stats = Some(corpus.stats());
    artifacts::save_embeddings(&config.embeddings_path, &artifact)?;

    Ok(table)
}

/// Trains from the corpus previously written by [`run_walks`].
pub fn run_embeddings_from_saved_walks(config: &Config) -> Result<EmbeddingTable> {
    let corpus = artifacts::load_corpus(&config.walks_path)?;
    info!(
        path = %config.walks_path.display(),
        walks = corpus.len(),
        "Loaded walk corpus"
    );
    run_embeddings(&corpus, config)
}

/// Walks + embeddings as one artifact generation.
pub async fn run_cf_pipeline(graph: &dyn GraphSource, config: &Config) -> Result<EmbeddingTable> {
    let corpus = run_walks(graph, config).await?;
    run_embeddings(&corpus, config)
}

pub async fn run_cb_pipeline(graph: &dyn GraphSource, config: &Config) -> Result<FeatureModel> {
    let model = build_feature_model(graph).await?;
    artifacts::save_feature_model(&config.cb_model_path, &model.to_artifact())?;

    info!(
        users = model.len(),
        features = model.feature_names().len(),
        path = %config.cb_model_path.display(),
        "Built content-based feature model"
    );
    Ok(model)
}
