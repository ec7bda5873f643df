//! Serving handle: owns the loaded models and swaps them on reload.

use crate::config::Config;
use crate::error::{RecommendError, Result};
use crate::graph::GraphSource;
use crate::models::{Explanation, HybridScore};
use crate::recommenders::{ContentRecommender, GraphRecommender, HybridRecommender};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub struct RecommendationService {
    config: Config,
    graph: Arc<dyn GraphSource>,
    current: RwLock<Arc<HybridRecommender>>,
}

impl RecommendationService {
    /// Loads both artifacts. A missing or broken artifact disables only its
    /// own recommender.
    pub async fn load(config: Config, graph: Arc<dyn GraphSource>) -> Result<Self> {
        let hybrid = build(&config, graph.clone())?;
        Ok(Self {
            config,
            graph,
            current: RwLock::new(Arc::new(hybrid)),
        })
    }

    /// Loads fresh artifacts and swaps them in whole.
    pub async fn reload(&self) -> Result<()> {
        let hybrid = Arc::new(build(&self.config, self.graph.clone())?);
        *self.current.write().await = hybrid;
        info!("Recommendation models reloaded");
        Ok(())
    }

    pub async fn recommender(&self) -> Arc<HybridRecommender> {
        self.current.read().await.clone()
    }

    pub async fn recommend(&self, user_id: &str, k: Option<usize>) -> Result<Vec<HybridScore>> {
        self.recommender().await.recommend(user_id, k, None).await
    }

    pub async fn explain(&self, target: &str, candidate: &str) -> Result<Explanation> {
        let recommender = self.recommender().await;
        let cf = recommender.collaborative().ok_or_else(|| {
            RecommendError::ModelUnavailable("graph model is not loaded".to_string())
        })?;
        cf.explain(target, candidate)
    }
}

fn build(config: &Config, graph: Arc<dyn GraphSource>) -> Result<HybridRecommender> {
    let content = match ContentRecommender::load(&config.cb_model_path, graph.clone()) {
        Ok(cb) => Some(Arc::new(cb)),
        Err(e) if e.is_artifact_error() => {
            warn!(error = %e, "Content-based recommender disabled");
            None
        }
        Err(e) => return Err(e),
    };

    let collaborative = match GraphRecommender::load(&config.embeddings_path) {
        Ok(cf) => Some(Arc::new(cf)),
        Err(e) if e.is_artifact_error() => {
            warn!(error = %e, "Graph recommender disabled");
            None
        }
        Err(e) => return Err(e),
    };

    if content.is_none() && collaborative.is_none() {
        warn!("No recommendation model loaded; requests will fail until a reload succeeds");
    }

    Ok(HybridRecommender::new(content, collaborative, graph, config.ensemble_policy()?)
        .with_default_k(config.default_k)
        .with_exclude_following(config.exclude_following))
}
