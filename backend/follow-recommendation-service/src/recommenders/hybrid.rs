use super::{ContentRecommender, EnsemblePolicy, GraphRecommender};
use crate::error::{RecommendError, Result};
use crate::graph::GraphSource;
use crate::models::{HybridScore, ScoredUser};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Combines the content (CB) and graph (CF) recommenders under one
/// [`EnsemblePolicy`].
///
/// Either side may be absent when its artifact failed to load. The weighted
/// policy then ranks with whatever is left; the switch policy fails only for
/// users routed to the missing side.
pub struct HybridRecommender {
    content: Option<Arc<ContentRecommender>>,
    collaborative: Option<Arc<GraphRecommender>>,
    graph: Arc<dyn GraphSource>,
    policy: EnsemblePolicy,
    default_k: usize,
    exclude_following: bool,
}

impl HybridRecommender {
    pub fn new(
        content: Option<Arc<ContentRecommender>>,
        collaborative: Option<Arc<GraphRecommender>>,
        graph: Arc<dyn GraphSource>,
        policy: EnsemblePolicy,
    ) -> Self {
        Self {
            content,
            collaborative,
            graph,
            policy,
            default_k: 10,
            exclude_following: false,
        }
    }

    pub fn with_default_k(mut self, k: usize) -> Self {
        self.default_k = k;
        self
    }

    /// Drop users the target already follows from both sides.
    pub fn with_exclude_following(mut self, enabled: bool) -> Self {
        self.exclude_following = enabled;
        self
    }

    pub fn policy(&self) -> EnsemblePolicy {
        self.policy
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub fn content(&self) -> Option<&Arc<ContentRecommender>> {
        self.content.as_ref()
    }

    pub fn collaborative(&self) -> Option<&Arc<GraphRecommender>> {
        self.collaborative.as_ref()
    }

    pub async fn recommend(
        &self,
        user_id: &str,
        k: Option<usize>,
        exclude: Option<&HashSet<String>>,
    ) -> Result<Vec<HybridScore>> {
        let k = k.unwrap_or(self.default_k);
        if k == 0 {
            return Ok(Vec::new());
        }

        let exclude = self.exclusions(user_id, exclude).await?;
        let exclude = exclude.as_deref();

        match self.policy {
            EnsemblePolicy::Weighted {
                cf_weight,
                cb_weight,
            } => {
                self.weighted(user_id, k, exclude, cf_weight, cb_weight)
                    .await
            }
            EnsemblePolicy::Switch { follower_threshold } => {
                self.switch(user_id, k, exclude, follower_threshold).await
            }
        }
    }

    pub async fn batch_recommend(
        &self,
        user_ids: &[String],
        k: Option<usize>,
    ) -> Result<HashMap<String, Vec<HybridScore>>> {
        let mut results = HashMap::with_capacity(user_ids.len());
        for user_id in user_ids {
            results.insert(user_id.clone(), self.recommend(user_id, k, None).await?);
        }
        Ok(results)
    }

    async fn exclusions<'a>(
        &self,
        user_id: &str,
        exclude: Option<&'a HashSet<String>>,
    ) -> Result<Option<Cow<'a, HashSet<String>>>> {
        if !self.exclude_following {
            return Ok(exclude.map(Cow::Borrowed));
        }

        let mut merged = exclude.cloned().unwrap_or_default();
        merged.extend(self.graph.following(user_id).await?);
        Ok(Some(Cow::Owned(merged)))
    }

    async fn weighted(
        &self,
        user_id: &str,
        k: usize,
        exclude: Option<&HashSet<String>>,
        cf_weight: f32,
        cb_weight: f32,
    ) -> Result<Vec<HybridScore>> {
        if self.content.is_none() && self.collaborative.is_none() {
            return Err(RecommendError::ModelUnavailable(
                "neither the content nor the graph model is loaded".to_string(),
            ));
        }

        let cf_recs = match &self.collaborative {
            Some(cf) => cf.recommend(user_id, k, exclude, None)?,
            None => Vec::new(),
        };
        let cb_recs = match &self.content {
            Some(cb) => cb.recommend(user_id, k, exclude, None).await?,
            None => Vec::new(),
        };

        // CF ids first, then CB-only ids, so equal combined scores keep that order
        let mut order: Vec<String> = Vec::with_capacity(cf_recs.len() + cb_recs.len());
        let mut sides: HashMap<String, (Option<f32>, Option<f32>)> = HashMap::new();
        for rec in cf_recs {
            order.push(rec.user_id.clone());
            sides.insert(rec.user_id, (Some(rec.score), None));
        }
        for rec in cb_recs {
            match sides.get_mut(&rec.user_id) {
                Some(entry) => entry.1 = Some(rec.score),
                None => {
                    order.push(rec.user_id.clone());
                    sides.insert(rec.user_id, (None, Some(rec.score)));
                }
            }
        }

        let mut combined: Vec<HybridScore> = order
            .into_iter()
            .map(|id| {
                let (cf_score, cb_score) = sides.get(&id).copied().unwrap_or((None, None));
                let score = cf_weight * cf_score.unwrap_or(0.0) + cb_weight * cb_score.unwrap_or(0.0);
                HybridScore {
                    user_id: id,
                    score,
                    cf_score,
                    cb_score,
                }
            })
            .collect();

        combined.sort_by(|a, b| b.score.total_cmp(&a.score));
        combined.truncate(k);
        Ok(combined)
    }

    async fn switch(
        &self,
        user_id: &str,
        k: usize,
        exclude: Option<&HashSet<String>>,
        follower_threshold: u64,
    ) -> Result<Vec<HybridScore>> {
        let followers = self.graph.follower_count(user_id).await?;

        if followers >= follower_threshold {
            debug!(user_id, followers, "Routing warm user to graph model");
            let cf = self.collaborative.as_ref().ok_or_else(|| {
                RecommendError::ModelUnavailable("graph model is not loaded".to_string())
            })?;
            let recs = cf.recommend(user_id, k, exclude, None)?;
            Ok(recs.into_iter().map(from_cf).collect())
        } else {
            debug!(user_id, followers, "Routing cold user to content model");
            let cb = self.content.as_ref().ok_or_else(|| {
                RecommendError::ModelUnavailable("content model is not loaded".to_string())
            })?;
            let recs = cb.recommend(user_id, k, exclude, None).await?;
            Ok(recs.into_iter().map(from_cb).collect())
        }
    }
}

fn from_cf(rec: ScoredUser) -> HybridScore {
    HybridScore {
        user_id: rec.user_id,
        score: rec.score,
        cf_score: Some(rec.score),
        cb_score: None,
    }
}

fn from_cb(rec: ScoredUser) -> HybridScore {
    HybridScore {
        user_id: rec.user_id,
        score: rec.score,
        cf_score: None,
        cb_score: Some(rec.score),
    }
}
