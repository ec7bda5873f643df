use crate::artifacts::{self, FeatureModelArtifact};
use crate::error::{RecommendError, Result};
use crate::features::FeatureEngineer;
use crate::graph::GraphSource;
use crate::models::ScoredUser;
use crate::ranking::{self, RankQuery};
use ndarray::{Array1, Array2};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Feature matrix with the ids and feature names that index it.
#[derive(Debug, Clone)]
pub struct FeatureModel {
    ids: Vec<String>,
    matrix: Array2<f32>,
    feature_names: Vec<String>,
    index: HashMap<String, usize>,
}

impl FeatureModel {
    pub fn new(ids: Vec<String>, matrix: Array2<f32>, feature_names: Vec<String>) -> Result<Self> {
        if matrix.nrows() != ids.len() {
            return Err(RecommendError::Artifact(format!(
                "feature matrix has {} rows for {} ids",
                matrix.nrows(),
                ids.len()
            )));
        }
        if matrix.ncols() != feature_names.len() {
            return Err(RecommendError::Artifact(format!(
                "feature matrix has {} columns for {} feature names",
                matrix.ncols(),
                feature_names.len()
            )));
        }

        let mut index = HashMap::with_capacity(ids.len());
        for (idx, id) in ids.iter().enumerate() {
            if index.insert(id.clone(), idx).is_some() {
                return Err(RecommendError::Artifact(format!("duplicate user id '{}'", id)));
            }
        }

        Ok(Self {
            ids,
            matrix,
            feature_names,
            index,
        })
    }

    pub fn from_artifact(artifact: FeatureModelArtifact) -> Result<Self> {
        let matrix = artifact.matrix()?;
        Self::new(artifact.user_ids, matrix, artifact.feature_names)
    }

    pub fn to_artifact(&self) -> FeatureModelArtifact {
        FeatureModelArtifact::new(self.ids.clone(), self.feature_names.clone(), &self.matrix)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn matrix(&self) -> &Array2<f32> {
        &self.matrix
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn row(&self, id: &str) -> Option<Array1<f32>> {
        self.index.get(id).map(|&idx| self.matrix.row(idx).to_owned())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Profile-similarity recommender.
///
/// Users missing from the cached matrix are featurized on the fly from the
/// graph, so they can receive recommendations. They are only recommended *to*
/// others once the feature model is rebuilt.
pub struct ContentRecommender {
    model: FeatureModel,
    engineer: FeatureEngineer,
    graph: Arc<dyn GraphSource>,
}

impl ContentRecommender {
    pub fn new(model: FeatureModel, graph: Arc<dyn GraphSource>) -> Result<Self> {
        let engineer = FeatureEngineer::new();
        if model.feature_names() != engineer.feature_names() {
            return Err(RecommendError::Artifact(format!(
                "feature model has {} features that don't match the current {}-feature layout",
                model.feature_names().len(),
                engineer.dimension()
            )));
        }

        Ok(Self {
            model,
            engineer,
            graph,
        })
    }

    pub fn load(path: &Path, graph: Arc<dyn GraphSource>) -> Result<Self> {
        let model = FeatureModel::from_artifact(artifacts::load_feature_model(path)?)?;
        info!(
            path = %path.display(),
            users = model.len(),
            features = model.feature_names().len(),
            "Loaded content-based model"
        );
        Self::new(model, graph)
    }

    pub fn feature_names(&self) -> &[String] {
        self.model.feature_names()
    }

    pub fn len(&self) -> usize {
        self.model.len()
    }

    pub fn is_empty(&self) -> bool {
        self.model.is_empty()
    }

    /// Cached row, else a live featurization; `None` if the user doesn't exist.
    pub async fn get_features(&self, user_id: &str) -> Result<Option<Array1<f32>>> {
        if let Some(row) = self.model.row(user_id) {
            return Ok(Some(row));
        }

        match self.graph.fetch_profile(user_id).await? {
            Some(profile) => {
                debug!(user_id, "Featurizing cold-start user from graph profile");
                Ok(Some(self.engineer.featurize(&profile)))
            }
            None => Ok(None),
        }
    }

    pub async fn recommend(
        &self,
        user_id: &str,
        k: usize,
        exclude: Option<&HashSet<String>>,
        min_similarity: Option<f32>,
    ) -> Result<Vec<ScoredUser>> {
        let Some(features) = self.get_features(user_id).await? else {
            debug!(user_id, "No profile found, returning no recommendations");
            return Ok(Vec::new());
        };

        ranking::top_k(
            features.view(),
            self.model.matrix().view(),
            self.model.ids(),
            &RankQuery {
                query_id: user_id,
                exclude,
                min_similarity,
                k,
            },
        )
    }

    pub async fn batch_recommend(
        &self,
        user_ids: &[String],
        k: usize,
        exclude_by_user: Option<&HashMap<String, HashSet<String>>>,
    ) -> Result<HashMap<String, Vec<ScoredUser>>> {
        let mut results = HashMap::with_capacity(user_ids.len());
        for user_id in user_ids {
            let exclude = exclude_by_user.and_then(|m| m.get(user_id));
            let recs = self.recommend(user_id, k, exclude, None).await?;
            results.insert(user_id.clone(), recs);
        }
        Ok(results)
    }

    /// Named feature values for one user.
    pub async fn describe_user(&self, user_id: &str) -> Result<Vec<(String, f32)>> {
        let features = self
            .get_features(user_id)
            .await?
            .ok_or_else(|| RecommendError::NotFound(format!("user '{}'", user_id)))?;
        self.engineer.describe(features.view())
    }
}
