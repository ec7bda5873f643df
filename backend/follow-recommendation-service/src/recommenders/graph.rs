use super::EXPLAIN_TOP_N;
use crate::artifacts;
use crate::embedding::EmbeddingTable;
use crate::error::{RecommendError, Result};
use crate::models::{Explanation, ScoredUser};
use crate::ranking::{self, cosine_similarity, RankQuery};
use ndarray::ArrayView1;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Graph-embedding recommender. Closed world: only users present in the
/// embedding table can query or be recommended.
#[derive(Debug, Clone)]
pub struct GraphRecommender {
    embeddings: EmbeddingTable,
}

impl GraphRecommender {
    pub fn new(embeddings: EmbeddingTable) -> Self {
        Self { embeddings }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(artifacts::load_embeddings(path)?))
    }

    pub fn embeddings(&self) -> &EmbeddingTable {
        &self.embeddings
    }

    pub fn get_embedding(&self, user_id: &str) -> Option<ArrayView1<'_, f32>> {
        self.embeddings.get(user_id)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.embeddings.contains(user_id)
    }

    pub fn get_similar(
        &self,
        user_id: &str,
        k: usize,
        exclude: Option<&HashSet<String>>,
    ) -> Result<Vec<ScoredUser>> {
        self.recommend(user_id, k, exclude, None)
    }

    pub fn recommend(
        &self,
        user_id: &str,
        k: usize,
        exclude: Option<&HashSet<String>>,
        min_similarity: Option<f32>,
    ) -> Result<Vec<ScoredUser>> {
        let Some(query) = self.embeddings.get(user_id) else {
            return Ok(Vec::new());
        };

        ranking::top_k(
            query,
            self.embeddings.vectors(),
            self.embeddings.ids(),
            &RankQuery {
                query_id: user_id,
                exclude,
                min_similarity,
                k,
            },
        )
    }

    pub fn batch_recommend(
        &self,
        user_ids: &[String],
        k: usize,
        exclude_by_user: Option<&HashMap<String, HashSet<String>>>,
    ) -> Result<HashMap<String, Vec<ScoredUser>>> {
        user_ids
            .iter()
            .map(|user_id| {
                let exclude = exclude_by_user.and_then(|m| m.get(user_id));
                Ok((user_id.clone(), self.recommend(user_id, k, exclude, None)?))
            })
            .collect()
    }

    /// Pairwise similarity plus where `candidate` lands in `target`'s
    /// top-50 neighbours.
    pub fn explain(&self, target: &str, candidate: &str) -> Result<Explanation> {
        let target_vec = self
            .embeddings
            .get(target)
            .ok_or_else(|| RecommendError::NotFound(format!("no embedding for '{}'", target)))?;
        let candidate_vec = self
            .embeddings
            .get(candidate)
            .ok_or_else(|| RecommendError::NotFound(format!("no embedding for '{}'", candidate)))?;

        let similarity = cosine_similarity(target_vec, candidate_vec);
        let rank = self
            .get_similar(target, EXPLAIN_TOP_N, None)?
            .iter()
            .position(|r| r.user_id == candidate)
            .map(|pos| pos + 1);

        let explanation = match rank {
            Some(rank) => format!(
                "{} is #{} among the users most similar to {} in the follow graph (similarity {:.3})",
                candidate, rank, target, similarity
            ),
            None => format!(
                "{} is outside the top {} users most similar to {} (similarity {:.3})",
                candidate, EXPLAIN_TOP_N, target, similarity
            ),
        };

        Ok(Explanation {
            target_user: target.to_string(),
            recommended_user: candidate.to_string(),
            similarity_score: similarity,
            rank_in_top_similar: rank,
            explanation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> GraphRecommender {
        GraphRecommender::new(
            EmbeddingTable::from_entries(vec![
                ("a".to_string(), vec![1.0, 0.0]),
                ("b".to_string(), vec![0.0, 1.0]),
                ("c".to_string(), vec![0.9, 0.1]),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_recommend_picks_nearest_embedding() {
        let recs = abc().recommend("a", 1, None, None).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].user_id, "c");
        assert!((recs[0].score - 0.9939).abs() < 1e-3);
    }

    #[test]
    fn test_full_ranking_is_sorted_without_self() {
        let recs = abc().get_similar("a", 10, None).unwrap();
        let ids: Vec<_> = recs.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert_eq!(recs[1].score, 0.0);
    }

    #[test]
    fn test_closed_world() {
        let recommender = abc();
        assert!(recommender.recommend("z", 5, None, None).unwrap().is_empty());
        assert!(!recommender.contains("z"));
        assert!(recommender.get_embedding("z").is_none());
    }

    #[test]
    fn test_explain_reports_rank() {
        let recommender = abc();
        let explanation = recommender.explain("a", "b").unwrap();
        assert_eq!(explanation.rank_in_top_similar, Some(2));
        assert_eq!(explanation.similarity_score, 0.0);

        assert!(matches!(
            recommender.explain("a", "z"),
            Err(RecommendError::NotFound(_))
        ));
        assert!(matches!(
            recommender.explain("z", "a"),
            Err(RecommendError::NotFound(_))
        ));
    }

    #[test]
    fn test_batch_recommend() {
        let results = abc()
            .batch_recommend(&["a".to_string(), "z".to_string()], 1, None)
            .unwrap();
        assert_eq!(results["a"][0].user_id, "c");
        assert!(results["z"].is_empty());
    }
}
