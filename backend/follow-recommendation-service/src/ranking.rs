//! Top-k cosine ranking shared by the content and graph recommenders.

use crate::error::{RecommendError, Result};
use crate::models::ScoredUser;
use ndarray::{ArrayView1, ArrayView2};
use std::collections::HashSet;

/// Cosine similarity in `[-1, 1]`; zero vectors score 0.
///
/// Accumulates in f64 so that a non-zero vector against itself is exactly 1.0.
pub fn cosine_similarity(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b).sqrt()).clamp(-1.0, 1.0) as f32
}

/// Parameters for a single ranking call.
#[derive(Debug, Clone, Default)]
pub struct RankQuery<'a> {
    /// Id of the querying user; never returned.
    pub query_id: &'a str,
    pub exclude: Option<&'a HashSet<String>>,
    pub min_similarity: Option<f32>,
    pub k: usize,
}

/// Scores every candidate row against `query` and returns the best `k`.
///
/// Ties keep the order of `ids`.
pub fn top_k(
    query: ArrayView1<f32>,
    candidates: ArrayView2<f32>,
    ids: &[String],
    params: &RankQuery<'_>,
) -> Result<Vec<ScoredUser>> {
    if candidates.nrows() != ids.len() {
        return Err(RecommendError::InvalidInput(format!(
            "candidate matrix has {} rows but {} ids",
            candidates.nrows(),
            ids.len()
        )));
    }

    if candidates.nrows() > 0 && candidates.ncols() != query.len() {
        return Err(RecommendError::InvalidInput(format!(
            "query has {} dimensions, candidates have {}",
            query.len(),
            candidates.ncols()
        )));
    }

    if params.k == 0 {
        return Ok(Vec::new());
    }

    let mut scored: Vec<(usize, f32)> = candidates
        .rows()
        .into_iter()
        .enumerate()
        .map(|(idx, row)| (idx, cosine_similarity(query, row)))
        .collect();

    // sort_by is stable, so equal scores stay in id-list order
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let results = scored
        .into_iter()
        .filter(|(idx, _)| ids[*idx] != params.query_id)
        .filter(|(idx, _)| params.exclude.map_or(true, |ex| !ex.contains(&ids[*idx])))
        .filter(|(_, score)| params.min_similarity.map_or(true, |min| *score >= min))
        .take(params.k)
        .map(|(idx, score)| ScoredUser::new(ids[idx].clone(), score))
        .collect();

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_self_similarity_is_exactly_one() {
        let vectors = [
            arr1(&[1.0f32, 0.0]),
            arr1(&[0.3, -0.7, 0.11, 5.5]),
            arr1(&[1e-3, 2e-3, 3e-3]),
            arr1(&[0.9, 0.1]),
        ];
        for v in &vectors {
            assert_eq!(cosine_similarity(v.view(), v.view()), 1.0);
        }
    }

    #[test]
    fn test_orthogonal_opposite_and_zero() {
        let a = arr1(&[1.0f32, 0.0]);
        let b = arr1(&[0.0f32, 1.0]);
        let c = arr1(&[-2.0f32, 0.0]);
        let zero = arr1(&[0.0f32, 0.0]);

        assert_eq!(cosine_similarity(a.view(), b.view()), 0.0);
        assert_eq!(cosine_similarity(a.view(), c.view()), -1.0);
        assert_eq!(cosine_similarity(a.view(), zero.view()), 0.0);
    }

    #[test]
    fn test_top_k_excludes_self_and_sorts() {
        let matrix = arr2(&[[1.0f32, 0.0], [0.0, 1.0], [0.9, 0.1]]);
        let names = ids(&["a", "b", "c"]);
        let query = matrix.row(0);

        let result = top_k(
            query,
            matrix.view(),
            &names,
            &RankQuery {
                query_id: "a",
                k: 5,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].user_id, "c");
        assert!((result[0].score - 0.9939).abs() < 1e-3);
        assert_eq!(result[1].user_id, "b");
        assert!(result.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_ties_break_by_list_position() {
        let matrix = arr2(&[[1.0f32, 1.0], [2.0, 2.0], [3.0, 3.0], [1.0, 0.0]]);
        let names = ids(&["q", "x", "y", "z"]);

        let result = top_k(
            arr1(&[1.0f32, 1.0]).view(),
            matrix.view(),
            &names,
            &RankQuery {
                query_id: "q",
                k: 3,
                ..Default::default()
            },
        )
        .unwrap();

        let order: Vec<&str> = result.iter().map(|s| s.user_id.as_str()).collect();
        assert_eq!(order, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_exclusion_threshold_and_k() {
        let matrix = arr2(&[[1.0f32, 0.0], [0.9, 0.1], [0.5, 0.5], [0.0, 1.0]]);
        let names = ids(&["a", "b", "c", "d"]);
        let exclude: HashSet<String> = ["b".to_string()].into_iter().collect();

        let result = top_k(
            matrix.row(0),
            matrix.view(),
            &names,
            &RankQuery {
                query_id: "a",
                exclude: Some(&exclude),
                min_similarity: Some(0.5),
                k: 10,
            },
        )
        .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].user_id, "c");

        let limited = top_k(
            matrix.row(0),
            matrix.view(),
            &names,
            &RankQuery {
                query_id: "a",
                k: 2,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let matrix = arr2(&[[1.0f32, 0.0], [0.0, 1.0]]);
        let result = top_k(
            arr1(&[1.0f32, 0.0, 0.0]).view(),
            matrix.view(),
            &ids(&["a", "b"]),
            &RankQuery {
                query_id: "a",
                k: 1,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(RecommendError::InvalidInput(_))));

        let result = top_k(
            arr1(&[1.0f32, 0.0]).view(),
            matrix.view(),
            &ids(&["a"]),
            &RankQuery {
                query_id: "a",
                k: 1,
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }
}
