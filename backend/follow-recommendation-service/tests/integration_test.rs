use follow_recommendation_service::{
    pipeline, Config, GraphSource, InMemoryGraph, RecommendError, RecommendationService,
    UserProfile,
};
use std::path::Path;
use std::sync::Arc;

fn athlete(id: &str, age: i64, sport: &str, level: &str, lat: f64, lng: f64) -> UserProfile {
    UserProfile {
        user_id: id.to_string(),
        age: Some(age),
        favorite_sport: Some(sport.to_string()),
        competitive_level: Some(level.to_string()),
        latitude: Some(lat),
        longitude: Some(lng),
    }
}

/// Two follow cliques: tennis players in New York, golfers in Sydney.
fn club_graph() -> InMemoryGraph {
    let tennis = ["t1", "t2", "t3", "t4"];
    let golf = ["g1", "g2", "g3", "g4"];

    let mut graph = InMemoryGraph::new();
    for (i, id) in tennis.iter().enumerate() {
        graph.insert_profile(athlete(id, 24 + i as i64, "Tennis", "Advanced", 40.7, -74.0));
    }
    for (i, id) in golf.iter().enumerate() {
        graph.insert_profile(athlete(id, 60 + i as i64, "Golf", "Beginner", -33.9, 151.2));
    }
    for group in [tennis, golf] {
        for a in group {
            for b in group {
                if a != b {
                    graph.insert_follow(a, b);
                }
            }
        }
    }
    graph
}

fn test_config(dir: &Path) -> Config {
    Config {
        walk_length: 20,
        walks_per_node: 20,
        vector_size: 16,
        window: 4,
        epochs: 5,
        walk_strategy: "native".to_string(),
        embeddings_path: dir.join("embeddings").join("cf_embeddings.json"),
        walks_path: dir.join("walks").join("random_walks.jsonl"),
        cb_model_path: dir.join("models").join("cb_model.json"),
        ..Config::default()
    }
}

#[tokio::test]
async fn test_pipeline_then_weighted_recommendations() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let graph = club_graph();

    pipeline::run_cf_pipeline(&graph, &config).await.unwrap();
    pipeline::run_cb_pipeline(&graph, &config).await.unwrap();

    let service = RecommendationService::load(config, Arc::new(graph))
        .await
        .unwrap();

    let recs = service.recommend("t1", Some(3)).await.unwrap();
    assert_eq!(recs.len(), 3);
    assert!(recs.iter().all(|r| r.user_id != "t1"));
    assert!(recs.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(recs.iter().all(|r| r.user_id.starts_with('t')));

    // default_k applies when k is omitted
    let all = service.recommend("g1", None).await.unwrap();
    assert_eq!(all.len(), 7);
    assert!(all[0].user_id.starts_with('g'));
}

#[tokio::test]
async fn test_switch_policy_serves_cold_start_users_from_profiles() {
    let dir = tempfile::tempdir().unwrap();
    let trained = club_graph();
    let config = Config {
        ensemble_policy: "switch".to_string(),
        follower_threshold: 3,
        ..test_config(dir.path())
    };

    pipeline::run_cf_pipeline(&trained, &config).await.unwrap();
    pipeline::run_cb_pipeline(&trained, &config).await.unwrap();

    // signs up after the models were built
    let live = trained
        .clone()
        .with_profile(athlete("newbie", 23, "tennis", "advanced", 40.8, -73.9));
    let service = RecommendationService::load(config, Arc::new(live))
        .await
        .unwrap();

    // three followers: warm, graph model
    let warm = service.recommend("t1", Some(3)).await.unwrap();
    assert!(warm.iter().all(|r| r.cf_score.is_some()));

    // no followers: cold, content model with on-the-fly features
    let cold = service.recommend("newbie", Some(3)).await.unwrap();
    assert_eq!(cold.len(), 3);
    assert!(cold.iter().all(|r| r.cb_score.is_some()));
    assert!(cold.iter().all(|r| r.user_id.starts_with('t')));

    // nobody at all
    assert!(service.recommend("ghost", Some(3)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_artifacts_disable_only_their_side() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let graph = club_graph();

    // only the content model exists
    pipeline::run_cb_pipeline(&graph, &config).await.unwrap();
    let service = RecommendationService::load(config.clone(), Arc::new(graph.clone()))
        .await
        .unwrap();

    let recs = service.recommend("t2", Some(2)).await.unwrap();
    assert_eq!(recs.len(), 2);
    assert!(recs.iter().all(|r| r.cf_score.is_none()));
    assert!(matches!(
        service.explain("t1", "t2").await,
        Err(RecommendError::ModelUnavailable(_))
    ));

    // graph model arrives, reload picks it up
    pipeline::run_cf_pipeline(&graph, &config).await.unwrap();
    service.reload().await.unwrap();
    let explanation = service.explain("t1", "t2").await.unwrap();
    assert!(explanation.rank_in_top_similar.is_some());
}

#[tokio::test]
async fn test_walks_follow_real_edges() {
    let graph = club_graph();
    let config = Config::default();
    let corpus = pipeline::generate_walks(
        &graph,
        &config.walk_config(),
        config.walk_strategy().unwrap(),
    )
    .await
    .unwrap();

    let edges = graph.follow_edges().await.unwrap();
    assert_eq!(corpus.len(), 8 * config.walks_per_node);
    for walk in corpus.walks() {
        assert!(!walk.is_empty() && walk.len() <= config.walk_length);
        for pair in walk.windows(2) {
            assert!(edges
                .iter()
                .any(|e| e.follower == pair[0] && e.followee == pair[1]));
        }
    }
}
