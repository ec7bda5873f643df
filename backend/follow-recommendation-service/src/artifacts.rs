//! Persisted model artifacts.
//!
//! Artifacts are JSON documents loaded wholesale. Writers always go through
//! [`write_atomic`], so a reader sees either the previous file or the complete
//! new one.

use crate::embedding::{EmbeddingTable, TrainerConfig};
use crate::error::{RecommendError, Result};
use crate::walks::{CorpusStats, WalkConfig, WalkCorpus};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

/// Graph-model artifact: one generation of walks + embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingArtifact {
    pub generated_at: DateTime<Utc>,
    pub walk_config: Option<WalkConfig>,
    pub trainer_config: Option<TrainerConfig>,
    pub corpus_stats: Option<CorpusStats>,
    pub dimension: usize,
    pub embeddings: Vec<EmbeddingEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingEntry {
    pub user_id: String,
    pub vector: Vec<f32>,
}

impl EmbeddingArtifact {
    pub fn from_table(table: &EmbeddingTable) -> Self {
        Self {
            generated_at: Utc::now(),
            walk_config: None,
            trainer_config: None,
            corpus_stats: None,
            dimension: table.dimension(),
            embeddings: table
                .entries()
                .map(|(id, vector)| EmbeddingEntry {
                    user_id: id.to_string(),
                    vector: vector.to_vec(),
                })
                .collect(),
        }
    }

    pub fn into_table(self) -> Result<EmbeddingTable> {
        let dimension = self.dimension;
        if let Some(bad) = self.embeddings.iter().find(|e| e.vector.len() != dimension) {
            return Err(RecommendError::Artifact(format!(
                "embedding for '{}' has {} dimensions, artifact declares {}",
                bad.user_id,
                bad.vector.len(),
                dimension
            )));
        }

        EmbeddingTable::from_entries(
            self.embeddings
                .into_iter()
                .map(|e| (e.user_id, e.vector))
                .collect(),
        )
        .map_err(|e| RecommendError::Artifact(e.to_string()))
    }
}

/// Content-model artifact: feature matrix plus the ids and names that index it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureModelArtifact {
    pub generated_at: DateTime<Utc>,
    pub user_ids: Vec<String>,
    pub feature_names: Vec<String>,
    pub n_users: usize,
    pub n_features: usize,
    /// Row-major, `n_users * n_features` values.
    pub matrix: Vec<f32>,
}

impl FeatureModelArtifact {
    pub fn new(user_ids: Vec<String>, feature_names: Vec<String>, matrix: &Array2<f32>) -> Self {
        Self {
            generated_at: Utc::now(),
            n_users: user_ids.len(),
            n_features: feature_names.len(),
            user_ids,
            feature_names,
            matrix: matrix.iter().copied().collect(),
        }
    }

    /// Matrix in `(n_users, n_features)` shape, validated against the id and
    /// name lists.
    pub fn matrix(&self) -> Result<Array2<f32>> {
        if self.n_users != self.user_ids.len() || self.n_features != self.feature_names.len() {
            return Err(RecommendError::Artifact(format!(
                "feature model header ({} x {}) disagrees with {} ids and {} names",
                self.n_users,
                self.n_features,
                self.user_ids.len(),
                self.feature_names.len()
            )));
        }

        Array2::from_shape_vec((self.n_users, self.n_features), self.matrix.clone())
            .map_err(|e| RecommendError::Artifact(format!("feature matrix: {}", e)))
    }
}

/// Serializes `value` next to `path` and renames it into place.
pub fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_atomic_with(path, |writer| {
        serde_json::to_writer(&mut *writer, value)?;
        Ok(())
    })
}

fn write_atomic_with<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| RecommendError::Io(e.error))?;

    info!(path = %path.display(), "Wrote artifact");
    Ok(())
}

pub fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RecommendError::ArtifactMissing(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        RecommendError::Artifact(format!("{}: {}", path.display(), e))
    })
}

pub fn save_embeddings(path: &Path, artifact: &EmbeddingArtifact) -> Result<()> {
    write_atomic(path, artifact)
}

pub fn load_embeddings(path: &Path) -> Result<EmbeddingTable> {
    let artifact: EmbeddingArtifact = read_artifact(path)?;
    let table = artifact.into_table()?;
    info!(
        path = %path.display(),
        users = table.len(),
        dimension = table.dimension(),
        "Loaded embedding artifact"
    );
    Ok(table)
}

pub fn save_feature_model(path: &Path, artifact: &FeatureModelArtifact) -> Result<()> {
    write_atomic(path, artifact)
}

pub fn load_feature_model(path: &Path) -> Result<FeatureModelArtifact> {
    read_artifact(path)
}

/// Writes the corpus as JSON lines, one walk per line.
pub fn save_corpus(path: &Path, corpus: &WalkCorpus) -> Result<()> {
    write_atomic_with(path, |writer| {
        for walk in corpus.walks() {
            serde_json::to_writer(&mut *writer, walk)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    })
}

pub fn load_corpus(path: &Path) -> Result<WalkCorpus> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RecommendError::ArtifactMissing(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut walks = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let walk: Vec<String> = serde_json::from_str(&line)?;
        walks.push(walk);
    }
    Ok(WalkCorpus::new(walks))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_artifact_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        match load_embeddings(&path) {
            Err(RecommendError::ArtifactMissing(p)) => assert_eq!(p, path),
            other => panic!("expected ArtifactMissing, got {:?}", other),
        }
        assert!(matches!(
            load_corpus(&path),
            Err(RecommendError::ArtifactMissing(_))
        ));
    }

    #[test]
    fn test_atomic_write_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cf_embeddings.json");

        let first = EmbeddingTable::from_entries(vec![
            ("a".to_string(), vec![1.0, 0.0]),
            ("b".to_string(), vec![0.0, 1.0]),
        ])
        .unwrap();
        save_embeddings(&path, &EmbeddingArtifact::from_table(&first)).unwrap();

        let second =
            EmbeddingTable::from_entries(vec![("c".to_string(), vec![0.5, 0.5, 0.5])]).unwrap();
        save_embeddings(&path, &EmbeddingArtifact::from_table(&second)).unwrap();

        let loaded = load_embeddings(&path).unwrap();
        assert_eq!(loaded.ids(), &["c".to_string()]);
        assert_eq!(loaded.dimension(), 3);

        // no temp files left behind
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_corrupt_artifact_is_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cb_model.json");
        fs::write(&path, b"{\"user_ids\": [").unwrap();

        assert!(matches!(
            load_feature_model(&path),
            Err(RecommendError::Artifact(_))
        ));
    }

    #[test]
    fn test_inconsistent_dimension_is_rejected() {
        let artifact = EmbeddingArtifact {
            generated_at: Utc::now(),
            walk_config: None,
            trainer_config: None,
            corpus_stats: None,
            dimension: 2,
            embeddings: vec![EmbeddingEntry {
                user_id: "a".to_string(),
                vector: vec![1.0, 2.0, 3.0],
            }],
        };
        assert!(matches!(
            artifact.into_table(),
            Err(RecommendError::Artifact(_))
        ));
    }

    #[test]
    fn test_feature_model_header_must_match() {
        let matrix = Array2::from_shape_vec((2, 2), vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        let mut artifact = FeatureModelArtifact::new(
            vec!["a".to_string(), "b".to_string()],
            vec!["x".to_string(), "y".to_string()],
            &matrix,
        );
        assert_eq!(artifact.matrix().unwrap(), matrix);

        artifact.n_features = 3;
        assert!(artifact.matrix().is_err());
    }

    #[test]
    fn test_corpus_lines_keep_ids_with_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("walks.jsonl");
        let corpus = WalkCorpus::new(vec![
            vec!["mary ann".to_string(), "bob".to_string()],
            vec!["carol".to_string()],
        ]);

        save_corpus(&path, &corpus).unwrap();
        assert_eq!(load_corpus(&path).unwrap(), corpus);
    }
}
