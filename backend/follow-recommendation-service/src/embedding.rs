//! Co-occurrence embeddings trained on the walk corpus.
//!
//! Word2vec with negative sampling; tokens are user ids. Training is
//! single-threaded and seeded, so a fixed corpus and seed give a fixed table.

use crate::error::{RecommendError, Result};
use crate::walks::WalkCorpus;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Clamp for the sigmoid argument.
const MAX_EXP: f32 = 6.0;
/// Unigram smoothing exponent for negative sampling.
const NOISE_POWER: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Objective {
    /// Predict each context token from the centre token.
    SkipGram,
    /// Predict the centre token from the mean of its context (CBOW).
    ContextAverage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub vector_size: usize,
    pub window: usize,
    pub min_count: usize,
    pub objective: Objective,
    pub epochs: usize,
    pub negative: usize,
    pub learning_rate: f32,
    pub min_learning_rate: f32,
    pub random_seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            vector_size: 128,
            window: 10,
            min_count: 1,
            objective: Objective::SkipGram,
            epochs: 10,
            negative: 5,
            learning_rate: 0.025,
            min_learning_rate: 0.0001,
            random_seed: 42,
        }
    }
}

/// Dense vector per user id. All vectors share one dimensionality.
#[derive(Debug, Clone)]
pub struct EmbeddingTable {
    ids: Vec<String>,
    vectors: Array2<f32>,
    index: HashMap<String, usize>,
}

impl EmbeddingTable {
    pub fn new(ids: Vec<String>, vectors: Array2<f32>) -> Result<Self> {
        if ids.len() != vectors.nrows() {
            return Err(RecommendError::InvalidInput(format!(
                "{} ids for {} embedding rows",
                ids.len(),
                vectors.nrows()
            )));
        }

        let mut index = HashMap::with_capacity(ids.len());
        for (idx, id) in ids.iter().enumerate() {
            if index.insert(id.clone(), idx).is_some() {
                return Err(RecommendError::InvalidInput(format!(
                    "duplicate embedding id '{}'",
                    id
                )));
            }
        }

        Ok(Self { ids, vectors, index })
    }

    /// Builds a table from `(id, vector)` pairs, rejecting ragged vectors.
    pub fn from_entries(entries: Vec<(String, Vec<f32>)>) -> Result<Self> {
        let dimension = entries.first().map_or(0, |(_, v)| v.len());
        let mut ids = Vec::with_capacity(entries.len());
        let mut flat = Vec::with_capacity(entries.len() * dimension);

        for (id, vector) in entries {
            if vector.len() != dimension {
                return Err(RecommendError::InvalidInput(format!(
                    "embedding for '{}' has {} dimensions, expected {}",
                    id,
                    vector.len(),
                    dimension
                )));
            }
            ids.push(id);
            flat.extend(vector);
        }

        let vectors = Array2::from_shape_vec((ids.len(), dimension), flat)?;
        Self::new(ids, vectors)
    }

    pub fn get(&self, id: &str) -> Option<ArrayView1<'_, f32>> {
        self.index.get(id).map(|&idx| self.vectors.row(idx))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn vectors(&self) -> ArrayView2<'_, f32> {
        self.vectors.view()
    }

    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, ArrayView1<'_, f32>)> {
        self.ids
            .iter()
            .map(String::as_str)
            .zip(self.vectors.rows())
    }
}

struct Vocabulary {
    words: Vec<String>,
    counts: Vec<usize>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Ids seen at least `min_count` times, most frequent first.
    fn build(corpus: &WalkCorpus, min_count: usize) -> Self {
        let mut first_seen: Vec<&str> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();

        for token in corpus.walks().iter().flatten() {
            let count = counts.entry(token.as_str()).or_insert(0);
            if *count == 0 {
                first_seen.push(token.as_str());
            }
            *count += 1;
        }

        let mut kept: Vec<(&str, usize)> = first_seen
            .into_iter()
            .map(|word| (word, counts[word]))
            .filter(|(_, count)| *count >= min_count.max(1))
            .collect();
        kept.sort_by(|a, b| b.1.cmp(&a.1));

        let words: Vec<String> = kept.iter().map(|(w, _)| w.to_string()).collect();
        let counts = kept.iter().map(|(_, c)| *c).collect();
        let index = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();

        Self {
            words,
            counts,
            index,
        }
    }

    fn len(&self) -> usize {
        self.words.len()
    }
}

/// Cumulative unigram^0.75 distribution for drawing noise tokens.
struct NoiseDistribution {
    cumulative: Vec<f64>,
}

impl NoiseDistribution {
    fn new(counts: &[usize]) -> Self {
        let mut total = 0.0;
        let cumulative = counts
            .iter()
            .map(|&c| {
                total += (c as f64).powf(NOISE_POWER);
                total
            })
            .collect();
        Self { cumulative }
    }

    fn sample(&self, rng: &mut StdRng) -> usize {
        let total = self.cumulative.last().copied().unwrap_or(0.0);
        let target = rng.gen::<f64>() * total;
        self.cumulative
            .partition_point(|&c| c <= target)
            .min(self.cumulative.len() - 1)
    }
}

pub struct EmbeddingTrainer {
    config: TrainerConfig,
}

impl EmbeddingTrainer {
    pub fn new(config: TrainerConfig) -> Result<Self> {
        if config.vector_size == 0 || config.window == 0 || config.epochs == 0 {
            return Err(RecommendError::InvalidInput(
                "vector_size, window and epochs must be greater than 0".to_string(),
            ));
        }
        if !(config.learning_rate > 0.0 && config.min_learning_rate >= 0.0) {
            return Err(RecommendError::InvalidInput(
                "learning rates must be positive".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn train(&self, corpus: &WalkCorpus) -> Result<EmbeddingTable> {
        let vocab = Vocabulary::build(corpus, self.config.min_count);
        if vocab.len() == 0 {
            return Err(RecommendError::InvalidInput(
                "no tokens survive min_count; nothing to train".to_string(),
            ));
        }

        let sentences: Vec<Vec<usize>> = corpus
            .walks()
            .iter()
            .map(|walk| {
                walk.iter()
                    .filter_map(|token| vocab.index.get(token).copied())
                    .collect::<Vec<_>>()
            })
            .filter(|sentence| !sentence.is_empty())
            .collect();

        let words_per_epoch: usize = sentences.iter().map(Vec::len).sum();
        let total_words = words_per_epoch
            .checked_mul(self.config.epochs)
            .ok_or_else(|| {
                RecommendError::InvalidInput(format!(
                    "{} words x {} epochs overflows the training schedule",
                    words_per_epoch, self.config.epochs
                ))
            })?
            .max(1) as f32;

        info!(
            vocabulary = vocab.len(),
            walks = sentences.len(),
            vector_size = self.config.vector_size,
            window = self.config.window,
            objective = ?self.config.objective,
            epochs = self.config.epochs,
            "Training walk embeddings"
        );

        let mut rng = StdRng::seed_from_u64(self.config.random_seed);
        let dim = self.config.vector_size;

        let mut input = Array2::from_shape_fn((vocab.len(), dim), |_| {
            (rng.gen::<f32>() - 0.5) / dim as f32
        });
        let mut output = Array2::<f32>::zeros((vocab.len(), dim));
        let noise = NoiseDistribution::new(&vocab.counts);

        let mut processed = 0usize;

        let mut hidden = Array1::<f32>::zeros(dim);
        let mut error = Array1::<f32>::zeros(dim);

        for epoch in 0..self.config.epochs {
            for sentence in &sentences {
                for pos in 0..sentence.len() {
                    let progress = processed as f32 / total_words;
                    let alpha = (self.config.learning_rate
                        - (self.config.learning_rate - self.config.min_learning_rate) * progress)
                        .max(self.config.min_learning_rate);
                    processed += 1;

                    let reduced = rng.gen_range(1..=self.config.window);
                    let start = pos.saturating_sub(reduced);
                    let end = (pos + reduced + 1).min(sentence.len());
                    let center = sentence[pos];

                    match self.config.objective {
                        Objective::SkipGram => {
                            for ctx_pos in (start..end).filter(|&p| p != pos) {
                                hidden.assign(&input.row(center));
                                error.fill(0.0);
                                self.train_pair(
                                    &hidden,
                                    &mut error,
                                    sentence[ctx_pos],
                                    &mut output,
                                    &noise,
                                    alpha,
                                    &mut rng,
                                );
                                input.row_mut(center).scaled_add(1.0, &error);
                            }
                        }
                        Objective::ContextAverage => {
                            let context: Vec<usize> = (start..end)
                                .filter(|&p| p != pos)
                                .map(|p| sentence[p])
                                .collect();
                            if context.is_empty() {
                                continue;
                            }

                            hidden.fill(0.0);
                            for &word in &context {
                                hidden.scaled_add(1.0, &input.row(word));
                            }
                            hidden /= context.len() as f32;
                            error.fill(0.0);
                            self.train_pair(
                                &hidden,
                                &mut error,
                                center,
                                &mut output,
                                &noise,
                                alpha,
                                &mut rng,
                            );
                            for &word in &context {
                                input.row_mut(word).scaled_add(1.0, &error);
                            }
                        }
                    }
                }
            }
            debug!(epoch = epoch + 1, processed, "Finished embedding epoch");
        }

        info!(vocabulary = vocab.len(), "Embedding training complete");
        EmbeddingTable::new(vocab.words, input)
    }

    /// One positive update plus `negative` noise updates against `hidden`.
    /// Accumulates the gradient for the input side into `error`.
    #[allow(clippy::too_many_arguments)]
    fn train_pair(
        &self,
        hidden: &Array1<f32>,
        error: &mut Array1<f32>,
        target: usize,
        output: &mut Array2<f32>,
        noise: &NoiseDistribution,
        alpha: f32,
        rng: &mut StdRng,
    ) {
        for d in 0..=self.config.negative {
            let (word, label) = if d == 0 {
                (target, 1.0)
            } else {
                let sampled = noise.sample(rng);
                if sampled == target {
                    continue;
                }
                (sampled, 0.0)
            };

            let score = hidden.dot(&output.row(word)).clamp(-MAX_EXP, MAX_EXP);
            let gradient = (label - sigmoid(score)) * alpha;

            error.scaled_add(gradient, &output.row(word));
            output.row_mut(word).scaled_add(gradient, hidden);
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
