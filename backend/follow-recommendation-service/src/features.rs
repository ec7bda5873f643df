//! Explicit profile features for the content-based model.
//!
//! Layout: `[age_norm, sport_one_hot(N), competitive_level_norm, coordinates]`,
//! where `coordinates` is the normalised latitude.

use crate::error::{RecommendError, Result};
use crate::models::UserProfile;
use ndarray::{Array1, Array2, ArrayView1};

/// Closed sport vocabulary, one one-hot slot each.
pub const SPORTS: [&str; 21] = [
    "Soccer",
    "Basketball",
    "Tennis",
    "Baseball",
    "Volleyball",
    "American Football",
    "Golf",
    "Swimming",
    "Running",
    "Cycling",
    "Hockey",
    "Cricket",
    "Rugby",
    "Badminton",
    "Boxing",
    "Martial Arts",
    "Skating",
    "Skiing",
    "Surfing",
    "Weightlifting",
    "Yoga",
];

/// Ranked tiers, lowest first.
pub const COMPETITIVE_LEVELS: [&str; 4] = ["Beginner", "Intermediate", "Advanced", "Competitive"];

pub const MIN_AGE: i64 = 13;
pub const MAX_AGE: i64 = 100;

/// Value used for any attribute that is missing or unrecognised.
const NEUTRAL: f32 = 0.5;

/// Length of every feature vector.
pub const FEATURE_LEN: usize = SPORTS.len() + 3;

/// Stateless profile featurizer.
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    feature_names: Vec<String>,
}

impl Default for FeatureEngineer {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureEngineer {
    pub fn new() -> Self {
        let mut feature_names = Vec::with_capacity(FEATURE_LEN);
        feature_names.push("age_normalized".to_string());
        feature_names.extend(
            SPORTS
                .iter()
                .map(|sport| format!("sport_{}", sport.to_lowercase().replace(' ', "_"))),
        );
        feature_names.push("competitive_level".to_string());
        feature_names.push("coordinates".to_string());

        Self { feature_names }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn dimension(&self) -> usize {
        self.feature_names.len()
    }

    pub fn featurize(&self, profile: &UserProfile) -> Array1<f32> {
        let mut features = Vec::with_capacity(FEATURE_LEN);

        features.push(normalize_age(profile.age));
        features.extend(encode_sport(profile.favorite_sport.as_deref()));
        features.push(encode_competitive_level(profile.competitive_level.as_deref()));
        features.push(encode_coordinates(profile.latitude));

        Array1::from(features)
    }

    /// Stacks one row per profile, preserving input order.
    pub fn featurize_batch(&self, profiles: &[UserProfile]) -> Array2<f32> {
        let mut matrix = Array2::zeros((profiles.len(), self.dimension()));
        for (mut row, profile) in matrix.rows_mut().into_iter().zip(profiles) {
            row.assign(&self.featurize(profile));
        }
        matrix
    }

    /// Maps a feature vector back to named values.
    pub fn describe(&self, vector: ArrayView1<f32>) -> Result<Vec<(String, f32)>> {
        if vector.len() != self.dimension() {
            return Err(RecommendError::InvalidInput(format!(
                "feature vector length {} doesn't match expected {}",
                vector.len(),
                self.dimension()
            )));
        }

        Ok(self
            .feature_names
            .iter()
            .cloned()
            .zip(vector.iter().copied())
            .collect())
    }
}

fn normalize_age(age: Option<i64>) -> f32 {
    match age {
        Some(age) => {
            let clipped = age.clamp(MIN_AGE, MAX_AGE);
            (clipped - MIN_AGE) as f32 / (MAX_AGE - MIN_AGE) as f32
        }
        None => NEUTRAL,
    }
}

fn encode_sport(sport: Option<&str>) -> [f32; SPORTS.len()] {
    let mut encoding = [0.0; SPORTS.len()];
    if let Some(idx) = sport.and_then(sport_index) {
        encoding[idx] = 1.0;
    }
    encoding
}

pub fn sport_index(sport: &str) -> Option<usize> {
    let sport = sport.trim();
    SPORTS
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(sport))
}

fn encode_competitive_level(level: Option<&str>) -> f32 {
    let Some(level) = level.map(str::trim) else {
        return NEUTRAL;
    };

    match COMPETITIVE_LEVELS
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(level))
    {
        Some(ordinal) => ordinal as f32 / (COMPETITIVE_LEVELS.len() - 1) as f32,
        None => NEUTRAL,
    }
}

/// Single geographic slot: `(lat + 90) / 180`. Longitude is not encoded.
// No clipping: out-of-range latitudes map outside [0, 1].
fn encode_coordinates(latitude: Option<f64>) -> f32 {
    latitude.map_or(NEUTRAL, |lat| ((lat + 90.0) / 180.0) as f32)
}
