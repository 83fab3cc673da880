//! Classifier families used by the training pipeline.
//!
//! Every family fits on the same in-memory dataset shape and exposes the
//! same capability set behind [`Classifier`], so the trainer and the
//! evaluator never care which family they hold. Fitted parameters persist
//! through [`ModelArtifact`], tagged by family.

pub mod forest;
pub mod linear;
pub mod metrics;

use serde::{Deserialize, Serialize};

pub use forest::{ForestModel, ForestOptions, train_forest};
pub use linear::{LinearModel, LinearOptions, train_linear};

/// Model artifact format version.
pub const MODEL_SCHEMA_VERSION: i64 = 1;

/// In-memory training dataset shared by every classifier family.
#[derive(Debug, Clone)]
pub struct TrainDataset {
    /// Number of values per feature row.
    pub feature_len: usize,
    /// Class labels; a row's `y` value indexes into this list.
    pub classes: Vec<String>,
    /// Standardized feature rows.
    pub x: Vec<Vec<f64>>,
    /// Class codes aligned with `x`.
    pub y: Vec<usize>,
}

impl TrainDataset {
    /// Structural checks shared by the family trainers.
    pub(crate) fn check(&self) -> Result<(), String> {
        if self.x.is_empty() {
            return Err("Empty training set".to_string());
        }
        if self.x.len() != self.y.len() {
            return Err("Mismatched X/Y lengths".to_string());
        }
        if self.classes.len() < 2 {
            return Err("Need at least 2 classes".to_string());
        }
        if self.feature_len == 0 {
            return Err("Feature rows must be non-empty".to_string());
        }
        for row in &self.x {
            if row.len() != self.feature_len {
                return Err("Inconsistent feature row length".to_string());
            }
        }
        if let Some(&label) = self.y.iter().find(|&&label| label >= self.classes.len()) {
            return Err(format!("Class code {label} out of range"));
        }
        Ok(())
    }
}

/// How a family measures feature attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionKind {
    /// Total weighted impurity decrease from splits on the feature.
    ImpurityDecrease,
    /// Mean absolute coefficient magnitude across classes.
    CoefficientMagnitude,
}

impl AttributionKind {
    /// Short human name for reports.
    pub fn describe(self) -> &'static str {
        match self {
            AttributionKind::ImpurityDecrease => "impurity decrease",
            AttributionKind::CoefficientMagnitude => "coefficient magnitude",
        }
    }
}

/// Per-feature attribution scores together with their metric kind.
///
/// The kind travels with the scores so reports never present impurity and
/// coefficient magnitudes as if they shared a scale.
#[derive(Debug, Clone)]
pub struct FeatureAttribution {
    pub kind: AttributionKind,
    /// One score per feature column.
    pub scores: Vec<f64>,
}

impl FeatureAttribution {
    /// Pair scores with feature names, descending by absolute magnitude.
    pub fn ranked(&self, feature_names: &[&str]) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = feature_names
            .iter()
            .map(|name| name.to_string())
            .zip(self.scores.iter().copied())
            .collect();
        ranked.sort_by(|a, b| {
            b.1.abs()
                .partial_cmp(&a.1.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }
}

/// Capability set every fitted classifier family offers.
pub trait Classifier {
    /// Class labels in code order.
    fn classes(&self) -> &[String];
    /// Number of values expected per feature row.
    fn feature_len(&self) -> usize;
    /// Class probabilities for a standardized row.
    fn predict_proba(&self, row: &[f64]) -> Vec<f64>;
    /// Most probable class code for a standardized row.
    fn predict_class_index(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba(row))
    }
    /// Per-feature attribution in this family's own metric.
    fn attribution(&self) -> FeatureAttribution;
}

/// Persisted classifier parameters, tagged by family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelArtifact {
    Forest(ForestModel),
    Linear(LinearModel),
}

impl ModelArtifact {
    /// Family tag as persisted in the artifact.
    pub fn family_name(&self) -> &'static str {
        match self {
            ModelArtifact::Forest(_) => "forest",
            ModelArtifact::Linear(_) => "linear",
        }
    }

    /// Validate structural invariants of the wrapped model.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ModelArtifact::Forest(model) => model.validate(),
            ModelArtifact::Linear(model) => model.validate(),
        }
    }
}

impl Classifier for ModelArtifact {
    fn classes(&self) -> &[String] {
        match self {
            ModelArtifact::Forest(model) => model.classes(),
            ModelArtifact::Linear(model) => model.classes(),
        }
    }

    fn feature_len(&self) -> usize {
        match self {
            ModelArtifact::Forest(model) => model.feature_len(),
            ModelArtifact::Linear(model) => model.feature_len(),
        }
    }

    fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        match self {
            ModelArtifact::Forest(model) => model.predict_proba(row),
            ModelArtifact::Linear(model) => model.predict_proba(row),
        }
    }

    fn attribution(&self) -> FeatureAttribution {
        match self {
            ModelArtifact::Forest(model) => model.attribution(),
            ModelArtifact::Linear(model) => model.attribution(),
        }
    }
}

/// Class weights inversely proportional to class frequency,
/// `total / (n_classes * count)`. A class absent from `y` weighs 0.0, which
/// is harmless because no training row can carry it.
pub(crate) fn balanced_class_weights(y: &[usize], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0.0f64; n_classes];
    for &label in y {
        if label < n_classes {
            counts[label] += 1.0;
        }
    }
    let total: f64 = counts.iter().sum();
    counts
        .into_iter()
        .map(|count| {
            if count == 0.0 {
                0.0
            } else {
                total / (n_classes as f64 * count)
            }
        })
        .collect()
}

/// Compute a numerically-stable softmax for a set of logits.
pub fn softmax(raw: &[f64]) -> Vec<f64> {
    if raw.is_empty() {
        return Vec::new();
    }
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut exps = Vec::with_capacity(raw.len());
    let mut sum = 0.0f64;
    for &v in raw {
        let e = (v - max).exp();
        exps.push(e);
        sum += e;
    }
    if sum == 0.0 {
        return vec![1.0 / raw.len() as f64; raw.len()];
    }
    for v in &mut exps {
        *v /= sum;
    }
    exps
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best_idx = 0usize;
    let mut best_val = f64::NEG_INFINITY;
    for (idx, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best_idx = idx;
        }
    }
    best_idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_weights_follow_inverse_frequency() {
        let y = vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        let weights = balanced_class_weights(&y, 2);
        assert!((weights[0] - 10.0 / 18.0).abs() < 1e-12);
        assert!((weights[1] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn ranked_attribution_sorts_by_magnitude() {
        let attribution = FeatureAttribution {
            kind: AttributionKind::CoefficientMagnitude,
            scores: vec![0.1, -0.9, 0.4],
        };
        let ranked = attribution.ranked(&["a", "b", "c"]);
        assert_eq!(ranked[0].0, "b");
        assert_eq!(ranked[1].0, "c");
        assert_eq!(ranked[2].0, "a");
    }

    #[test]
    fn dataset_check_rejects_bad_shapes() {
        let dataset = TrainDataset {
            feature_len: 2,
            classes: vec!["a".into(), "b".into()],
            x: vec![vec![0.0, 1.0], vec![2.0]],
            y: vec![0, 1],
        };
        assert!(dataset.check().is_err());
    }
}
