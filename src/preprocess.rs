//! Fitted preprocessing state: per-feature standardization plus the
//! grade/code mapping, shared verbatim by training and inference.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::grade::QualityGrade;
use crate::sensor::{FEATURE_LEN, FEATURE_NAMES, FeatureVector};

/// Preprocessing artifact format version.
pub const PREPROCESSING_SCHEMA_VERSION: i64 = 1;

/// A fitted standard deviation at or below this is treated as constant.
const DEGENERATE_STD: f64 = 1e-12;

/// Immutable transformation state fitted once per training run.
///
/// Scaler parameters and the label mapping travel together: persisting or
/// loading one without the other is exactly the skew that silently corrupts
/// predictions, so they are one value and one artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingState {
    /// Artifact format version.
    pub schema_version: i64,
    /// Feature columns, in the order `means`/`stds` are indexed.
    pub feature_names: Vec<String>,
    /// Per-feature mean over the training split.
    pub means: Vec<f64>,
    /// Per-feature population standard deviation over the training split.
    pub stds: Vec<f64>,
    /// Grade labels observed at fit time, sorted; a grade's code is its
    /// index here.
    pub classes: Vec<String>,
}

impl PreprocessingState {
    /// Fit standardization statistics and the label mapping.
    ///
    /// Statistics are computed over the rows given here only; callers pass
    /// the training split, never the held-out one. Codes are assigned in
    /// sorted-label order so refitting on the same data reproduces the same
    /// mapping.
    pub fn fit(features: &[FeatureVector], grades: &[QualityGrade]) -> Result<Self, String> {
        if features.is_empty() {
            return Err("Empty training set".to_string());
        }
        if features.len() != grades.len() {
            return Err("Mismatched feature/label lengths".to_string());
        }

        let n = features.len() as f64;
        let mut means = Vec::with_capacity(FEATURE_LEN);
        let mut stds = Vec::with_capacity(FEATURE_LEN);
        for i in 0..FEATURE_LEN {
            let mean = features.iter().map(|row| row[i]).sum::<f64>() / n;
            let var = features
                .iter()
                .map(|row| {
                    let d = row[i] - mean;
                    d * d
                })
                .sum::<f64>()
                / n;
            let std = var.sqrt();
            if std <= DEGENERATE_STD {
                warn!(
                    "Feature {} is constant in the training split; it will standardize to 0",
                    FEATURE_NAMES[i]
                );
            }
            means.push(mean);
            stds.push(std);
        }

        let classes: Vec<String> = grades
            .iter()
            .map(|grade| grade.label())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        Ok(Self {
            schema_version: PREPROCESSING_SCHEMA_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
            means,
            stds,
            classes,
        })
    }

    /// Standardize one row with the fitted statistics.
    ///
    /// A constant feature standardizes to 0.0 rather than dividing by zero.
    pub fn apply_row(&self, row: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; FEATURE_LEN];
        for i in 0..FEATURE_LEN {
            out[i] = if self.stds[i] <= DEGENERATE_STD {
                0.0
            } else {
                (row[i] - self.means[i]) / self.stds[i]
            };
        }
        out
    }

    /// Standardize a batch of rows.
    pub fn apply(&self, rows: &[FeatureVector]) -> Vec<FeatureVector> {
        rows.iter().map(|row| self.apply_row(row)).collect()
    }

    /// Integer code for a fitted grade.
    ///
    /// Encoding a grade that was not observed at fit time is a programmer
    /// error: training encodes exactly the labels it fitted on.
    pub fn encode(&self, grade: QualityGrade) -> usize {
        self.try_encode(grade)
            .unwrap_or_else(|| panic!("grade {} was not observed when fitting", grade.label()))
    }

    /// Code for a grade, or `None` when it was not observed at fit time.
    ///
    /// Evaluation uses this for held-out rows, whose grades carry no such
    /// guarantee.
    pub fn try_encode(&self, grade: QualityGrade) -> Option<usize> {
        let label = grade.label();
        self.classes.iter().position(|class| class == label)
    }

    /// Grade for a fitted integer code.
    ///
    /// Codes come from this state's own `classes`; anything else is a
    /// programmer error, not a recoverable condition.
    pub fn decode(&self, code: usize) -> QualityGrade {
        let label = self
            .classes
            .get(code)
            .unwrap_or_else(|| panic!("grade code {code} is outside the fitted mapping"));
        QualityGrade::from_label(label)
            .unwrap_or_else(|| panic!("fitted class {label} is not a known grade"))
    }

    /// Number of feature columns this state was fitted for.
    pub fn feature_len(&self) -> usize {
        self.feature_names.len()
    }

    /// Validate structural invariants of a (possibly just loaded) state.
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version != PREPROCESSING_SCHEMA_VERSION {
            return Err(format!(
                "Unsupported preprocessing schema_version {} (expected {})",
                self.schema_version, PREPROCESSING_SCHEMA_VERSION
            ));
        }
        let len = self.feature_names.len();
        if len == 0 {
            return Err("Preprocessing state has no features".to_string());
        }
        if self.means.len() != len || self.stds.len() != len {
            return Err(format!(
                "Feature statistics length mismatch: {} names, {} means, {} stds",
                len,
                self.means.len(),
                self.stds.len()
            ));
        }
        if self.classes.is_empty() {
            return Err("Preprocessing state has no fitted classes".to_string());
        }
        let mut seen = BTreeSet::new();
        for class in &self.classes {
            if QualityGrade::from_label(class).is_none() {
                return Err(format!("Unknown grade label {class:?} in fitted classes"));
            }
            if !seen.insert(class.as_str()) {
                return Err(format!("Duplicate grade label {class:?} in fitted classes"));
            }
        }
        let mut sorted = self.classes.clone();
        sorted.sort();
        if sorted != self.classes {
            return Err("Fitted classes are not in sorted label order".to_string());
        }
        Ok(())
    }
}
