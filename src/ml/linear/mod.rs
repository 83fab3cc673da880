//! Multinomial logistic regression, the alternate classifier family.

use serde::{Deserialize, Serialize};

use crate::ml::{
    AttributionKind, Classifier, FeatureAttribution, MODEL_SCHEMA_VERSION, argmax, softmax,
};

mod train;
pub use train::{LinearOptions, train_linear};

/// Versioned softmax-regression model over standardized feature rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub schema_version: i64,
    /// Number of values expected per feature row.
    pub feature_len: usize,
    /// Class labels in code order.
    pub classes: Vec<String>,
    /// Row-major `classes x feature_len` coefficients.
    pub weights: Vec<f64>,
    pub bias: Vec<f64>,
}

impl LinearModel {
    /// Validate the model dimensions.
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version != MODEL_SCHEMA_VERSION {
            return Err(format!(
                "Unsupported model schema version {} (expected {})",
                self.schema_version, MODEL_SCHEMA_VERSION
            ));
        }
        let classes = self.classes.len();
        if classes < 2 {
            return Err("Model must have at least 2 classes".to_string());
        }
        if self.feature_len == 0 {
            return Err("Model must expect at least one feature".to_string());
        }
        if self.weights.len() != classes * self.feature_len {
            return Err("weights length mismatch".to_string());
        }
        if self.bias.len() != classes {
            return Err("bias length mismatch".to_string());
        }
        if !self.weights.iter().chain(self.bias.iter()).all(|v| v.is_finite()) {
            return Err("weights must be finite".to_string());
        }
        Ok(())
    }

    /// Compute class probabilities for a single standardized row.
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        if row.len() != self.feature_len {
            return Vec::new();
        }
        let classes = self.classes.len();
        let mut logits = vec![0.0f64; classes];
        for (c, logit) in logits.iter_mut().enumerate() {
            let base = c * self.feature_len;
            let mut sum = self.bias[c];
            for (i, &value) in row.iter().enumerate() {
                sum += self.weights[base + i] * value;
            }
            *logit = sum;
        }
        softmax(&logits)
    }

    /// Return the argmax class index for the given row.
    pub fn predict_class_index(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba(row))
    }
}

impl Classifier for LinearModel {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn feature_len(&self) -> usize {
        self.feature_len
    }

    fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        LinearModel::predict_proba(self, row)
    }

    fn attribution(&self) -> FeatureAttribution {
        let classes = self.classes.len().max(1);
        let mut scores = vec![0.0f64; self.feature_len];
        for c in 0..self.classes.len() {
            let base = c * self.feature_len;
            for (i, score) in scores.iter_mut().enumerate() {
                *score += self.weights[base + i].abs();
            }
        }
        for score in &mut scores {
            *score /= classes as f64;
        }
        FeatureAttribution {
            kind: AttributionKind::CoefficientMagnitude,
            scores,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_model() -> LinearModel {
        LinearModel {
            schema_version: MODEL_SCHEMA_VERSION,
            feature_len: 2,
            classes: vec!["low".to_string(), "high".to_string()],
            weights: vec![-1.0, 0.0, 1.0, 0.5],
            bias: vec![0.0, 0.0],
        }
    }

    #[test]
    fn stub_validates_and_predicts_a_distribution() {
        let model = stub_model();
        model.validate().unwrap();
        let probs = model.predict_proba(&[1.0, 1.0]);
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert_eq!(model.predict_class_index(&[1.0, 1.0]), 1);
        assert_eq!(model.predict_class_index(&[-1.0, 0.0]), 0);
    }

    #[test]
    fn validate_rejects_weight_length_mismatch() {
        let mut model = stub_model();
        model.weights.pop();
        assert!(model.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_finite_weights() {
        let mut model = stub_model();
        model.weights[0] = f64::NAN;
        assert!(model.validate().is_err());
    }

    #[test]
    fn attribution_averages_absolute_coefficients() {
        let model = stub_model();
        let attribution = model.attribution();
        assert_eq!(attribution.kind, AttributionKind::CoefficientMagnitude);
        assert!((attribution.scores[0] - 1.0).abs() < 1e-12);
        assert!((attribution.scores[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn mismatched_row_length_yields_no_probabilities() {
        let model = stub_model();
        assert!(model.predict_proba(&[1.0]).is_empty());
    }
}
