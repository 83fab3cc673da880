//! Evaluation metrics for classification models.

#[derive(Debug, Clone)]
/// Confusion matrix for a `K`-class classifier.
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    /// Create an empty `KxK` confusion matrix.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }
}

#[derive(Debug, Clone)]
/// Precision/recall/F1 statistics for a single class.
pub struct PerClassStats {
    /// `TP / (TP + FP)`.
    pub precision: f64,
    /// `TP / (TP + FN)`.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// Total number of true examples for the class.
    pub support: u32,
}

/// Compute per-class precision, recall and F1 from a confusion matrix.
pub fn precision_recall_by_class(cm: &ConfusionMatrix) -> Vec<PerClassStats> {
    let k = cm.n_classes;
    let mut stats = Vec::with_capacity(k);
    for class_idx in 0..k {
        let tp = cm.get(class_idx, class_idx) as f64;
        let mut fp = 0f64;
        let mut fn_ = 0f64;
        let mut support = 0u32;
        for j in 0..k {
            let v = cm.get(class_idx, j);
            support = support.saturating_add(v);
            if j != class_idx {
                fn_ += v as f64;
            }
        }
        for i in 0..k {
            if i != class_idx {
                fp += cm.get(i, class_idx) as f64;
            }
        }
        let precision = if tp + fp == 0.0 { 0.0 } else { tp / (tp + fp) };
        let recall = if tp + fn_ == 0.0 { 0.0 } else { tp / (tp + fn_) };
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        stats.push(PerClassStats {
            precision,
            recall,
            f1,
            support,
        });
    }
    stats
}

/// Compute overall accuracy from a confusion matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f64 {
    let mut correct = 0u64;
    let mut total = 0u64;
    for truth in 0..cm.n_classes {
        for predicted in 0..cm.n_classes {
            let v = cm.get(truth, predicted) as u64;
            total += v;
            if truth == predicted {
                correct += v;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        (correct as f64) / (total as f64)
    }
}

/// Support-weighted mean of per-class F1 scores.
pub fn weighted_f1(stats: &[PerClassStats]) -> f64 {
    let total: u64 = stats.iter().map(|s| s.support as u64).sum();
    if total == 0 {
        return 0.0;
    }
    stats
        .iter()
        .map(|s| s.f1 * (s.support as f64))
        .sum::<f64>()
        / (total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_matrix() -> ConfusionMatrix {
        // truth 0: 8 correct, 2 predicted as 1
        // truth 1: 1 predicted as 0, 9 correct
        let mut cm = ConfusionMatrix::new(2);
        for _ in 0..8 {
            cm.add(0, 0);
        }
        for _ in 0..2 {
            cm.add(0, 1);
        }
        cm.add(1, 0);
        for _ in 0..9 {
            cm.add(1, 1);
        }
        cm
    }

    #[test]
    fn accuracy_counts_diagonal() {
        let cm = sample_matrix();
        assert!((accuracy(&cm) - 17.0 / 20.0).abs() < 1e-12);
    }

    #[test]
    fn per_class_stats_match_hand_computation() {
        let cm = sample_matrix();
        let stats = precision_recall_by_class(&cm);
        assert_eq!(stats.len(), 2);
        assert!((stats[0].precision - 8.0 / 9.0).abs() < 1e-12);
        assert!((stats[0].recall - 0.8).abs() < 1e-12);
        assert_eq!(stats[0].support, 10);
        assert!((stats[1].precision - 9.0 / 11.0).abs() < 1e-12);
        assert!((stats[1].recall - 0.9).abs() < 1e-12);
        let expected_f1 = 2.0 * (8.0 / 9.0) * 0.8 / (8.0 / 9.0 + 0.8);
        assert!((stats[0].f1 - expected_f1).abs() < 1e-12);
    }

    #[test]
    fn weighted_f1_weights_by_support() {
        let stats = vec![
            PerClassStats {
                precision: 1.0,
                recall: 1.0,
                f1: 1.0,
                support: 30,
            },
            PerClassStats {
                precision: 0.0,
                recall: 0.0,
                f1: 0.0,
                support: 10,
            },
        ];
        assert!((weighted_f1(&stats) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_add_is_ignored() {
        let mut cm = ConfusionMatrix::new(2);
        cm.add(5, 0);
        cm.add(0, 5);
        assert!(cm.counts.iter().all(|&c| c == 0));
    }
}
