use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{DecisionTree, ForestModel, TreeNode};
use crate::ml::{MODEL_SCHEMA_VERSION, TrainDataset, balanced_class_weights};

/// Training hyperparameters for the forest family.
#[derive(Debug, Clone)]
pub struct ForestOptions {
    /// Number of bootstrap-resampled trees.
    pub trees: usize,
    /// Maximum depth per tree.
    pub max_depth: usize,
    /// Minimum rows per leaf.
    pub min_leaf: usize,
    /// Candidate features per split; 0 picks the square root of the
    /// feature count.
    pub split_features: usize,
    /// Seed for resampling and feature subsets.
    pub seed: u64,
    /// Weight classes inversely to their training frequency.
    pub balance_classes: bool,
}

impl Default for ForestOptions {
    fn default() -> Self {
        Self {
            trees: 64,
            max_depth: 12,
            min_leaf: 2,
            split_features: 0,
            seed: 42,
            balance_classes: true,
        }
    }
}

/// Train a bagged tree ensemble on standardized rows.
pub fn train_forest(dataset: &TrainDataset, options: &ForestOptions) -> Result<ForestModel, String> {
    dataset.check()?;
    if options.trees == 0 {
        return Err("Need at least one tree".to_string());
    }
    if options.min_leaf == 0 {
        return Err("min_leaf must be at least 1".to_string());
    }
    let n = dataset.x.len();
    let k = dataset.classes.len();
    let class_weights = if options.balance_classes {
        balanced_class_weights(&dataset.y, k)
    } else {
        vec![1.0; k]
    };
    let sample_weights: Vec<f64> = dataset.y.iter().map(|&label| class_weights[label]).collect();
    let split_features = if options.split_features == 0 {
        ((dataset.feature_len as f64).sqrt().ceil() as usize).max(1)
    } else {
        options.split_features.min(dataset.feature_len)
    };

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut importance = vec![0.0f64; dataset.feature_len];
    let mut trees = Vec::with_capacity(options.trees);
    for _ in 0..options.trees {
        let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
        let mut builder = TreeBuilder {
            x: &dataset.x,
            y: &dataset.y,
            weights: &sample_weights,
            feature_len: dataset.feature_len,
            n_classes: k,
            max_depth: options.max_depth,
            min_leaf: options.min_leaf,
            split_features,
            nodes: Vec::new(),
        };
        builder.grow(sample, 0, &mut rng, &mut importance);
        trees.push(DecisionTree {
            nodes: builder.nodes,
        });
    }

    let total: f64 = importance.iter().sum();
    if total > 0.0 {
        for v in &mut importance {
            *v /= total;
        }
    }

    Ok(ForestModel {
        schema_version: MODEL_SCHEMA_VERSION,
        feature_len: dataset.feature_len,
        classes: dataset.classes.clone(),
        trees,
        feature_importance: importance,
    })
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [usize],
    weights: &'a [f64],
    feature_len: usize,
    n_classes: usize,
    max_depth: usize,
    min_leaf: usize,
    split_features: usize,
    nodes: Vec<TreeNode>,
}

impl TreeBuilder<'_> {
    /// Grow the subtree for `indices`, returning its root node index.
    fn grow(
        &mut self,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut StdRng,
        importance: &mut [f64],
    ) -> usize {
        let counts = self.weighted_counts(&indices);
        let node_weight: f64 = counts.iter().sum();
        let node_gini = gini(&counts, node_weight);
        let node_index = self.nodes.len();

        let splittable =
            depth < self.max_depth && indices.len() >= 2 * self.min_leaf && node_gini > 0.0;
        let split = if splittable {
            self.best_split(&indices, &counts, node_weight, node_gini, rng)
        } else {
            None
        };
        let Some(split) = split else {
            self.nodes.push(leaf(counts, node_weight));
            return node_index;
        };

        importance[split.feature] += split.gain;
        // placeholder slot, replaced once both children exist
        self.nodes.push(TreeNode::Leaf { probs: Vec::new() });
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);
        let left = self.grow(left_rows, depth + 1, rng, importance);
        let right = self.grow(right_rows, depth + 1, rng, importance);
        self.nodes[node_index] = TreeNode::Split {
            feature_index: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_index
    }

    fn weighted_counts(&self, indices: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0f64; self.n_classes];
        for &i in indices {
            counts[self.y[i]] += self.weights[i];
        }
        counts
    }

    /// Scan a random feature subset for the split with the largest weighted
    /// impurity decrease. Thresholds sit midway between adjacent distinct
    /// values.
    fn best_split(
        &self,
        indices: &[usize],
        totals: &[f64],
        node_weight: f64,
        node_gini: f64,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let mut features: Vec<usize> = (0..self.feature_len).collect();
        features.shuffle(rng);
        features.truncate(self.split_features);

        let mut best: Option<SplitCandidate> = None;
        let mut best_gain = 1e-12f64;
        for &feature in &features {
            let mut ordered = indices.to_vec();
            ordered.sort_by(|&a, &b| {
                self.x[a][feature]
                    .partial_cmp(&self.x[b][feature])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let mut left_counts = vec![0.0f64; self.n_classes];
            let mut left_weight = 0.0f64;
            for pos in 0..ordered.len() - 1 {
                let i = ordered[pos];
                left_counts[self.y[i]] += self.weights[i];
                left_weight += self.weights[i];
                let value = self.x[i][feature];
                let next = self.x[ordered[pos + 1]][feature];
                if next <= value {
                    continue;
                }
                let left_rows = pos + 1;
                if left_rows < self.min_leaf || ordered.len() - left_rows < self.min_leaf {
                    continue;
                }
                let right_weight = node_weight - left_weight;
                let gini_left = gini(&left_counts, left_weight);
                let gini_right = if right_weight > 0.0 {
                    let mut sum_sq = 0.0f64;
                    for (total, left) in totals.iter().zip(left_counts.iter()) {
                        let p = (total - left) / right_weight;
                        sum_sq += p * p;
                    }
                    1.0 - sum_sq
                } else {
                    0.0
                };
                let gain =
                    node_weight * node_gini - left_weight * gini_left - right_weight * gini_right;
                if gain > best_gain {
                    best_gain = gain;
                    best = Some(SplitCandidate {
                        feature,
                        threshold: value + (next - value) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

fn leaf(counts: Vec<f64>, weight: f64) -> TreeNode {
    let k = counts.len();
    if weight <= 0.0 {
        return TreeNode::Leaf {
            probs: vec![1.0 / k as f64; k],
        };
    }
    TreeNode::Leaf {
        probs: counts.into_iter().map(|c| c / weight).collect(),
    }
}

fn gini(counts: &[f64], weight: f64) -> f64 {
    if weight <= 0.0 {
        return 0.0;
    }
    let mut sum_sq = 0.0f64;
    for &c in counts {
        let p = c / weight;
        sum_sq += p * p;
    }
    1.0 - sum_sq
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::Classifier;

    fn separable_dataset() -> TrainDataset {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for step in 0..10 {
            x.push(vec![step as f64 * 0.05, 0.0]);
            y.push(0);
            x.push(vec![0.55 + step as f64 * 0.05, 0.0]);
            y.push(1);
        }
        TrainDataset {
            feature_len: 2,
            classes: vec!["low".to_string(), "high".to_string()],
            x,
            y,
        }
    }

    fn small_options() -> ForestOptions {
        ForestOptions {
            trees: 16,
            max_depth: 6,
            min_leaf: 1,
            split_features: 2,
            seed: 42,
            balance_classes: true,
        }
    }

    #[test]
    fn learns_a_separable_rule() {
        let dataset = separable_dataset();
        let model = train_forest(&dataset, &small_options()).unwrap();
        assert!(model.validate().is_ok());
        for (row, &label) in dataset.x.iter().zip(dataset.y.iter()) {
            assert_eq!(model.predict_class_index(row), label);
        }
    }

    #[test]
    fn training_is_deterministic_for_a_fixed_seed() {
        let dataset = separable_dataset();
        let a = train_forest(&dataset, &small_options()).unwrap();
        let b = train_forest(&dataset, &small_options()).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn importance_concentrates_on_the_informative_feature() {
        let dataset = separable_dataset();
        let model = train_forest(&dataset, &small_options()).unwrap();
        // the second column is constant and can never host a split
        assert!((model.feature_importance[0] - 1.0).abs() < 1e-9);
        assert!(model.feature_importance[1].abs() < 1e-9);
    }

    fn imbalanced_dataset() -> TrainDataset {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..190 {
            x.push(vec![(i % 10) as f64, 0.0]);
            y.push(0);
        }
        for _ in 0..10 {
            x.push(vec![9.0, 0.0]);
            y.push(1);
        }
        TrainDataset {
            feature_len: 2,
            classes: vec!["majority".to_string(), "minority".to_string()],
            x,
            y,
        }
    }

    #[test]
    fn balanced_weights_recover_the_minority_region() {
        let dataset = imbalanced_dataset();
        let mut options = ForestOptions {
            trees: 16,
            max_depth: 8,
            min_leaf: 1,
            split_features: 2,
            seed: 7,
            balance_classes: false,
        };
        // the minority class shares its region with 19 majority rows, so
        // unweighted counts keep the leaf on the majority side
        let unweighted = train_forest(&dataset, &options).unwrap();
        assert_eq!(unweighted.predict_class_index(&[9.0, 0.0]), 0);

        options.balance_classes = true;
        let weighted = train_forest(&dataset, &options).unwrap();
        assert_eq!(weighted.predict_class_index(&[9.0, 0.0]), 1);
        assert_eq!(weighted.predict_class_index(&[0.0, 0.0]), 0);
    }

    #[test]
    fn rejects_an_empty_dataset() {
        let dataset = TrainDataset {
            feature_len: 2,
            classes: vec!["a".to_string(), "b".to_string()],
            x: Vec::new(),
            y: Vec::new(),
        };
        assert!(train_forest(&dataset, &ForestOptions::default()).is_err());
    }
}
