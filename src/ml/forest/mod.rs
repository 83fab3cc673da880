//! Bagged decision-tree ensemble, the reference classifier family.
//!
//! Each tree fits on a bootstrap resample with class-weighted Gini splits;
//! prediction averages the leaf class distributions across trees.
//! Attribution is the normalized impurity decrease accumulated per feature
//! at fit time.

mod train;

use serde::{Deserialize, Serialize};

use crate::ml::{AttributionKind, Classifier, FeatureAttribution, MODEL_SCHEMA_VERSION, argmax};

pub use train::{ForestOptions, train_forest};

/// One node of a fitted tree. Nodes are stored flat; children are indices
/// into the same vector and always point forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Internal split: rows with `feature <= threshold` descend left.
    Split {
        feature_index: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Leaf holding the weighted class distribution of its training rows.
    Leaf { probs: Vec<f64> },
}

/// A single fitted decision tree with the root at index 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Leaf class distribution reached by a feature row.
    pub fn leaf_probs(&self, row: &[f64]) -> &[f64] {
        let mut index = 0usize;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { probs } => return probs,
                TreeNode::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    let value = row.get(*feature_index).copied().unwrap_or(0.0);
                    index = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Serialized forest parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestModel {
    pub schema_version: i64,
    /// Number of values expected per feature row.
    pub feature_len: usize,
    /// Class labels in code order.
    pub classes: Vec<String>,
    pub trees: Vec<DecisionTree>,
    /// Normalized impurity-decrease scores captured at fit time, one per
    /// feature column; sums to 1.0 when any split was made.
    pub feature_importance: Vec<f64>,
}

impl ForestModel {
    /// Validate structural invariants of a loaded model.
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version != MODEL_SCHEMA_VERSION {
            return Err(format!(
                "Unsupported model schema version {} (expected {})",
                self.schema_version, MODEL_SCHEMA_VERSION
            ));
        }
        if self.classes.len() < 2 {
            return Err("Model must have at least 2 classes".to_string());
        }
        if self.feature_len == 0 {
            return Err("Model must expect at least one feature".to_string());
        }
        if self.trees.is_empty() {
            return Err("Forest has no trees".to_string());
        }
        if self.feature_importance.len() != self.feature_len {
            return Err("Feature importance length mismatch".to_string());
        }
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(format!("Tree {tree_idx} has no nodes"));
            }
            for (node_idx, node) in tree.nodes.iter().enumerate() {
                match node {
                    TreeNode::Split {
                        feature_index,
                        left,
                        right,
                        ..
                    } => {
                        if *feature_index >= self.feature_len {
                            return Err(format!(
                                "Tree {tree_idx} node {node_idx} splits on unknown feature"
                            ));
                        }
                        // forward-only children rule out traversal cycles
                        if *left <= node_idx || *right <= node_idx {
                            return Err(format!(
                                "Tree {tree_idx} node {node_idx} has backward child links"
                            ));
                        }
                        if *left >= tree.nodes.len() || *right >= tree.nodes.len() {
                            return Err(format!(
                                "Tree {tree_idx} node {node_idx} has out-of-range children"
                            ));
                        }
                    }
                    TreeNode::Leaf { probs } => {
                        if probs.len() != self.classes.len() {
                            return Err(format!(
                                "Tree {tree_idx} node {node_idx} leaf has wrong class count"
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Average the per-tree leaf distributions for a row.
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let k = self.classes.len();
        let mut probs = vec![0.0f64; k];
        for tree in &self.trees {
            let leaf = tree.leaf_probs(row);
            for (acc, &p) in probs.iter_mut().zip(leaf.iter()) {
                *acc += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        for p in &mut probs {
            *p /= n;
        }
        probs
    }

    /// Index of the most probable class for a row.
    pub fn predict_class_index(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba(row))
    }
}

impl Classifier for ForestModel {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn feature_len(&self) -> usize {
        self.feature_len
    }

    fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        ForestModel::predict_proba(self, row)
    }

    fn attribution(&self) -> FeatureAttribution {
        FeatureAttribution {
            kind: AttributionKind::ImpurityDecrease,
            scores: self.feature_importance.clone(),
        }
    }
}
