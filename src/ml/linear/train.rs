use rand::rngs::StdRng;
use rand::{Rng, SeedableRng, seq::SliceRandom};

use super::LinearModel;
use crate::ml::{MODEL_SCHEMA_VERSION, TrainDataset, balanced_class_weights, softmax};

/// Training options for the linear family.
#[derive(Debug, Clone)]
pub struct LinearOptions {
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
    pub batch_size: usize,
    pub seed: u64,
    pub balance_classes: bool,
}

impl Default for LinearOptions {
    fn default() -> Self {
        Self {
            epochs: 200,
            learning_rate: 0.1,
            l2: 1e-4,
            batch_size: 32,
            seed: 42,
            balance_classes: true,
        }
    }
}

/// Fit softmax regression with mini-batch gradient descent.
pub fn train_linear(dataset: &TrainDataset, options: &LinearOptions) -> Result<LinearModel, String> {
    dataset.check()?;
    let classes = dataset.classes.len();
    let dim = dataset.feature_len;

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut weights = vec![0.0f64; classes * dim];
    let mut bias = vec![0.0f64; classes];
    for w in &mut weights {
        *w = (rng.random::<f64>() - 0.5) * 0.01;
    }

    let mut indices: Vec<usize> = (0..dataset.x.len()).collect();
    let batch_size = options.batch_size.max(1);
    let lr = options.learning_rate;
    let l2 = options.l2.max(0.0);

    let class_weights = if options.balance_classes {
        balanced_class_weights(&dataset.y, classes)
    } else {
        vec![1.0; classes]
    };

    for _epoch in 0..options.epochs {
        indices.shuffle(&mut rng);
        for chunk in indices.chunks(batch_size) {
            let mut grad_w = vec![0.0f64; weights.len()];
            let mut grad_b = vec![0.0f64; bias.len()];
            let mut batch_weight = 0.0f64;
            for &idx in chunk {
                let x = &dataset.x[idx];
                let y = dataset.y[idx];
                let weight = class_weights[y];
                if weight == 0.0 {
                    continue;
                }
                let mut logits = vec![0.0f64; classes];
                for (c, logit) in logits.iter_mut().enumerate() {
                    let base = c * dim;
                    let mut sum = bias[c];
                    for i in 0..dim {
                        sum += weights[base + i] * x[i];
                    }
                    *logit = sum;
                }
                let probs = softmax(&logits);
                for c in 0..classes {
                    let diff = probs[c] - if c == y { 1.0 } else { 0.0 };
                    let base = c * dim;
                    for i in 0..dim {
                        grad_w[base + i] += diff * x[i] * weight;
                    }
                    grad_b[c] += diff * weight;
                }
                batch_weight += weight;
            }
            if batch_weight == 0.0 {
                continue;
            }
            let inv = 1.0 / batch_weight;
            for c in 0..classes {
                let base = c * dim;
                for i in 0..dim {
                    let idx = base + i;
                    let l2_term = l2 * weights[idx];
                    weights[idx] -= lr * (grad_w[idx] * inv + l2_term);
                }
                bias[c] -= lr * grad_b[c] * inv;
            }
        }
    }

    let model = LinearModel {
        schema_version: MODEL_SCHEMA_VERSION,
        feature_len: dim,
        classes: dataset.classes.clone(),
        weights,
        bias,
    };
    model.validate()?;
    Ok(model)
}
