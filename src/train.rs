//! End-to-end training: load records, label, split, fit, evaluate, persist.
//!
//! Preprocessing statistics and the label mapping are fitted on the training
//! split only; the held-out split sees them through the same `apply` path
//! inference uses.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::artifacts::{self, ArtifactError};
use crate::dataset::{self, DatasetLoadError, LabeledDataset};
use crate::ml::{
    Classifier, ForestOptions, LinearOptions, ModelArtifact, TrainDataset,
    metrics::{self, ConfusionMatrix},
    train_forest, train_linear,
};
use crate::preprocess::PreprocessingState;
use crate::sensor::FEATURE_NAMES;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Load(#[from] DatasetLoadError),
    #[error("no usable records in {}", .0.display())]
    NoUsableRecords(PathBuf),
    #[error("dataset split: {0}")]
    Split(String),
    #[error("preprocessing: {0}")]
    Preprocess(String),
    #[error("model fit: {0}")]
    Fit(String),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Classifier family selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    Forest,
    Linear,
}

impl ModelFamily {
    pub fn parse(name: &str) -> Result<Self, String> {
        match name {
            "forest" => Ok(Self::Forest),
            "linear" => Ok(Self::Linear),
            other => Err(format!(
                "Unknown model family '{other}' (expected 'forest' or 'linear')"
            )),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ModelFamily::Forest => "forest",
            ModelFamily::Linear => "linear",
        }
    }
}

/// Options for one training run.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Family to fit and persist.
    pub family: ModelFamily,
    /// Fraction of labeled rows held out for evaluation.
    pub test_fraction: f64,
    /// Seed for the split and the family trainers.
    pub seed: u64,
    /// Weight classes inversely to their training frequency.
    pub balance_classes: bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            family: ModelFamily::Forest,
            test_fraction: 0.2,
            seed: 42,
            balance_classes: true,
        }
    }
}

/// Per-grade evaluation statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ClassReport {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: u32,
}

/// One ranked attribution entry.
#[derive(Debug, Clone, Serialize)]
pub struct RankedFeature {
    pub feature: String,
    pub score: f64,
}

/// Held-out evaluation of one fitted family.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub family: String,
    pub accuracy: f64,
    pub weighted_f1: f64,
    /// Statistics keyed by grade label.
    pub per_class: BTreeMap<String, ClassReport>,
    /// Truth-major confusion counts in class code order.
    pub confusion: Vec<Vec<u32>>,
    /// The metric the attribution scores are measured in.
    pub attribution_kind: String,
    /// Features ranked by attribution magnitude.
    pub attribution: Vec<RankedFeature>,
}

/// Everything a training run produced.
#[derive(Debug, Clone, Serialize)]
pub struct TrainOutcome {
    pub rows_loaded: usize,
    pub rows_dropped: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Held-out rows skipped because their grade never occurred in training.
    pub test_rows_skipped: usize,
    /// Labeled rows per grade before splitting.
    pub class_distribution: BTreeMap<String, usize>,
    /// One report per evaluated family.
    pub reports: Vec<EvaluationReport>,
}

/// Train one family on a capture file and persist the fitted pair.
pub fn train_from_file(
    input: &Path,
    artifacts_dir: &Path,
    options: &TrainOptions,
) -> Result<TrainOutcome, TrainError> {
    let prepared = prepare(input, options)?;
    let model = fit_family(options.family, &prepared.train, options)?;
    let report = evaluate(
        options.family,
        &model,
        &prepared.test_x,
        &prepared.test_y,
    );
    artifacts::save_pair(artifacts_dir, &prepared.state, &model)?;
    info!(
        dir = %artifacts_dir.display(),
        family = options.family.name(),
        "persisted preprocessing and model pair"
    );
    Ok(prepared.into_outcome(vec![report]))
}

/// Fit and evaluate both families on the same split without persisting.
pub fn compare_from_file(input: &Path, options: &TrainOptions) -> Result<TrainOutcome, TrainError> {
    let prepared = prepare(input, options)?;
    let mut reports = Vec::new();
    for family in [ModelFamily::Forest, ModelFamily::Linear] {
        let model = fit_family(family, &prepared.train, options)?;
        reports.push(evaluate(family, &model, &prepared.test_x, &prepared.test_y));
    }
    Ok(prepared.into_outcome(reports))
}

struct Prepared {
    rows_loaded: usize,
    rows_dropped: usize,
    test_rows_skipped: usize,
    class_distribution: BTreeMap<String, usize>,
    state: PreprocessingState,
    train: TrainDataset,
    test_x: Vec<Vec<f64>>,
    test_y: Vec<usize>,
}

impl Prepared {
    fn into_outcome(self, reports: Vec<EvaluationReport>) -> TrainOutcome {
        TrainOutcome {
            rows_loaded: self.rows_loaded,
            rows_dropped: self.rows_dropped,
            train_rows: self.train.x.len(),
            test_rows: self.test_x.len(),
            test_rows_skipped: self.test_rows_skipped,
            class_distribution: self.class_distribution,
            reports,
        }
    }
}

fn prepare(input: &Path, options: &TrainOptions) -> Result<Prepared, TrainError> {
    let records = dataset::load_records(input)?;
    let labeled = dataset::build_labeled(&records);
    if labeled.features.is_empty() {
        return Err(TrainError::NoUsableRecords(input.to_path_buf()));
    }
    info!(
        rows = labeled.features.len(),
        dropped = labeled.dropped,
        input = %input.display(),
        "loaded labeled records"
    );

    let class_distribution = grade_distribution(&labeled);
    let split = dataset::split_dataset(&labeled, options.test_fraction, options.seed)
        .map_err(TrainError::Split)?;

    let state = PreprocessingState::fit(&split.train_features, &split.train_grades)
        .map_err(TrainError::Preprocess)?;

    let train_x: Vec<Vec<f64>> = state
        .apply(&split.train_features)
        .iter()
        .map(|row| row.to_vec())
        .collect();
    let train_y: Vec<usize> = split
        .train_grades
        .iter()
        .map(|&grade| state.encode(grade))
        .collect();

    let mut test_x = Vec::with_capacity(split.test_features.len());
    let mut test_y = Vec::with_capacity(split.test_grades.len());
    let mut skipped = 0usize;
    for (row, &grade) in split.test_features.iter().zip(split.test_grades.iter()) {
        match state.try_encode(grade) {
            Some(code) => {
                test_x.push(state.apply_row(row).to_vec());
                test_y.push(code);
            }
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(
            skipped,
            "held-out rows carry grades absent from the training split"
        );
    }

    let train = TrainDataset {
        feature_len: state.feature_len(),
        classes: state.classes.clone(),
        x: train_x,
        y: train_y,
    };
    Ok(Prepared {
        rows_loaded: labeled.features.len(),
        rows_dropped: labeled.dropped,
        test_rows_skipped: skipped,
        class_distribution,
        state,
        train,
        test_x,
        test_y,
    })
}

fn grade_distribution(labeled: &LabeledDataset) -> BTreeMap<String, usize> {
    let mut distribution = BTreeMap::new();
    for grade in &labeled.grades {
        *distribution.entry(grade.label().to_string()).or_insert(0) += 1;
    }
    distribution
}

fn fit_family(
    family: ModelFamily,
    train: &TrainDataset,
    options: &TrainOptions,
) -> Result<ModelArtifact, TrainError> {
    info!(
        family = family.name(),
        rows = train.x.len(),
        classes = train.classes.len(),
        "fitting classifier"
    );
    let model = match family {
        ModelFamily::Forest => {
            let forest_options = ForestOptions {
                seed: options.seed,
                balance_classes: options.balance_classes,
                ..ForestOptions::default()
            };
            ModelArtifact::Forest(train_forest(train, &forest_options).map_err(TrainError::Fit)?)
        }
        ModelFamily::Linear => {
            let linear_options = LinearOptions {
                seed: options.seed,
                balance_classes: options.balance_classes,
                ..LinearOptions::default()
            };
            ModelArtifact::Linear(train_linear(train, &linear_options).map_err(TrainError::Fit)?)
        }
    };
    Ok(model)
}

fn evaluate(
    family: ModelFamily,
    model: &ModelArtifact,
    test_x: &[Vec<f64>],
    test_y: &[usize],
) -> EvaluationReport {
    let classes = model.classes().to_vec();
    let k = classes.len();
    let mut cm = ConfusionMatrix::new(k);
    for (row, &truth) in test_x.iter().zip(test_y.iter()) {
        cm.add(truth, model.predict_class_index(row));
    }
    let stats = metrics::precision_recall_by_class(&cm);
    let per_class: BTreeMap<String, ClassReport> = classes
        .iter()
        .zip(stats.iter())
        .map(|(label, s)| {
            (
                label.clone(),
                ClassReport {
                    precision: s.precision,
                    recall: s.recall,
                    f1: s.f1,
                    support: s.support,
                },
            )
        })
        .collect();
    let confusion: Vec<Vec<u32>> = (0..k)
        .map(|truth| (0..k).map(|predicted| cm.get(truth, predicted)).collect())
        .collect();
    let attribution = model.attribution();
    EvaluationReport {
        family: family.name().to_string(),
        accuracy: metrics::accuracy(&cm),
        weighted_f1: metrics::weighted_f1(&stats),
        per_class,
        confusion,
        attribution_kind: attribution.kind.describe().to_string(),
        attribution: attribution
            .ranked(&FEATURE_NAMES)
            .into_iter()
            .map(|(feature, score)| RankedFeature { feature, score })
            .collect(),
    }
}
