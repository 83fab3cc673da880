//! Milk-quality grading from color, light and settling-time readings.
//!
//! Training fits standardization statistics and a label mapping on the
//! training split, fits a classifier on top, and persists both as one unit.
//! Inference replays exactly that persisted state over single readings.

/// Platform directories for artifacts and logs.
pub mod app_dirs;
/// Paired persistence for preprocessing state and model parameters.
pub mod artifacts;
/// Capture-file loading, labeling and splitting.
pub mod dataset;
/// Fetching the newest record from the collector endpoint.
pub mod endpoint;
/// Settling-time quality grades.
pub mod grade;
/// Grading single readings with a persisted pair.
pub mod infer;
/// Tracing setup for the command-line tools.
pub mod logging;
/// Classifier families and evaluation metrics.
pub mod ml;
/// Standardization and label encoding fitted per training run.
pub mod preprocess;
/// Raw sensor records and normalization.
pub mod sensor;
/// End-to-end training pipeline.
pub mod train;
