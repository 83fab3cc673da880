//! Grading a single reading with a persisted pair.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::artifacts::{self, ArtifactError};
use crate::endpoint::{self, EndpointError};
use crate::ml::{Classifier, ModelArtifact};
use crate::preprocess::PreprocessingState;
use crate::sensor::{RawRecord, RecordError, normalize_record};

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("invalid input: {0}")]
    Input(String),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wire-format prediction: the fitted integer code and its grade label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub encoded: usize,
    pub label: String,
}

/// A persisted pair ready to grade readings.
///
/// Every prediction flows through the state that was fitted at training
/// time: standardize with the persisted statistics, predict, decode through
/// the persisted mapping. Nothing is ever refitted here.
#[derive(Debug)]
pub struct InferenceService {
    state: PreprocessingState,
    model: ModelArtifact,
}

impl InferenceService {
    /// Load the fitted pair from `dir`.
    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        let (state, model) = artifacts::load_pair(dir)?;
        debug!(
            dir = %dir.display(),
            family = model.family_name(),
            classes = state.classes.len(),
            "loaded inference artifacts"
        );
        Ok(Self { state, model })
    }

    /// Pair parts already in memory, with the same fitted-together check
    /// the artifact store applies.
    pub fn from_parts(
        state: PreprocessingState,
        model: ModelArtifact,
    ) -> Result<Self, ArtifactError> {
        artifacts::validate_pair(&state, &model)?;
        Ok(Self { state, model })
    }

    /// Grade labels in code order.
    pub fn classes(&self) -> &[String] {
        &self.state.classes
    }

    /// Grade one raw record.
    pub fn predict(&self, record: &RawRecord) -> Result<Prediction, RecordError> {
        let reading = normalize_record(record)?;
        let row = self.state.apply_row(&reading.feature_vector());
        let encoded = self.model.predict_class_index(&row);
        let grade = self.state.decode(encoded);
        Ok(Prediction {
            encoded,
            label: grade.label().to_string(),
        })
    }
}

/// Where the single reading comes from.
#[derive(Debug, Clone)]
pub enum ReadingSource {
    Stdin,
    File(PathBuf),
    /// Collector endpoint URL; the newest record of its window is scored.
    Endpoint(String),
}

impl ReadingSource {
    /// Obtain the raw record from this source.
    pub fn fetch(&self) -> Result<RawRecord, InferenceError> {
        match self {
            ReadingSource::Stdin => {
                let mut text = String::new();
                std::io::stdin().read_to_string(&mut text)?;
                parse_single_record(&text)
            }
            ReadingSource::File(path) => {
                let text = std::fs::read_to_string(path)?;
                parse_single_record(&text)
            }
            ReadingSource::Endpoint(url) => Ok(endpoint::fetch_latest_record(url)?),
        }
    }
}

/// Load the persisted pair from `dir` and grade one reading from `source`.
pub fn run_prediction(dir: &Path, source: &ReadingSource) -> Result<Prediction, InferenceError> {
    let service = InferenceService::load(dir)?;
    let record = source.fetch()?;
    Ok(service.predict(&record)?)
}

/// Parse exactly one JSON record object.
pub fn parse_single_record(text: &str) -> Result<RawRecord, InferenceError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(InferenceError::Input("empty input".to_string()));
    }
    if trimmed.starts_with('[') {
        return Err(InferenceError::Input(
            "expected a single record object, found an array".to_string(),
        ));
    }
    serde_json::from_str(trimmed).map_err(|err| InferenceError::Input(err.to_string()))
}
