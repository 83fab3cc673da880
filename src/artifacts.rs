//! Paired persistence for preprocessing state and model parameters.
//!
//! The two artifacts are only meaningful together, so they are written as a
//! unit: both staged to temp files, then both renamed into place. Loading
//! re-validates each file and then checks that the pair was fitted together.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::ml::{Classifier, ModelArtifact};
use crate::preprocess::PreprocessingState;

/// File name of the persisted preprocessing state.
pub const PREPROCESSING_FILE: &str = "preprocessing.json";
/// File name of the persisted model parameters.
pub const MODEL_FILE: &str = "model.json";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid artifact {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
    #[error("artifact pair mismatch: {0}")]
    PairMismatch(String),
}

/// Persist a fitted pair under `dir`.
///
/// Both files are staged first, so a failure before the renames leaves any
/// previous pair untouched.
pub fn save_pair(
    dir: &Path,
    state: &PreprocessingState,
    model: &ModelArtifact,
) -> Result<(), ArtifactError> {
    validate_pair(state, model)?;
    std::fs::create_dir_all(dir).map_err(|err| ArtifactError::Write {
        path: dir.to_path_buf(),
        source: err,
    })?;
    let state_path = dir.join(PREPROCESSING_FILE);
    let model_path = dir.join(MODEL_FILE);
    let state_tmp = stage_json(&state_path, state)?;
    let model_tmp = stage_json(&model_path, model)?;
    std::fs::rename(&state_tmp, &state_path).map_err(|err| ArtifactError::Write {
        path: state_path,
        source: err,
    })?;
    std::fs::rename(&model_tmp, &model_path).map_err(|err| ArtifactError::Write {
        path: model_path,
        source: err,
    })?;
    Ok(())
}

/// Load and validate a fitted pair from `dir`.
pub fn load_pair(dir: &Path) -> Result<(PreprocessingState, ModelArtifact), ArtifactError> {
    let state_path = dir.join(PREPROCESSING_FILE);
    let state: PreprocessingState = read_json(&state_path)?;
    state.validate().map_err(|reason| ArtifactError::Invalid {
        path: state_path,
        reason,
    })?;

    let model_path = dir.join(MODEL_FILE);
    let model: ModelArtifact = read_json(&model_path)?;
    model.validate().map_err(|reason| ArtifactError::Invalid {
        path: model_path,
        reason,
    })?;

    validate_pair(&state, &model)?;
    Ok((state, model))
}

/// Check that a preprocessing state and a model were fitted together: same
/// feature count, same classes in the same code order.
pub fn validate_pair(state: &PreprocessingState, model: &ModelArtifact) -> Result<(), ArtifactError> {
    if state.feature_len() != model.feature_len() {
        return Err(ArtifactError::PairMismatch(format!(
            "preprocessing expects {} features but the model expects {}",
            state.feature_len(),
            model.feature_len(),
        )));
    }
    if state.classes != model.classes() {
        return Err(ArtifactError::PairMismatch(format!(
            "preprocessing classes {:?} do not match model classes {:?}",
            state.classes,
            model.classes(),
        )));
    }
    Ok(())
}

fn stage_json<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf, ArtifactError> {
    let json = serde_json::to_string_pretty(value).map_err(|err| ArtifactError::Parse {
        path: path.to_path_buf(),
        source: err,
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json.as_bytes()).map_err(|err| ArtifactError::Write {
        path: tmp.clone(),
        source: err,
    })?;
    Ok(tmp)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = std::fs::read(path).map_err(|err| ArtifactError::Read {
        path: path.to_path_buf(),
        source: err,
    })?;
    serde_json::from_slice(&bytes).map_err(|err| ArtifactError::Parse {
        path: path.to_path_buf(),
        source: err,
    })
}
