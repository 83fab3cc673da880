//! Loading sensor record files into labeled training data.
//!
//! Capture files hold the same record shape the collector endpoint serves,
//! either as one JSON array or as JSON Lines. Records that cannot be
//! normalized are dropped and counted; a file that fails to parse is a hard
//! error.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{SeedableRng, seq::SliceRandom};
use thiserror::Error;

use crate::grade::{QualityGrade, grade_for_elapsed};
use crate::sensor::{FeatureVector, RawRecord, normalize_batch};

#[derive(Debug, Error)]
pub enum DatasetLoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid record file: {0}")]
    InvalidRecords(String),
}

/// Parse a capture file into raw records.
///
/// A file whose first non-whitespace byte is `[` is read as one JSON array;
/// anything else is read as JSON Lines with blank lines skipped.
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>, DatasetLoadError> {
    let mut text = String::new();
    File::open(path)?.read_to_string(&mut text)?;
    if text.trim_start().starts_with('[') {
        return serde_json::from_str(&text)
            .map_err(|err| DatasetLoadError::InvalidRecords(err.to_string()));
    }
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: RawRecord = serde_json::from_str(line)
            .map_err(|err| DatasetLoadError::InvalidRecords(format!("line {}: {err}", idx + 1)))?;
        out.push(record);
    }
    Ok(out)
}

/// Feature rows labeled from settling time, ready for splitting.
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    pub features: Vec<FeatureVector>,
    /// Grade per row, derived from the row's own elapsed time.
    pub grades: Vec<QualityGrade>,
    /// Records dropped during normalization.
    pub dropped: usize,
}

/// Normalize records and label each surviving row by its settling time.
pub fn build_labeled(records: &[RawRecord]) -> LabeledDataset {
    let batch = normalize_batch(records);
    let mut features = Vec::with_capacity(batch.readings.len());
    let mut grades = Vec::with_capacity(batch.readings.len());
    for reading in &batch.readings {
        features.push(reading.feature_vector());
        grades.push(grade_for_elapsed(reading.elapsed_time));
    }
    LabeledDataset {
        features,
        grades,
        dropped: batch.dropped,
    }
}

/// Train/test partition of a labeled dataset.
#[derive(Debug, Clone)]
pub struct SplitDataset {
    pub train_features: Vec<FeatureVector>,
    pub train_grades: Vec<QualityGrade>,
    pub test_features: Vec<FeatureVector>,
    pub test_grades: Vec<QualityGrade>,
}

/// Shuffle rows with a fixed seed and hold out `test_fraction` for testing.
///
/// Both partitions are always non-empty; the same seed over the same rows
/// reproduces the same split.
pub fn split_dataset(
    dataset: &LabeledDataset,
    test_fraction: f64,
    seed: u64,
) -> Result<SplitDataset, String> {
    let n = dataset.features.len();
    if n < 2 {
        return Err(format!("Need at least 2 labeled rows to split, found {n}"));
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(format!(
            "test_fraction must be in (0, 1), got {test_fraction}"
        ));
    }
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let test_len = ((n as f64) * test_fraction).round() as usize;
    let test_len = test_len.clamp(1, n - 1);
    let (train_idx, test_idx) = indices.split_at(n - test_len);

    let mut split = SplitDataset {
        train_features: Vec::with_capacity(train_idx.len()),
        train_grades: Vec::with_capacity(train_idx.len()),
        test_features: Vec::with_capacity(test_idx.len()),
        test_grades: Vec::with_capacity(test_idx.len()),
    };
    for &i in train_idx {
        split.train_features.push(dataset.features[i]);
        split.train_grades.push(dataset.grades[i]);
    }
    for &i in test_idx {
        split.test_features.push(dataset.features[i]);
        split.test_grades.push(dataset.grades[i]);
    }
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record_json(elapsed: f64) -> String {
        format!(
            r#"{{"RGB":{{"red":120,"green":200,"blue":150}},"lightIntensity":450.75,"timeTaken":{elapsed}}}"#
        )
    }

    #[test]
    fn loads_a_json_array_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(
            &path,
            format!("[{},{}]", record_json(1000.0), record_json(15000.0)),
        )
        .unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        let labeled = build_labeled(&records);
        assert_eq!(labeled.dropped, 0);
        assert_eq!(labeled.grades, vec![QualityGrade::Poor, QualityGrade::Good]);
        assert_eq!(labeled.features[0], [120.0, 200.0, 150.0, 450.75, 1000.0]);
    }

    #[test]
    fn loads_json_lines_and_skips_blanks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        std::fs::write(
            &path,
            format!("{}\n\n{}\n", record_json(8000.0), record_json(30000.0)),
        )
        .unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        let labeled = build_labeled(&records);
        assert_eq!(
            labeled.grades,
            vec![QualityGrade::Fair, QualityGrade::Excellent]
        );
    }

    #[test]
    fn reports_the_failing_line_for_bad_json_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        std::fs::write(&path, format!("{}\nnot json\n", record_json(1.0))).unwrap();

        let err = load_records(&path).unwrap_err();
        assert!(matches!(err, DatasetLoadError::InvalidRecords(_)));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn rejects_a_malformed_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, "[{]").unwrap();
        assert!(matches!(
            load_records(&path),
            Err(DatasetLoadError::InvalidRecords(_))
        ));
    }

    #[test]
    fn unusable_records_are_dropped_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        std::fs::write(
            &path,
            format!("{}\n{{\"lightIntensity\":1}}\n", record_json(1.0)),
        )
        .unwrap();

        let records = load_records(&path).unwrap();
        let labeled = build_labeled(&records);
        assert_eq!(labeled.features.len(), 1);
        assert_eq!(labeled.dropped, 1);
    }

    fn synthetic_dataset(n: usize) -> LabeledDataset {
        let records: Vec<RawRecord> = (0..n)
            .map(|i| serde_json::from_str(&record_json(i as f64 * 1000.0)).unwrap())
            .collect();
        build_labeled(&records)
    }

    #[test]
    fn split_is_deterministic_for_a_fixed_seed() {
        let dataset = synthetic_dataset(20);
        let a = split_dataset(&dataset, 0.2, 42).unwrap();
        let b = split_dataset(&dataset, 0.2, 42).unwrap();
        assert_eq!(a.train_features, b.train_features);
        assert_eq!(a.test_features, b.test_features);
    }

    #[test]
    fn split_holds_out_the_requested_fraction() {
        let dataset = synthetic_dataset(20);
        let split = split_dataset(&dataset, 0.2, 42).unwrap();
        assert_eq!(split.test_features.len(), 4);
        assert_eq!(split.train_features.len(), 16);

        // every row lands in exactly one partition
        let mut elapsed: Vec<f64> = split
            .train_features
            .iter()
            .chain(split.test_features.iter())
            .map(|row| row[4])
            .collect();
        elapsed.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let expected: Vec<f64> = (0..20).map(|i| i as f64 * 1000.0).collect();
        assert_eq!(elapsed, expected);
    }

    #[test]
    fn split_never_produces_an_empty_partition() {
        let dataset = synthetic_dataset(3);
        let split = split_dataset(&dataset, 0.05, 42).unwrap();
        assert_eq!(split.test_features.len(), 1);
        assert_eq!(split.train_features.len(), 2);
    }

    #[test]
    fn split_rejects_tiny_datasets_and_bad_fractions() {
        let dataset = synthetic_dataset(1);
        assert!(split_dataset(&dataset, 0.2, 42).is_err());
        let dataset = synthetic_dataset(10);
        assert!(split_dataset(&dataset, 0.0, 42).is_err());
        assert!(split_dataset(&dataset, 1.0, 42).is_err());
    }
}
