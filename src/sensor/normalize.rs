//! Record resolution and the batch drop policy.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::record::{RawRecord, SensorReading, numeric};

/// Why a raw record does not resolve to the five required features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record field {0} is missing")]
    MissingField(&'static str),
    #[error("record field {0} is not a number")]
    NotNumeric(&'static str),
}

/// Resolve one raw record into a typed reading.
///
/// Fails fast on the first unresolvable field; the single-reading inference
/// path uses this directly since one malformed request has no batch to fall
/// back on.
pub fn normalize_record(record: &RawRecord) -> Result<SensorReading, RecordError> {
    let rgb = record.rgb.as_ref();
    Ok(SensorReading {
        red: resolve(rgb.and_then(|v| v.get("red")), "RGB.red")?,
        green: resolve(rgb.and_then(|v| v.get("green")), "RGB.green")?,
        blue: resolve(rgb.and_then(|v| v.get("blue")), "RGB.blue")?,
        light_intensity: resolve(record.light_intensity.as_ref(), "lightIntensity")?,
        elapsed_time: resolve(record.time_taken.as_ref(), "timeTaken")?,
    })
}

fn resolve(value: Option<&Value>, field: &'static str) -> Result<f64, RecordError> {
    let value = value.ok_or(RecordError::MissingField(field))?;
    numeric(value).ok_or(RecordError::NotNumeric(field))
}

/// Outcome of normalizing a batch of raw records.
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    pub readings: Vec<SensorReading>,
    /// Records dropped because a required field was missing or non-numeric.
    pub dropped: usize,
}

/// Resolve a batch, dropping records that do not carry all five features.
///
/// Dropping is a data-quality policy, not a failure: the count is logged and
/// carried separately so reports can surface it apart from hard errors.
pub fn normalize_batch(records: &[RawRecord]) -> NormalizedBatch {
    let mut readings = Vec::with_capacity(records.len());
    let mut dropped = 0usize;
    let mut first_errors: Vec<RecordError> = Vec::new();
    for record in records {
        match normalize_record(record) {
            Ok(reading) => readings.push(reading),
            Err(err) => {
                dropped += 1;
                if first_errors.len() < 3 {
                    first_errors.push(err);
                }
            }
        }
    }
    if dropped > 0 {
        warn!(
            "Dropped {dropped} of {} records with unresolvable fields; first errors: {first_errors:?}",
            records.len()
        );
    }
    NormalizedBatch { readings, dropped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: &str) -> RawRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn resolves_full_record_in_feature_order() {
        let reading = normalize_record(&record(
            r#"{"RGB":{"red":120,"green":200,"blue":150},"lightIntensity":450.75,"timeTaken":14500}"#,
        ))
        .unwrap();
        assert_eq!(
            reading.feature_vector(),
            [120.0, 200.0, 150.0, 450.75, 14500.0]
        );
    }

    #[test]
    fn coerces_stringified_values() {
        let reading = normalize_record(&record(
            r#"{"RGB":{"red":"120","green":200,"blue":150},"lightIntensity":"450.75","timeTaken":14500}"#,
        ))
        .unwrap();
        assert_eq!(reading.red, 120.0);
        assert_eq!(reading.light_intensity, 450.75);
    }

    #[test]
    fn out_of_range_channels_pass_through() {
        let reading = normalize_record(&record(
            r#"{"RGB":{"red":300,"green":-4,"blue":150},"lightIntensity":1.0,"timeTaken":60}"#,
        ))
        .unwrap();
        assert_eq!(reading.red, 300.0);
        assert_eq!(reading.green, -4.0);
    }

    #[test]
    fn rejects_missing_light_intensity() {
        let err = normalize_record(&record(
            r#"{"RGB":{"red":1,"green":2,"blue":3},"timeTaken":60}"#,
        ))
        .unwrap_err();
        assert_eq!(err, RecordError::MissingField("lightIntensity"));
    }

    #[test]
    fn rejects_non_object_rgb_as_missing_channel() {
        let err = normalize_record(&record(
            r#"{"RGB":"green-ish","lightIntensity":1.0,"timeTaken":60}"#,
        ))
        .unwrap_err();
        assert_eq!(err, RecordError::MissingField("RGB.red"));
    }

    #[test]
    fn rejects_non_numeric_field() {
        let err = normalize_record(&record(
            r#"{"RGB":{"red":1,"green":2,"blue":3},"lightIntensity":"bright","timeTaken":60}"#,
        ))
        .unwrap_err();
        assert_eq!(err, RecordError::NotNumeric("lightIntensity"));
    }

    #[test]
    fn batch_drops_without_raising() {
        let records = vec![
            record(r#"{"RGB":{"red":1,"green":2,"blue":3},"lightIntensity":4.0,"timeTaken":60}"#),
            record(r#"{"RGB":{"red":1,"green":2,"blue":3},"timeTaken":60}"#),
            record(r#"{"RGB":{"red":9,"green":8,"blue":7},"lightIntensity":6.0,"timeTaken":120}"#),
        ];
        let batch = normalize_batch(&records);
        assert_eq!(batch.readings.len(), 2);
        assert_eq!(batch.dropped, 1);
    }
}
