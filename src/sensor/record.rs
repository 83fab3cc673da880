//! Wire shape of one raw sensor record.

use serde::Deserialize;
use serde_json::Value;

use super::FeatureVector;

/// One record as the ingestion endpoint and document store emit it.
///
/// Fields are kept as raw JSON values so that shape problems surface as an
/// explicit resolve-or-drop decision during normalization instead of a
/// deserialization failure. Unknown siblings (document ids, timestamps, the
/// hex color string) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    /// Nested color-channel object `{red, green, blue}`.
    #[serde(rename = "RGB", default)]
    pub rgb: Option<Value>,
    /// Ambient light intensity from the photodiode.
    #[serde(rename = "lightIntensity", default)]
    pub light_intensity: Option<Value>,
    /// Settling time in seconds. Older firmware sent `elapsedTime`.
    #[serde(rename = "timeTaken", alias = "elapsedTime", default)]
    pub time_taken: Option<Value>,
}

/// Fully resolved sensor observation.
///
/// Channel values and elapsed seconds are integral in well-behaved data but
/// are carried as `f64`; nothing is clamped or range-checked here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub light_intensity: f64,
    pub elapsed_time: f64,
}

impl SensorReading {
    /// Feature vector in the fixed [`super::FEATURE_NAMES`] column order.
    pub fn feature_vector(&self) -> FeatureVector {
        [
            self.red,
            self.green,
            self.blue,
            self.light_intensity,
            self.elapsed_time,
        ]
    }
}

/// Coerce a JSON value to a finite number.
///
/// Numbers pass through; strings are parsed because some sensor firmware
/// stringifies readings. Everything else counts as missing.
pub(super) fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|v| v.is_finite()),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_endpoint_shape_with_extra_fields() {
        let record: RawRecord = serde_json::from_str(
            r##"{"_id":"abc","color":"#7AC896","RGB":{"red":122,"green":200,"blue":150},
                "timeTaken":14500,"lightIntensity":450.75,"timestamp":"2025-03-01T10:00:00Z","__v":0}"##,
        )
        .unwrap();
        assert!(record.rgb.is_some());
        assert!(record.light_intensity.is_some());
        assert!(record.time_taken.is_some());
    }

    #[test]
    fn accepts_elapsed_time_alias() {
        let record: RawRecord =
            serde_json::from_str(r#"{"RGB":{"red":1,"green":2,"blue":3},"lightIntensity":1.0,"elapsedTime":60}"#)
                .unwrap();
        assert_eq!(record.time_taken, Some(Value::from(60)));
    }

    #[test]
    fn numeric_coercion_rules() {
        assert_eq!(numeric(&Value::from(120)), Some(120.0));
        assert_eq!(numeric(&Value::from(450.75)), Some(450.75));
        assert_eq!(numeric(&Value::from(" 42.5 ")), Some(42.5));
        assert_eq!(numeric(&Value::from("soon")), None);
        assert_eq!(numeric(&Value::from("NaN")), None);
        assert_eq!(numeric(&Value::Null), None);
        assert_eq!(numeric(&Value::from(true)), None);
    }
}
