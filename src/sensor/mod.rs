//! Raw sensor records and their resolution into fixed-order feature vectors.

mod normalize;
mod record;

pub use normalize::{NormalizedBatch, RecordError, normalize_batch, normalize_record};
pub use record::{RawRecord, SensorReading};

/// Number of features in a resolved reading.
pub const FEATURE_LEN: usize = 5;

/// Canonical feature columns, in the order every consumer of a
/// [`FeatureVector`] relies on. These are the wire names of the raw records;
/// reordering them would silently invalidate persisted preprocessing state.
pub const FEATURE_NAMES: [&str; FEATURE_LEN] = [
    "RGB.red",
    "RGB.green",
    "RGB.blue",
    "lightIntensity",
    "timeTaken",
];

/// One observation in the fixed [`FEATURE_NAMES`] column order.
pub type FeatureVector = [f64; FEATURE_LEN];
