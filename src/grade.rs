//! Milk-quality grades and the settling-time labeling rule.

/// Grade boundaries in seconds of settling time. Intervals are half-open:
/// a reading at exactly 7200 s grades `Fair`, not `Poor`.
const FAIR_FROM_SECS: f64 = 2.0 * 3600.0;
const GOOD_FROM_SECS: f64 = 4.0 * 3600.0;
const VERY_GOOD_FROM_SECS: f64 = 6.0 * 3600.0;
const EXCELLENT_FROM_SECS: f64 = 8.0 * 3600.0;

/// Ordered milk-quality grade, worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QualityGrade {
    Poor,
    Fair,
    Good,
    VeryGood,
    Excellent,
}

impl QualityGrade {
    /// Every grade, in quality order.
    pub const ALL: [QualityGrade; 5] = [
        QualityGrade::Poor,
        QualityGrade::Fair,
        QualityGrade::Good,
        QualityGrade::VeryGood,
        QualityGrade::Excellent,
    ];

    /// Human label used in reports and persisted label mappings.
    pub fn label(self) -> &'static str {
        match self {
            QualityGrade::Poor => "Poor",
            QualityGrade::Fair => "Fair",
            QualityGrade::Good => "Good",
            QualityGrade::VeryGood => "Very Good",
            QualityGrade::Excellent => "Excellent",
        }
    }

    /// Parse a label produced by [`QualityGrade::label`].
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|grade| grade.label() == label)
    }
}

impl std::fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Grade a reading from its elapsed settling time in seconds.
///
/// This is the ground-truth label generator for training; the threshold
/// table and its half-open boundary behavior are fixed.
pub fn grade_for_elapsed(elapsed_secs: f64) -> QualityGrade {
    if elapsed_secs < FAIR_FROM_SECS {
        QualityGrade::Poor
    } else if elapsed_secs < GOOD_FROM_SECS {
        QualityGrade::Fair
    } else if elapsed_secs < VERY_GOOD_FROM_SECS {
        QualityGrade::Good
    } else if elapsed_secs < EXCELLENT_FROM_SECS {
        QualityGrade::VeryGood
    } else {
        QualityGrade::Excellent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grades_at_interval_boundaries() {
        let cases = [
            (7199.0, QualityGrade::Poor),
            (7200.0, QualityGrade::Fair),
            (14399.0, QualityGrade::Fair),
            (14400.0, QualityGrade::Good),
            (21599.0, QualityGrade::Good),
            (21600.0, QualityGrade::VeryGood),
            (28799.0, QualityGrade::VeryGood),
            (28800.0, QualityGrade::Excellent),
        ];
        for (elapsed, expected) in cases {
            assert_eq!(grade_for_elapsed(elapsed), expected, "elapsed={elapsed}");
        }
    }

    #[test]
    fn grades_interval_interiors() {
        assert_eq!(grade_for_elapsed(0.0), QualityGrade::Poor);
        assert_eq!(grade_for_elapsed(14500.0), QualityGrade::Good);
        assert_eq!(grade_for_elapsed(100_000.0), QualityGrade::Excellent);
    }

    #[test]
    fn labels_round_trip() {
        for grade in QualityGrade::ALL {
            assert_eq!(QualityGrade::from_label(grade.label()), Some(grade));
        }
        assert_eq!(QualityGrade::from_label("very good"), None);
    }
}
