use serde::Serialize;

/// Result of running detection on one frame.
///
/// Order is irrelevant and duplicates are valid detector output (two boxes
/// for the same label are two records).
#[derive(Clone, Debug, Default, Serialize)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    /// Target predicate: does any record carry the target label?
    ///
    /// Comparison is ASCII case-insensitive; class lists vary in casing
    /// between models.
    pub fn contains_label(&self, target: &str) -> bool {
        self.detections
            .iter()
            .any(|d| d.label.eq_ignore_ascii_case(target))
    }
}

/// One labeled, scored bounding box.
#[derive(Clone, Debug, Serialize)]
pub struct Detection {
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    pub bounds: BoundingBox,
}

/// Pixel-space rectangle, `(x_min, y_min)` top-left inclusive.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(label: &str, confidence: f32) -> Detection {
        Detection {
            label: label.to_string(),
            confidence,
            bounds: BoundingBox::default(),
        }
    }

    #[test]
    fn predicate_matches_only_the_target_label() {
        let result = DetectionResult {
            detections: vec![record("person", 0.91), record("bicycle", 0.55)],
        };
        assert!(result.contains_label("person"));
        assert!(!result.contains_label("car"));
    }

    #[test]
    fn predicate_ignores_ascii_case() {
        let result = DetectionResult {
            detections: vec![record("Person", 0.8)],
        };
        assert!(result.contains_label("person"));
    }

    #[test]
    fn duplicate_records_are_valid() {
        let result = DetectionResult {
            detections: vec![record("person", 0.7), record("person", 0.6)],
        };
        assert!(result.contains_label("person"));
        assert_eq!(result.detections.len(), 2);
    }
}
