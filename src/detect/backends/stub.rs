use std::collections::VecDeque;

use anyhow::Result;

use crate::decode::RasterImage;
use crate::detect::backend::Detector;
use crate::detect::result::{BoundingBox, Detection, DetectionResult};

/// Stub detector for tests and stub deployments.
///
/// Returns scripted results frame by frame; once the script is exhausted
/// every further frame yields an empty result.
pub struct StubDetector {
    script: VecDeque<DetectionResult>,
    repeat: Option<DetectionResult>,
}

impl StubDetector {
    /// Never detects anything.
    pub fn empty() -> Self {
        Self {
            script: VecDeque::new(),
            repeat: None,
        }
    }

    /// One result per frame, in order.
    pub fn scripted(results: Vec<DetectionResult>) -> Self {
        Self {
            script: results.into(),
            repeat: None,
        }
    }

    /// Reports the given label on every frame.
    pub fn always(label: &str, confidence: f32) -> Self {
        Self {
            script: VecDeque::new(),
            repeat: Some(DetectionResult {
                detections: vec![Detection {
                    label: label.to_string(),
                    confidence,
                    bounds: BoundingBox::default(),
                }],
            }),
        }
    }
}

impl Detector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _frame: &RasterImage) -> Result<DetectionResult> {
        if let Some(result) = self.script.pop_front() {
            return Ok(result);
        }
        Ok(self.repeat.clone().unwrap_or_default())
    }
}
