#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::decode::RasterImage;
use crate::detect::backend::Detector;
use crate::detect::result::{BoundingBox, Detection, DetectionResult};

/// Tract-based ONNX detector.
///
/// Loads a local model file and maps a YOLO-style output tensor
/// (`[1, rows, 5 + classes]`, each row `cx, cy, w, h, objectness,
/// class scores...`) to labeled boxes. Performs no network I/O.
pub struct TractDetector {
    model: TypedSimplePlan<TypedModel>,
    width: u32,
    height: u32,
    labels: Vec<String>,
    confidence_threshold: f32,
}

impl TractDetector {
    /// Load an ONNX model from disk and prepare it for inference.
    ///
    /// `labels` maps class indices to label strings in model order.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        width: u32,
        height: u32,
        labels: Vec<String>,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            labels,
            confidence_threshold: 0.5,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    fn build_input(&self, frame: &RasterImage) -> Result<Tensor> {
        if frame.width != self.width || frame.height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                frame.width,
                frame.height,
                self.width,
                self.height
            ));
        }

        let expected_len = (frame.width as usize)
            .checked_mul(frame.height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if frame.pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                frame.pixels.len()
            ));
        }

        let width = frame.width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, frame.height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                frame.pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn extract_detections(&self, outputs: TVec<TValue>) -> Result<DetectionResult> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let shape = view.shape();
        if shape.len() != 3 || shape[2] < 5 + self.labels.len() {
            return Err(anyhow!(
                "unexpected model output shape {:?}; expected [1, rows, 5 + {} classes]",
                shape,
                self.labels.len()
            ));
        }

        let mut detections = Vec::new();
        for row in view.index_axis(tract_ndarray::Axis(0), 0).outer_iter() {
            let objectness = row[4];
            let (class_idx, class_score) = self
                .labels
                .iter()
                .enumerate()
                .map(|(idx, _)| (idx, row[5 + idx]))
                .fold((0usize, f32::NEG_INFINITY), |best, cand| {
                    if cand.1 > best.1 {
                        cand
                    } else {
                        best
                    }
                });

            let confidence = (objectness * class_score).clamp(0.0, 1.0);
            if confidence < self.confidence_threshold {
                continue;
            }

            let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
            detections.push(Detection {
                label: self.labels[class_idx].clone(),
                confidence,
                bounds: BoundingBox {
                    x_min: cx - w / 2.0,
                    y_min: cy - h / 2.0,
                    x_max: cx + w / 2.0,
                    y_max: cy + h / 2.0,
                },
            });
        }

        Ok(DetectionResult { detections })
    }
}

impl Detector for TractDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &RasterImage) -> Result<DetectionResult> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.extract_detections(outputs)
    }
}
