use std::{fmt::Debug, path::Path};

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use log::debug;
use tract_onnx::prelude::Tensor;
use veil_utils::{load_image, timing_guard};

use super::{DetectorConfig, FaceBox, decode_detections, detection_tensor};
use crate::model::OnnxModel;

/// Forward pass of a face detection network.
///
/// Takes the `[1, 3, S, S]` blob and returns the raw `[1, 1, N, 7]` detection tensor.
pub trait DetectionNetwork: Send + Sync + Debug {
    fn forward(&self, input: Tensor) -> Result<Tensor>;
}

/// SSD detector exported to ONNX and executed with tract.
#[derive(Debug)]
pub struct OnnxDetectionNetwork {
    model: OnnxModel,
}

impl OnnxDetectionNetwork {
    pub fn load<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model = OnnxModel::load(model_path, input_size, "face detection")?;
        Ok(Self { model })
    }
}

impl DetectionNetwork for OnnxDetectionNetwork {
    fn forward(&self, input: Tensor) -> Result<Tensor> {
        let mut outputs = self.model.run(input)?;
        Ok(outputs.swap_remove(0))
    }
}

/// Couples a detection network with its preprocessing and filtering settings.
#[derive(Debug)]
pub struct FaceDetector {
    network: Box<dyn DetectionNetwork>,
    config: DetectorConfig,
}

impl FaceDetector {
    /// Load the ONNX detector at `model_path`.
    pub fn new<P: AsRef<Path>>(model_path: P, config: DetectorConfig) -> Result<Self> {
        let network = OnnxDetectionNetwork::load(model_path, config.input_size)?;
        Ok(Self::with_network(Box::new(network), config))
    }

    /// Wrap an already constructed network.
    pub fn with_network(network: Box<dyn DetectionNetwork>, config: DetectorConfig) -> Self {
        Self { network, config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Decode the file at `path` and detect faces in it.
    pub fn detect_path<P: AsRef<Path>>(&self, path: P) -> Result<Vec<FaceBox>> {
        let _guard = timing_guard("veil_core::face::detect_path", log::Level::Debug);
        let image = load_image(path)?;
        self.detect_image(&image)
    }

    /// Detect faces in an in-memory image. An image without faces yields an empty list.
    pub fn detect_image(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
        let _guard = timing_guard("veil_core::face::detect_image", log::Level::Debug);
        let dimensions = image.dimensions();
        let input = detection_tensor(image, &self.config)?;

        let raw = {
            let _guard = timing_guard("veil_core::face::inference", log::Level::Debug);
            self.network
                .forward(input)
                .context("face detection inference failed")?
        };

        let faces = {
            let _guard = timing_guard("veil_core::face::postprocess", log::Level::Debug);
            decode_detections(&raw, dimensions, &self.config)?
        };
        debug!(
            "Detected {} face(s) in {}x{} image",
            faces.len(),
            dimensions.0,
            dimensions.1
        );
        Ok(faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[derive(Debug)]
    struct FixedRows(Vec<[f32; 7]>);

    impl DetectionNetwork for FixedRows {
        fn forward(&self, input: Tensor) -> Result<Tensor> {
            assert_eq!(input.shape(), &[1, 3, 300, 300]);
            let flat: Vec<f32> = self.0.iter().flatten().copied().collect();
            Ok(Tensor::from_shape(&[1, 1, self.0.len(), 7], &flat)?)
        }
    }

    #[test]
    fn detect_image_scales_to_source_dimensions() {
        let detector = FaceDetector::with_network(
            Box::new(FixedRows(vec![[0.0, 1.0, 0.97, 0.25, 0.25, 0.5, 0.75]])),
            DetectorConfig::default(),
        );
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, Rgb([90, 90, 90])));
        let faces = detector.detect_image(&image).expect("detect");
        assert_eq!(
            faces,
            vec![FaceBox {
                x: 160,
                y: 120,
                width: 160,
                height: 240
            }]
        );
    }

    #[test]
    fn missing_model_fails_to_load() {
        let err = FaceDetector::new("missing-detector.onnx", DetectorConfig::default())
            .expect_err("missing");
        assert!(format!("{err:#}").contains("not found"));
    }
}
