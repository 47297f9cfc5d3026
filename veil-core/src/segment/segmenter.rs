use std::{fmt::Debug, path::Path};

use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage, RgbaImage};
use log::debug;
use tract_onnx::prelude::Tensor;
use veil_utils::timing_guard;

use super::{
    Mask, ProbabilityMap, SegmentationConfig, apply_gamma, blur_kernel_size, composite,
    dilate_mask, dilation_kernel_size, gaussian_blur, normalize_map, render_overlay, resize_mask,
    segmentation_tensor, working_image,
};
use crate::model::OnnxModel;

/// Forward pass of a saliency network.
///
/// Takes the `[1, 3, S, S]` normalized tensor and returns the primary saliency output.
pub trait SegmentationNetwork: Send + Sync + Debug {
    fn forward(&self, input: Tensor) -> Result<Tensor>;
}

/// U²-Net style network exported to ONNX. Side outputs are discarded.
#[derive(Debug)]
pub struct OnnxSegmentationNetwork {
    model: OnnxModel,
}

impl OnnxSegmentationNetwork {
    pub fn load<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model = OnnxModel::load(model_path, input_size, "segmentation")?;
        Ok(Self { model })
    }
}

impl SegmentationNetwork for OnnxSegmentationNetwork {
    fn forward(&self, input: Tensor) -> Result<Tensor> {
        let mut outputs = self.model.run(input)?;
        Ok(outputs.swap_remove(0))
    }
}

/// Everything produced for one image. All rasters share the working image's dimensions.
#[derive(Debug, Clone)]
pub struct SegmentationOutput {
    /// Source converted to RGB and capped to the configured longest side.
    pub working: RgbImage,
    pub mask: Mask,
    pub composite: RgbImage,
    pub overlay: RgbaImage,
}

impl SegmentationOutput {
    pub fn dimensions(&self) -> (u32, u32) {
        self.working.dimensions()
    }
}

/// Interpret a network output as a `height x width` map.
///
/// The last two axes are spatial; every leading axis must have length one.
pub fn probability_map(output: &Tensor) -> Result<ProbabilityMap> {
    let shape = output.shape();
    anyhow::ensure!(
        shape.len() >= 2,
        "segmentation output must have at least two dimensions (got {:?})",
        shape
    );
    let (leading, spatial) = shape.split_at(shape.len() - 2);
    anyhow::ensure!(
        leading.iter().all(|&d| d == 1),
        "segmentation output must describe a single map (got {:?})",
        shape
    );
    let (height, width) = (spatial[0], spatial[1]);
    anyhow::ensure!(height > 0 && width > 0, "segmentation output is empty");

    let slice = output
        .as_slice::<f32>()
        .map_err(|e| anyhow::anyhow!("segmentation output is not f32: {e}"))?;
    ProbabilityMap::from_shape_vec((height, width), slice.to_vec())
        .context("segmentation output data has unexpected length")
}

/// Couples a segmentation network with mask tuning and compositing settings.
#[derive(Debug)]
pub struct Segmenter {
    network: Box<dyn SegmentationNetwork>,
    config: SegmentationConfig,
}

impl Segmenter {
    /// Load the ONNX segmentation network at `model_path`.
    pub fn new<P: AsRef<Path>>(model_path: P, config: SegmentationConfig) -> Result<Self> {
        let network = OnnxSegmentationNetwork::load(model_path, config.input_size)?;
        Ok(Self::with_network(Box::new(network), config))
    }

    pub fn with_network(network: Box<dyn SegmentationNetwork>, config: SegmentationConfig) -> Self {
        Self { network, config }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Segment `image` and build the blurred composite plus its overlay.
    pub fn segment(&self, image: &DynamicImage) -> Result<SegmentationOutput> {
        let _guard = timing_guard("veil_core::segment", log::Level::Debug);
        let working = working_image(image, self.config.max_side);
        let (width, height) = working.dimensions();

        let input = segmentation_tensor(&working, self.config.input_size)?;
        let raw = {
            let _guard = timing_guard("veil_core::segment::inference", log::Level::Debug);
            self.network
                .forward(input)
                .context("segmentation inference failed")?
        };

        let mask = {
            let _guard = timing_guard("veil_core::segment::mask", log::Level::Debug);
            let mut map = probability_map(&raw)?;
            normalize_map(&mut map);
            apply_gamma(&mut map, self.config.gamma);
            let resized = resize_mask(&map, width, height);
            let kernel = dilation_kernel_size(
                width,
                height,
                self.config.dilation_ratio,
                self.config.min_dilation,
            );
            debug!("Dilating {width}x{height} mask with {kernel}x{kernel} element");
            dilate_mask(&resized, kernel)
        };

        let (composite, overlay) = {
            let _guard = timing_guard("veil_core::segment::composite", log::Level::Debug);
            let ksize = blur_kernel_size(width, height, self.config.blur_ratio);
            debug!("Blurring {width}x{height} image with {ksize}x{ksize} Gaussian");
            let blurred = gaussian_blur(&working, ksize);
            (
                composite(&working, &blurred, &mask),
                render_overlay(&mask, self.config.overlay_opacity),
            )
        };

        Ok(SegmentationOutput {
            working,
            mask,
            composite,
            overlay,
        })
    }
}
