use anyhow::{Context, Result};
use image::DynamicImage;
use ndarray::Axis;
use tract_onnx::prelude::Tensor;
use veil_utils::{resize_linear, rgb_to_bgr_chw, timing_guard};

use super::DetectorConfig;

/// Build the `[1, 3, S, S]` BGR blob the SSD expects.
///
/// The image is stretched to `S`x`S` with two-tap bilinear sampling, kept in raw `0..=255` range and
/// mean-subtracted per channel, matching OpenCV's `blobFromImage(img, 1.0, (S, S), mean)`.
pub fn detection_tensor(image: &DynamicImage, config: &DetectorConfig) -> Result<Tensor> {
    let _guard = timing_guard("veil_core::face::preprocess", log::Level::Debug);
    let size = config.input_size;
    let resized = resize_linear(&image.to_rgb8(), size, size);

    let mut chw = rgb_to_bgr_chw(&resized);
    for (mut channel, mean) in chw.axis_iter_mut(Axis(0)).zip(config.mean) {
        channel -= mean;
    }

    let shape = [1, 3, size as usize, size as usize];
    let (data, offset) = chw.into_raw_vec_and_offset();
    debug_assert_eq!(offset.unwrap_or(0), 0);
    Tensor::from_shape(&shape, &data).context("failed to build detection tensor")
}
