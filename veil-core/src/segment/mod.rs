//! Foreground segmentation and background blur.
//!
//! A saliency network (U²-Net-p) scores every pixel of a downscaled copy of the image. The
//! score map is tuned into a soft mask that decides, per pixel, how much of the sharp
//! source survives over a Gaussian-blurred copy.

/// Sharp/blurred blending and the red mask overlay.
pub mod composite;
/// Probability map normalization, gamma, resize and dilation.
pub mod mask;
/// Working-image downscale and network input tensor.
pub mod preprocess;
/// Segmenter wiring and the network seam.
pub mod segmenter;

use veil_utils::config::SegmentationSettings;

pub use composite::{
    RgbF32Image, blur_kernel_size, composite, gaussian_blur, gaussian_kernel, render_overlay,
};
pub use mask::{
    Mask, ProbabilityMap, apply_gamma, dilate_mask, dilation_kernel_size, normalize_map,
    resize_mask,
};
pub use preprocess::{segmentation_tensor, working_image};
pub use segmenter::{
    OnnxSegmentationNetwork, SegmentationNetwork, SegmentationOutput, Segmenter, probability_map,
};

/// Mask tuning and compositing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationConfig {
    pub max_side: u32,
    pub input_size: u32,
    pub gamma: f32,
    pub dilation_ratio: f64,
    pub min_dilation: u32,
    pub blur_ratio: f64,
    pub overlay_opacity: f32,
    /// Quality for the encoded composite.
    pub jpeg_quality: u8,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        (&SegmentationSettings::default()).into()
    }
}

impl From<&SegmentationSettings> for SegmentationConfig {
    fn from(settings: &SegmentationSettings) -> Self {
        Self {
            max_side: settings.max_side,
            input_size: settings.input_size,
            gamma: settings.gamma,
            dilation_ratio: settings.dilation_ratio,
            min_dilation: settings.min_dilation,
            blur_ratio: settings.blur_ratio,
            overlay_opacity: settings.overlay_opacity,
            jpeg_quality: settings.jpeg_quality,
        }
    }
}
