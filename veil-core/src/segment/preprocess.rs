use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage};
use log::debug;
use tract_onnx::prelude::Tensor;
use veil_utils::{fit_within, resize_area, resize_linear, rgb_to_normalized_chw, timing_guard};

/// ImageNet channel statistics in RGB order.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Convert to RGB and cap the longer side at `max_side` with area averaging.
///
/// Images that already fit are returned at their original size.
pub fn working_image(image: &DynamicImage, max_side: u32) -> RgbImage {
    let rgb = image.to_rgb8();
    match fit_within(rgb.dimensions(), max_side) {
        Some((width, height)) => {
            let _guard = timing_guard("veil_core::segment::downscale", log::Level::Debug);
            debug!(
                "Downscaling {}x{} to {width}x{height} before segmentation",
                rgb.width(),
                rgb.height()
            );
            resize_area(&rgb, width, height)
        }
        None => rgb,
    }
}

/// Build the `[1, 3, S, S]` ImageNet-normalized RGB tensor for the segmentation network.
pub fn segmentation_tensor(working: &RgbImage, input_size: u32) -> Result<Tensor> {
    let _guard = timing_guard("veil_core::segment::preprocess", log::Level::Debug);
    let resized = resize_linear(working, input_size, input_size);
    let chw = rgb_to_normalized_chw(&resized, IMAGENET_MEAN, IMAGENET_STD);

    let shape = [1, 3, input_size as usize, input_size as usize];
    let (data, offset) = chw.into_raw_vec_and_offset();
    debug_assert_eq!(offset.unwrap_or(0), 0);
    Tensor::from_shape(&shape, &data).context("failed to build segmentation tensor")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb};

    #[test]
    fn large_images_are_capped() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2000, 1000, Rgb([1, 2, 3])));
        let working = working_image(&image, 1600);
        assert_eq!(working.dimensions(), (1600, 800));
        assert_eq!(working.get_pixel(800, 400), &Rgb([1, 2, 3]));
    }

    #[test]
    fn small_and_grayscale_images_are_converted_only() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(30, 20, Luma([77])));
        let working = working_image(&image, 1600);
        assert_eq!(working.dimensions(), (30, 20));
        assert_eq!(working.get_pixel(0, 0), &Rgb([77, 77, 77]));
    }

    #[test]
    fn tensor_is_rgb_imagenet_normalized() {
        let working = RgbImage::from_pixel(64, 48, Rgb([255, 0, 128]));
        let tensor = segmentation_tensor(&working, 16).expect("tensor");
        assert_eq!(tensor.shape(), &[1, 3, 16, 16]);

        let view = tensor.to_array_view::<f32>().expect("f32 view");
        let expected_r = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let expected_g = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        assert!((view[[0, 0, 5, 5]] - expected_r).abs() < 1e-5);
        assert!((view[[0, 1, 5, 5]] - expected_g).abs() < 1e-5);
    }
}
