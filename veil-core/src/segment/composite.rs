use image::{ImageBuffer, Rgb, RgbImage, Rgba, RgbaImage, imageops};
use imageproc::filter::separable_filter_equal;
use rayon::prelude::*;

use super::mask::Mask;

/// Float RGB raster holding raw `0..=255` values.
pub type RgbF32Image = ImageBuffer<Rgb<f32>, Vec<f32>>;

// OpenCV's fixed kernels for small odd sizes when sigma is derived from the size.
const SMALL_KERNELS: [&[f32]; 4] = [
    &[1.0],
    &[0.25, 0.5, 0.25],
    &[0.0625, 0.25, 0.375, 0.25, 0.0625],
    &[
        0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125,
    ],
];

/// Odd Gaussian kernel size for a `width x height` image: `trunc(max side * ratio) | 1`.
pub fn blur_kernel_size(width: u32, height: u32, ratio: f64) -> u32 {
    let scaled = width.max(height) as f64 * ratio;
    let scaled = if scaled.is_finite() && scaled > 0.0 {
        scaled as u32
    } else {
        0
    };
    scaled | 1
}

/// Sigma OpenCV derives when asked for a Gaussian of odd `size` with `sigma = 0`.
pub fn sigma_for_kernel(size: u32) -> f32 {
    0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1D Gaussian weights of odd length `size`.
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    let size = size.max(1) | 1;
    if size <= 7 {
        return SMALL_KERNELS[(size / 2) as usize].to_vec();
    }

    let sigma = sigma_for_kernel(size) as f64;
    let center = (size / 2) as f64;
    let weights: Vec<f64> = (0..size)
        .map(|i| {
            let d = i as f64 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| (w / total) as f32).collect()
}

/// Gaussian blur with a `size x size` kernel.
///
/// Borders reflect around the edge pixel without repeating it (`gfedcb|abcdefgh|gfedcba`),
/// which is OpenCV's default. The result stays in floating point so compositing rounds only
/// once.
pub fn gaussian_blur(image: &RgbImage, size: u32) -> RgbF32Image {
    let (width, height) = image.dimensions();
    if size <= 1 || width == 0 || height == 0 {
        return RgbF32Image::from_fn(width, height, |x, y| to_f32(image.get_pixel(x, y)));
    }
    let kernel = gaussian_kernel(size);
    let pad = kernel.len() as u32 / 2;

    let padded = RgbF32Image::from_fn(width + 2 * pad, height + 2 * pad, |x, y| {
        let sx = reflect_101(x as i64 - pad as i64, width);
        let sy = reflect_101(y as i64 - pad as i64, height);
        to_f32(image.get_pixel(sx, sy))
    });
    let filtered = separable_filter_equal(&padded, &kernel);
    imageops::crop_imm(&filtered, pad, pad, width, height).to_image()
}

fn to_f32(pixel: &Rgb<u8>) -> Rgb<f32> {
    Rgb(pixel.0.map(f32::from))
}

/// Map `index` into `0..len` by mirroring around the first and last samples.
fn reflect_101(index: i64, len: u32) -> u32 {
    if len <= 1 {
        return 0;
    }
    let len = len as i64;
    let period = 2 * (len - 1);
    let wrapped = index.rem_euclid(period);
    let mirrored = if wrapped >= len { period - wrapped } else { wrapped };
    mirrored as u32
}

/// Per pixel and channel, `round(src * m + blurred * (1 - m))`.
///
/// All three inputs must share the same dimensions.
pub fn composite(source: &RgbImage, blurred: &RgbF32Image, mask: &Mask) -> RgbImage {
    let (width, height) = source.dimensions();
    debug_assert_eq!(blurred.dimensions(), (width, height));
    debug_assert_eq!(mask.dimensions(), (width, height));

    let mut out = RgbImage::new(width, height);
    let row_len = width as usize * 3;
    if row_len == 0 {
        return out;
    }
    out.par_chunks_mut(row_len)
        .zip(source.as_raw().par_chunks(row_len))
        .zip(blurred.as_raw().par_chunks(row_len))
        .zip(mask.as_raw().par_chunks(width as usize))
        .for_each(|(((dst, src), blur), alpha)| {
            for (x, &m) in alpha.iter().enumerate() {
                let m = m.clamp(0.0, 1.0);
                for c in 0..3 {
                    let i = x * 3 + c;
                    let value = src[i] as f32 * m + blur[i] * (1.0 - m);
                    dst[i] = value.round().clamp(0.0, 255.0) as u8;
                }
            }
        });
    out
}

/// Red RGBA raster whose alpha is `(1 - m) * opacity * 255`, truncated.
///
/// Foreground stays transparent and background is tinted.
pub fn render_overlay(mask: &Mask, opacity: f32) -> RgbaImage {
    let opacity = opacity.clamp(0.0, 1.0);
    let (width, height) = mask.dimensions();
    RgbaImage::from_fn(width, height, |x, y| {
        let m = mask.get_pixel(x, y)[0].clamp(0.0, 1.0);
        let alpha = ((1.0 - m) * opacity * 255.0).clamp(0.0, 255.0) as u8;
        Rgba([255, 0, 0, alpha])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn checkerboard(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([250, 240, 230])
            } else {
                Rgb([10, 20, 30])
            }
        })
    }

    #[test]
    fn kernel_size_is_always_odd() {
        assert_eq!(blur_kernel_size(1600, 800, 0.02), 33);
        assert_eq!(blur_kernel_size(1000, 500, 0.02), 21);
        assert_eq!(blur_kernel_size(60, 40, 0.02), 1);
        assert_eq!(blur_kernel_size(640, 480, 0.0), 1);
        assert_eq!(blur_kernel_size(1200, 100, 0.02) % 2, 1);
    }

    #[test]
    fn kernels_are_normalized_and_symmetric() {
        for size in [1, 3, 5, 7, 9, 21, 33] {
            let kernel = gaussian_kernel(size);
            assert_eq!(kernel.len(), size as usize);
            let total: f32 = kernel.iter().sum();
            assert!((total - 1.0).abs() < 1e-5, "size {size} sums to {total}");
            for i in 0..kernel.len() / 2 {
                assert!((kernel[i] - kernel[kernel.len() - 1 - i]).abs() < 1e-7);
            }
        }
        assert!((sigma_for_kernel(33) - 5.3).abs() < 1e-5);
    }

    #[test]
    fn blur_preserves_uniform_images() {
        let image = RgbImage::from_pixel(40, 30, Rgb([120, 60, 200]));
        let blurred = gaussian_blur(&image, 9);
        for pixel in blurred.pixels() {
            assert!((pixel[0] - 120.0).abs() < 1e-3);
            assert!((pixel[1] - 60.0).abs() < 1e-3);
            assert!((pixel[2] - 200.0).abs() < 1e-3);
        }
    }

    #[test]
    fn blur_reflects_around_edge_pixels() {
        let mut image = RgbImage::new(5, 1);
        image.put_pixel(0, 0, Rgb([255, 255, 255]));
        let blurred = gaussian_blur(&image, 3);

        assert_eq!(blurred.dimensions(), (5, 1));
        assert!((blurred.get_pixel(0, 0)[0] - 127.5).abs() < 1e-3);
        assert!((blurred.get_pixel(1, 0)[0] - 63.75).abs() < 1e-3);
        assert!(blurred.get_pixel(2, 0)[0].abs() < 1e-3);
    }

    #[test]
    fn reflection_mirrors_without_repeating_the_edge() {
        let mapped: Vec<u32> = (-3..8).map(|i| reflect_101(i, 5)).collect();
        assert_eq!(mapped, vec![3, 2, 1, 0, 1, 2, 3, 4, 3, 2, 1]);
        assert_eq!(reflect_101(-2, 1), 0);
        assert_eq!(reflect_101(4, 2), 0);
    }

    #[test]
    fn full_mask_keeps_source_and_empty_mask_keeps_blur() {
        let source = checkerboard(32, 24);
        let blurred = gaussian_blur(&source, 9);

        let opaque = Mask::from_pixel(32, 24, Luma([1.0]));
        assert_eq!(composite(&source, &blurred, &opaque), source);

        let empty = Mask::new(32, 24);
        let background = composite(&source, &blurred, &empty);
        for (out, blur) in background.as_raw().iter().zip(blurred.as_raw()) {
            assert_eq!(*out, blur.round() as u8);
        }
        assert_ne!(background, source);
    }

    #[test]
    fn composite_blends_halfway() {
        let source = RgbImage::from_pixel(2, 1, Rgb([200, 100, 0]));
        let blurred = RgbF32Image::from_pixel(2, 1, Rgb([100.0, 0.0, 50.0]));
        let mask = Mask::from_pixel(2, 1, Luma([0.5]));
        let out = composite(&source, &blurred, &mask);
        assert_eq!(out.get_pixel(0, 0), &Rgb([150, 50, 25]));
    }

    #[test]
    fn overlay_alpha_tracks_background() {
        let mut mask = Mask::new(3, 1);
        mask.put_pixel(0, 0, Luma([1.0]));
        mask.put_pixel(1, 0, Luma([0.5]));
        let overlay = render_overlay(&mask, 0.3);

        assert_eq!(overlay.get_pixel(0, 0), &Rgba([255, 0, 0, 0]));
        assert_eq!(overlay.get_pixel(1, 0), &Rgba([255, 0, 0, 38]));
        assert_eq!(overlay.get_pixel(2, 0), &Rgba([255, 0, 0, 76]));
    }
}
