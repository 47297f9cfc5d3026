use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageReader, Rgb, RgbImage, imageops::FilterType};
use ndarray::Array3;

/// Load an image from disk, sniffing the format from its contents.
///
/// Uploaded files frequently carry a missing or misleading extension, so the decoder is
/// chosen from the file's magic bytes rather than its name.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path_ref = path.as_ref();
    ImageReader::open(path_ref)
        .with_context(|| format!("failed to open image {}", path_ref.display()))?
        .with_guessed_format()
        .with_context(|| format!("failed to read image header {}", path_ref.display()))?
        .decode()
        .with_context(|| format!("failed to decode image {}", path_ref.display()))
}

/// Bilinear resize with OpenCV's `INTER_LINEAR` sampling.
///
/// Each output pixel maps back to `(dst + 0.5) * scale - 0.5` and blends exactly two
/// neighbours per axis, clamped at the borders. Unlike `FilterType::Triangle` the window
/// does not widen when shrinking, so this is what a network trained on `cv2.resize`
/// inputs expects.
pub fn resize_linear(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (src_w, src_h) = image.dimensions();
    if (src_w, src_h) == (width, height) {
        return image.clone();
    }
    if src_w == 0 || src_h == 0 || width == 0 || height == 0 {
        return RgbImage::new(width, height);
    }

    let x_taps = linear_taps(src_w, width);
    let y_taps = linear_taps(src_h, height);
    RgbImage::from_fn(width, height, |x, y| {
        let (x0, x1, fx) = x_taps[x as usize];
        let (y0, y1, fy) = y_taps[y as usize];
        let (p00, p01) = (image.get_pixel(x0, y0), image.get_pixel(x1, y0));
        let (p10, p11) = (image.get_pixel(x0, y1), image.get_pixel(x1, y1));
        Rgb(std::array::from_fn(|c| {
            let top = p00[c] as f32 * (1.0 - fx) + p01[c] as f32 * fx;
            let bottom = p10[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
            (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
        }))
    })
}

/// Left neighbour, right neighbour and right weight for each output index.
fn linear_taps(src: u32, dst: u32) -> Vec<(u32, u32, f32)> {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|i| {
            let pos = (i as f64 + 0.5) * scale - 0.5;
            if pos <= 0.0 {
                return (0, 0, 0.0);
            }
            let left = pos.floor() as u32;
            if left >= src - 1 {
                return (src - 1, src - 1, 0.0);
            }
            (left, left + 1, (pos - left as f64) as f32)
        })
        .collect()
}

/// Downscale an RGB image by averaging the source area covered by each output pixel.
///
/// This matches OpenCV's `INTER_AREA` for shrinking: every output pixel is the
/// coverage-weighted mean of the source pixels under its footprint. Requests that do not
/// shrink either axis fall back to bilinear filtering.
pub fn resize_area(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (src_w, src_h) = image.dimensions();
    if (src_w, src_h) == (width, height) {
        return image.clone();
    }
    if width > src_w || height > src_h || width == 0 || height == 0 {
        return image::imageops::resize(image, width, height, FilterType::Triangle);
    }

    let x_taps = area_taps(src_w, width);
    let y_taps = area_taps(src_h, height);
    let src = image.as_raw();
    let src_stride = src_w as usize * 3;
    let dst_w = width as usize;

    // Horizontal pass into an f32 buffer of width `dst_w` and the original height.
    let mut horizontal = vec![0f32; dst_w * 3 * src_h as usize];
    for (row_in, row_out) in src
        .chunks_exact(src_stride)
        .zip(horizontal.chunks_exact_mut(dst_w * 3))
    {
        for (x, taps) in x_taps.iter().enumerate() {
            let mut acc = [0f32; 3];
            for &(sx, weight) in taps {
                let px = &row_in[sx * 3..sx * 3 + 3];
                acc[0] += px[0] as f32 * weight;
                acc[1] += px[1] as f32 * weight;
                acc[2] += px[2] as f32 * weight;
            }
            row_out[x * 3..x * 3 + 3].copy_from_slice(&acc);
        }
    }

    let mut out = RgbImage::new(width, height);
    for (row_out, taps) in out.chunks_exact_mut(dst_w * 3).zip(y_taps.iter()) {
        let mut acc = vec![0f32; dst_w * 3];
        for &(sy, weight) in taps {
            let row = &horizontal[sy * dst_w * 3..(sy + 1) * dst_w * 3];
            for (a, v) in acc.iter_mut().zip(row) {
                *a += v * weight;
            }
        }
        for (dst, value) in row_out.iter_mut().zip(acc) {
            *dst = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Coverage weights for each output index when shrinking `src` samples down to `dst`.
fn area_taps(src: u32, dst: u32) -> Vec<Vec<(usize, f32)>> {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|i| {
            let start = i as f64 * scale;
            let end = (start + scale).min(src as f64);
            let mut taps = Vec::with_capacity(scale.ceil() as usize + 1);
            let mut j = start.floor() as usize;
            while (j as f64) < end && j < src as usize {
                let covered = end.min(j as f64 + 1.0) - start.max(j as f64);
                if covered > 1e-9 {
                    taps.push((j, (covered / scale) as f32));
                }
                j += 1;
            }
            taps
        })
        .collect()
}

/// Convert an RGB image into a BGR CHW array with raw `0..=255` values, matching OpenCV's
/// `blobFromImage` layout.
pub fn rgb_to_bgr_chw(image: &RgbImage) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let mut array = Array3::<f32>::zeros((3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        let (xi, yi) = (x as usize, y as usize);
        array[(0, yi, xi)] = pixel[2] as f32;
        array[(1, yi, xi)] = pixel[1] as f32;
        array[(2, yi, xi)] = pixel[0] as f32;
    }
    array
}

/// Convert an RGB image into an RGB CHW array scaled to `[0, 1]` and normalized per channel
/// as `(value - mean) / std`.
pub fn rgb_to_normalized_chw(image: &RgbImage, mean: [f32; 3], std: [f32; 3]) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let mut array = Array3::<f32>::zeros((3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        let (xi, yi) = (x as usize, y as usize);
        for c in 0..3 {
            array[(c, yi, xi)] = (pixel[c] as f32 / 255.0 - mean[c]) / std[c];
        }
    }
    array
}

/// Scale `(width, height)` so the longer side is at most `max_side`.
///
/// Returns `None` when the image already fits. New dimensions are truncated, never below one.
pub fn fit_within(dimensions: (u32, u32), max_side: u32) -> Option<(u32, u32)> {
    let (w, h) = dimensions;
    let longest = w.max(h);
    if longest <= max_side || longest == 0 {
        return None;
    }
    let scale = max_side as f64 / longest as f64;
    let new_w = ((w as f64 * scale) as u32).max(1);
    let new_h = ((h as f64 * scale) as u32).max(1);
    Some((new_w, new_h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_to_bgr_chw_converts_correctly() {
        let mut image = RgbImage::new(2, 2);
        image.put_pixel(0, 0, Rgb([0, 128, 255]));
        image.put_pixel(1, 0, Rgb([255, 128, 0]));
        image.put_pixel(0, 1, Rgb([64, 64, 64]));
        image.put_pixel(1, 1, Rgb([255, 255, 255]));

        let array = rgb_to_bgr_chw(&image);
        assert_eq!(array.shape(), &[3, 2, 2]);
        assert_eq!(array[(0, 0, 0)], 255.0);
        assert_eq!(array[(2, 0, 0)], 0.0);
        assert_eq!(array[(1, 0, 1)], 128.0);
    }

    #[test]
    fn normalized_chw_applies_mean_and_std() {
        let image = RgbImage::from_pixel(1, 1, Rgb([255, 0, 51]));
        let array = rgb_to_normalized_chw(&image, [0.5, 0.0, 0.2], [0.5, 1.0, 0.1]);
        assert!((array[(0, 0, 0)] - 1.0).abs() < 1e-6);
        assert!(array[(1, 0, 0)].abs() < 1e-6);
        assert!((array[(2, 0, 0)] - 0.0).abs() < 1e-5);
    }

    #[test]
    fn fit_within_caps_the_long_side() {
        assert_eq!(fit_within((2000, 1000), 1600), Some((1600, 800)));
        assert_eq!(fit_within((1000, 3000), 1600), Some((533, 1600)));
        assert_eq!(fit_within((1600, 900), 1600), None);
        assert_eq!(fit_within((10_000, 1), 1600), Some((1600, 1)));
    }

    #[test]
    fn resize_linear_uses_two_taps_when_shrinking() {
        let mut image = RgbImage::new(4, 1);
        for (x, v) in [0u8, 100, 200, 250].into_iter().enumerate() {
            image.put_pixel(x as u32, 0, Rgb([v, v, v]));
        }
        let out = resize_linear(&image, 2, 1);
        assert_eq!(out.get_pixel(0, 0).0, [50, 50, 50]);
        assert_eq!(out.get_pixel(1, 0).0, [225, 225, 225]);
    }

    #[test]
    fn resize_linear_clamps_at_borders_when_growing() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(1, 0, Rgb([100, 100, 100]));
        let out = resize_linear(&image, 4, 2);
        let row: Vec<u8> = (0..4).map(|x| out.get_pixel(x, 1)[0]).collect();
        assert_eq!(row, vec![0, 25, 75, 100]);
    }

    #[test]
    fn resize_area_averages_blocks() {
        let mut image = RgbImage::new(4, 2);
        for x in 0..4 {
            for y in 0..2 {
                let v = if x < 2 { 0 } else { 200 };
                image.put_pixel(x, y, Rgb([v, v / 2, 10]));
            }
        }
        let out = resize_area(&image, 2, 1);
        assert_eq!(out.dimensions(), (2, 1));
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 10]);
        assert_eq!(out.get_pixel(1, 0).0, [200, 100, 10]);
    }

    #[test]
    fn resize_area_handles_fractional_scales() {
        let image = RgbImage::from_pixel(5, 5, Rgb([90, 90, 90]));
        let out = resize_area(&image, 3, 2);
        assert_eq!(out.dimensions(), (3, 2));
        assert!(out.pixels().all(|p| p.0 == [90, 90, 90]));
    }
}
