//! Turning a raw saliency map into a full-resolution alpha mask.
//!
//! Tuning runs in a fixed order: min-max normalization, gamma boost, bilinear resize to the
//! working image, then one pass of square dilation. Values stay in `[0, 1]` throughout.

use std::collections::VecDeque;

use image::{ImageBuffer, Luma, imageops::FilterType};
use ndarray::Array2;
use rayon::prelude::*;

/// Raw network output, `height x width`.
pub type ProbabilityMap = Array2<f32>;

/// Foreground confidence per working-image pixel, in `[0, 1]`.
pub type Mask = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Rescale finite values to `[0, 1]` in place.
///
/// A flat map (or one with no finite values) becomes all zeros. Non-finite entries are
/// zeroed.
pub fn normalize_map(map: &mut ProbabilityMap) {
    let (min, max) = map
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        map.fill(0.0);
        return;
    }
    map.mapv_inplace(|v| {
        if v.is_finite() {
            ((v - min) / range).clamp(0.0, 1.0)
        } else {
            0.0
        }
    });
}

/// Raise every value to `gamma`. Values below one are boosted when `gamma < 1`.
pub fn apply_gamma(map: &mut ProbabilityMap, gamma: f32) {
    map.mapv_inplace(|v| v.powf(gamma));
}

/// Bilinearly resize the map to exactly `width x height`.
pub fn resize_mask(map: &ProbabilityMap, width: u32, height: u32) -> Mask {
    let (rows, cols) = map.dim();
    let data: Vec<f32> = map.iter().copied().collect();
    let Some(source) = Mask::from_raw(cols as u32, rows as u32, data) else {
        return Mask::new(width, height);
    };
    if (cols as u32, rows as u32) == (width, height) {
        return source;
    }
    if rows == 0 || cols == 0 {
        return Mask::new(width, height);
    }
    image::imageops::resize(&source, width, height, FilterType::Triangle)
}

/// Side of the square dilation element for a `width x height` mask.
pub fn dilation_kernel_size(width: u32, height: u32, ratio: f64, min_size: u32) -> u32 {
    let scaled = (width.min(height) as f64 * ratio).round();
    let scaled = if scaled.is_finite() && scaled > 0.0 {
        scaled as u32
    } else {
        0
    };
    scaled.max(min_size)
}

/// Grayscale dilation with a `size x size` square, one iteration.
///
/// The window for pixel `i` spans `i - size/2 ..= i + size - 1 - size/2` on each axis
/// and pixels outside the image are ignored, matching OpenCV's default anchor. The square
/// element is separable, so rows and columns are filtered independently.
pub fn dilate_mask(mask: &Mask, size: u32) -> Mask {
    let (width, height) = mask.dimensions();
    if size <= 1 || width == 0 || height == 0 {
        return mask.clone();
    }
    let before = (size / 2) as usize;
    let after = (size - 1) as usize - before;
    let (w, h) = (width as usize, height as usize);

    let mut horizontal = vec![0f32; w * h];
    horizontal
        .par_chunks_mut(w)
        .zip(mask.as_raw().par_chunks(w))
        .for_each(|(out, row)| sliding_max(row, out, before, after));

    let columns: Vec<Vec<f32>> = (0..w)
        .into_par_iter()
        .map(|x| {
            let column: Vec<f32> = (0..h).map(|y| horizontal[y * w + x]).collect();
            let mut out = vec![0f32; h];
            sliding_max(&column, &mut out, before, after);
            out
        })
        .collect();

    let mut data = vec![0f32; w * h];
    for (x, column) in columns.into_iter().enumerate() {
        for (y, value) in column.into_iter().enumerate() {
            data[y * w + x] = value;
        }
    }
    Mask::from_raw(width, height, data).unwrap_or_else(|| mask.clone())
}

/// Running maximum over `line[i - before ..= i + after]`, clipped to the line.
fn sliding_max(line: &[f32], out: &mut [f32], before: usize, after: usize) {
    let n = line.len();
    let mut window: VecDeque<usize> = VecDeque::with_capacity(before + after + 1);
    let mut next = 0;
    for i in 0..n {
        let hi = (i + after).min(n - 1);
        while next <= hi {
            while window.back().is_some_and(|&back| line[back] <= line[next]) {
                window.pop_back();
            }
            window.push_back(next);
            next += 1;
        }
        let lo = i.saturating_sub(before);
        while window.front().is_some_and(|&front| front < lo) {
            window.pop_front();
        }
        out[i] = line[window[0]];
    }
}
