//! Encoders for the pipeline's output artifacts.
//!
//! The composite is always written as JPEG with an explicit quality, the overlay as PNG so
//! its alpha channel survives. Masked faces keep whatever format their file name asks for.

use anyhow::{Context, Result};
use image::{
    ExtendedColorType, ImageEncoder, RgbImage, RgbaImage,
    codecs::{
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType, PngEncoder},
    },
};
use log::debug;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

/// Write an RGB image as JPEG. `quality` is clamped to `1..=100`.
pub fn save_jpeg(image: &RgbImage, destination: &Path, quality: u8) -> Result<()> {
    ensure_parent_dir(destination)?;
    let quality = quality.clamp(1, 100);
    debug!(
        "Encoding {}x{} JPEG (q={quality}) to {}",
        image.width(),
        image.height(),
        destination.display()
    );

    let mut writer = create_writer(destination)?;
    JpegEncoder::new_with_quality(&mut writer, quality)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .with_context(|| format!("failed to encode JPEG {}", destination.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", destination.display()))
}

/// Write an RGBA image as PNG, preserving transparency.
pub fn save_png_rgba(image: &RgbaImage, destination: &Path) -> Result<()> {
    ensure_parent_dir(destination)?;
    debug!(
        "Encoding {}x{} PNG to {}",
        image.width(),
        image.height(),
        destination.display()
    );

    let mut writer = create_writer(destination)?;
    PngEncoder::new_with_quality(&mut writer, CompressionType::Default, FilterType::Adaptive)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )
        .with_context(|| format!("failed to encode PNG {}", destination.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", destination.display()))
}

/// Write an RGB image in the format implied by the extension of `destination`.
pub fn save_rgb(image: &RgbImage, destination: &Path) -> Result<()> {
    ensure_parent_dir(destination)?;
    debug!(
        "Encoding {}x{} image to {}",
        image.width(),
        image.height(),
        destination.display()
    );
    image
        .save(destination)
        .with_context(|| format!("failed to encode {}", destination.display()))
}

fn create_writer(destination: &Path) -> Result<BufWriter<File>> {
    let file = File::create(destination)
        .with_context(|| format!("failed to create {}", destination.display()))?;
    Ok(BufWriter::new(file))
}

/// Create the parent directory of `destination` when it does not exist yet.
pub fn ensure_parent_dir(destination: &Path) -> Result<()> {
    if let Some(parent) = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty() && !p.exists())
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};
    use tempfile::tempdir;

    #[test]
    fn jpeg_round_trips_dimensions() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested/out.jpg");
        let image = RgbImage::from_pixel(17, 9, Rgb([200, 40, 10]));
        save_jpeg(&image, &path, 95).expect("save jpeg");

        let decoded = image::open(&path).expect("decode").to_rgb8();
        assert_eq!(decoded.dimensions(), (17, 9));
    }

    #[test]
    fn rgb_format_follows_extension() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("copy/photo_masked.png");
        let image = RgbImage::from_fn(6, 3, |x, y| Rgb([x as u8 * 40, y as u8 * 80, 7]));
        save_rgb(&image, &path).expect("save png");

        let decoded = image::open(&path).expect("decode").to_rgb8();
        assert_eq!(decoded, image);
        assert!(save_rgb(&image, &dir.path().join("photo.unknown")).is_err());
    }

    #[test]
    fn png_keeps_alpha_exactly() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("mask.png");
        let mut image = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 77]));
        image.put_pixel(1, 1, Rgba([255, 0, 0, 0]));
        save_png_rgba(&image, &path).expect("save png");

        let decoded = image::open(&path).expect("decode").to_rgba8();
        assert_eq!(decoded.as_raw(), image.as_raw());
    }
}
