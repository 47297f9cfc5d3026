//! Drawing detected face boxes onto a copy of the input.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use image::Rgba;
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use veil_core::FaceBox;
use veil_utils::load_image;

const BOX_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);

/// Draw `faces` on the image at `image_path` and save it into `output_dir` as `file_name`.
pub fn annotate_image(
    image_path: &Path,
    faces: &[FaceBox],
    output_dir: &Path,
    file_name: &str,
) -> Result<PathBuf> {
    let mut image = load_image(image_path)?.to_rgba8();
    let (img_w, img_h) = image.dimensions();

    if img_w == 0 || img_h == 0 {
        anyhow::bail!(
            "cannot annotate image with zero dimensions: {}",
            image_path.display()
        );
    }

    let thickness = (img_w.min(img_h) / 300).max(1);
    for face in faces {
        for inset in 0..thickness {
            if let Some(rect) = inset_rect(face, inset) {
                draw_hollow_rect_mut(&mut image, rect, BOX_COLOR);
            }
        }
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let output_path = output_dir.join(file_name);
    image
        .save(&output_path)
        .with_context(|| format!("failed to save annotated image {}", output_path.display()))?;

    Ok(output_path)
}

/// Output file name for an annotated copy of `label`; stdin uploads become `stdin.png`.
pub fn annotated_file_name(image_path: &Path, is_upload: bool) -> String {
    if is_upload {
        return "stdin.png".to_string();
    }
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    format!("{stem}_faces.png")
}

/// Face rectangle shrunk by `inset` pixels on every side.
fn inset_rect(face: &FaceBox, inset: u32) -> Option<Rect> {
    let width = face.width.checked_sub(inset * 2)?;
    let height = face.height.checked_sub(inset * 2)?;
    if width == 0 || height == 0 {
        return None;
    }
    Some(Rect::at((face.x + inset) as i32, (face.y + inset) as i32).of_size(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use tempfile::tempdir;

    #[test]
    fn draws_box_outline() {
        let dir = tempdir().expect("tempdir");
        let source = dir.path().join("scene.png");
        RgbImage::new(40, 30).save(&source).expect("write source");

        let face = FaceBox {
            x: 5,
            y: 5,
            width: 10,
            height: 8,
        };
        let out = annotate_image(
            &source,
            &[face],
            &dir.path().join("annotated"),
            &annotated_file_name(&source, false),
        )
        .expect("annotate");

        assert_eq!(out.file_name().unwrap(), "scene_faces.png");
        let drawn = image::open(&out).expect("decode").to_rgba8();
        assert_eq!(drawn.get_pixel(5, 5), &BOX_COLOR);
        assert_eq!(drawn.get_pixel(14, 12), &BOX_COLOR);
        assert_eq!(drawn.get_pixel(10, 9), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn inset_collapses_small_boxes() {
        let face = FaceBox {
            x: 0,
            y: 0,
            width: 2,
            height: 2,
        };
        assert!(inset_rect(&face, 1).is_none());
        assert!(inset_rect(&face, 0).is_some());
    }
}
