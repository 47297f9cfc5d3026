use image::{RgbImage, RgbaImage, imageops};
use veil_utils::timing_guard;

use super::FaceBox;

/// Where a square cover for `face` goes: top-left corner (may lie outside the image) and
/// edge length.
///
/// The square is `trunc(max(width, height) * scale)` wide and centred on the box centre.
/// Returns `None` when the square would be empty.
pub fn cover_placement(face: &FaceBox, scale: f32) -> Option<(i64, i64, u32)> {
    let edge = (face.width.max(face.height) as f32 * scale) as u32;
    if edge == 0 {
        return None;
    }
    let centre_x = i64::from(face.x + face.width / 2);
    let centre_y = i64::from(face.y + face.height / 2);
    let half = i64::from(edge / 2);
    Some((centre_x - half, centre_y - half, edge))
}

/// Paste `cover` over every face, resized with Lanczos and blended through its alpha.
///
/// Parts of a cover that fall outside the image are clipped.
pub fn cover_faces(image: &RgbImage, faces: &[FaceBox], cover: &RgbaImage, scale: f32) -> RgbImage {
    let _guard = timing_guard("veil_core::face::cover", log::Level::Debug);
    let mut canvas = RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        image::Rgba([r, g, b, 255])
    });

    for face in faces {
        let Some((left, top, edge)) = cover_placement(face, scale) else {
            continue;
        };
        let resized = imageops::resize(cover, edge, edge, imageops::FilterType::Lanczos3);
        imageops::overlay(&mut canvas, &resized, left, top);
    }

    RgbImage::from_fn(canvas.width(), canvas.height(), |x, y| {
        let [r, g, b, _] = canvas.get_pixel(x, y).0;
        image::Rgb([r, g, b])
    })
}
