use anyhow::Result;
use tract_onnx::prelude::{Tensor, tract_ndarray::ArrayView2};

use super::{DetectorConfig, FaceBox};

const ROW_WIDTH: usize = 7;

/// Decode SSD `DetectionOutput` rows into face boxes for an image of `dimensions`.
///
/// Each row is `[image_id, label, confidence, x1, y1, x2, y2]` with corners normalized to
/// `[0, 1]`. Rows are kept in the network's order; nothing is sorted or suppressed here.
pub fn decode_detections(
    output: &Tensor,
    dimensions: (u32, u32),
    config: &DetectorConfig,
) -> Result<Vec<FaceBox>> {
    let rows = detection_rows(output)?;
    let (width, height) = dimensions;
    if width == 0 || height == 0 {
        return Ok(Vec::new());
    }
    let max_w = width as f32 * config.max_box_fraction;
    let max_h = height as f32 * config.max_box_fraction;

    let mut faces = Vec::new();
    for row in rows.rows() {
        let confidence = row[2];
        if !confidence.is_finite() || confidence <= config.score_threshold {
            continue;
        }
        let corners = [row[3], row[4], row[5], row[6]];
        if corners.iter().any(|v| !v.is_finite()) {
            continue;
        }

        let x1 = scale_edge(corners[0], width).clamp(0, width as i64 - 1);
        let y1 = scale_edge(corners[1], height).clamp(0, height as i64 - 1);
        let x2 = scale_edge(corners[2], width).min(width as i64);
        let y2 = scale_edge(corners[3], height).min(height as i64);

        let box_w = x2 - x1;
        let box_h = y2 - y1;
        if box_w <= 0 || box_h <= 0 {
            continue;
        }
        if box_w as f32 > max_w || box_h as f32 > max_h {
            continue;
        }

        faces.push(FaceBox {
            x: x1 as u32,
            y: y1 as u32,
            width: box_w as u32,
            height: box_h as u32,
        });
    }
    Ok(faces)
}

/// Scale a normalized coordinate to pixels, truncating toward zero.
fn scale_edge(normalized: f32, extent: u32) -> i64 {
    (normalized as f64 * extent as f64) as i64
}

fn detection_rows(output: &Tensor) -> Result<ArrayView2<'_, f32>> {
    let rows = match output.shape() {
        [1, 1, rows, ROW_WIDTH] => *rows,
        [rows, ROW_WIDTH] => *rows,
        other => anyhow::bail!(
            "detection output must have shape [1, 1, N, 7] or [N, 7] (got {:?})",
            other
        ),
    };
    let slice = output
        .as_slice::<f32>()
        .map_err(|e| anyhow::anyhow!("detection output is not f32: {e}"))?;
    ArrayView2::from_shape((rows, ROW_WIDTH), slice)
        .map_err(|_| anyhow::anyhow!("detection output data is not contiguous"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor_from_rows(rows: &[[f32; 7]]) -> Tensor {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Tensor::from_shape(&[1, 1, rows.len(), 7], &flat).unwrap()
    }

    fn decode(rows: &[[f32; 7]], dims: (u32, u32)) -> Vec<FaceBox> {
        decode_detections(&tensor_from_rows(rows), dims, &DetectorConfig::default()).unwrap()
    }

    #[test]
    fn keeps_confident_rows_in_native_order() {
        let faces = decode(
            &[
                [0.0, 1.0, 0.55, 0.5, 0.5, 0.625, 0.75],
                [0.0, 1.0, 0.99, 0.125, 0.25, 0.375, 0.5],
                [0.0, 1.0, 0.30, 0.0, 0.0, 0.125, 0.125],
                [0.0, 1.0, 0.10, 0.0, 0.0, 0.125, 0.125],
            ],
            (200, 100),
        );
        assert_eq!(
            faces,
            vec![
                FaceBox {
                    x: 100,
                    y: 50,
                    width: 25,
                    height: 25
                },
                FaceBox {
                    x: 25,
                    y: 25,
                    width: 50,
                    height: 25
                },
            ]
        );
    }

    #[test]
    fn clamps_boxes_to_image_bounds() {
        let faces = decode(&[[0.0, 1.0, 0.9, -0.125, -0.25, 0.25, 1.5]], (100, 100));
        // Height is clamped to the full image which then trips the size rule.
        assert!(faces.is_empty());

        let faces = decode(&[[0.0, 1.0, 0.9, 0.875, -0.0625, 1.25, 0.25]], (100, 100));
        assert_eq!(
            faces,
            vec![FaceBox {
                x: 87,
                y: 0,
                width: 13,
                height: 25
            }]
        );
        for face in &faces {
            assert!(face.right() <= 100 && face.bottom() <= 100);
        }
    }

    #[test]
    fn rejects_boxes_covering_most_of_the_image() {
        let faces = decode(
            &[
                [0.0, 1.0, 0.9, 0.0, 0.0, 0.8125, 0.5],
                [0.0, 1.0, 0.9, 0.0, 0.0, 0.5, 0.8125],
                [0.0, 1.0, 0.9, 0.125, 0.125, 0.875, 0.875],
                [0.0, 1.0, 0.9, 0.0, 0.0, 0.8, 0.25],
            ],
            (200, 200),
        );
        assert_eq!(
            faces,
            vec![
                FaceBox {
                    x: 25,
                    y: 25,
                    width: 150,
                    height: 150
                },
                FaceBox {
                    x: 0,
                    y: 0,
                    width: 160,
                    height: 50
                },
            ]
        );
    }

    #[test]
    fn skips_degenerate_and_non_finite_rows() {
        let faces = decode(
            &[
                [0.0, 1.0, 0.9, 0.5, 0.5, 0.5, 0.625],
                [0.0, 1.0, 0.9, 0.625, 0.5, 0.375, 0.625],
                [0.0, 1.0, f32::NAN, 0.125, 0.125, 0.25, 0.25],
                [0.0, 1.0, 0.9, f32::INFINITY, 0.125, 0.25, 0.25],
            ],
            (100, 100),
        );
        assert!(faces.is_empty());
    }

    #[test]
    fn empty_output_is_not_an_error() {
        let tensor = Tensor::from_shape::<f32>(&[1, 1, 0, 7], &[]).unwrap();
        let faces = decode_detections(&tensor, (64, 64), &DetectorConfig::default()).unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn rejects_unexpected_shape() {
        let tensor = Tensor::from_shape(&[1, 15], &[0f32; 15]).unwrap();
        let err = decode_detections(&tensor, (64, 64), &DetectorConfig::default())
            .expect_err("bad shape");
        assert!(err.to_string().contains("[1, 1, N, 7]"));
    }
}
