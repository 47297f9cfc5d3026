//! Face detection with a 300x300 SSD network.
//!
//! [`FaceDetector`] couples a [`DetectionNetwork`] with the resize/mean-subtraction
//! preprocessing and the confidence/size filtering that turn raw SSD rows into
//! [`FaceBox`]es in source-image pixels. [`cover_faces`] hides those boxes behind a
//! pasted image.

/// Pasting a cover image over detected faces.
pub mod cover;
/// Detector wiring and the network seam.
pub mod detector;
/// Decoding SSD output rows into face boxes.
pub mod postprocess;
/// Building the detection input tensor.
pub mod preprocess;

use serde::{Deserialize, Serialize};
use veil_utils::config::DetectionSettings;

pub use cover::{cover_faces, cover_placement};
pub use detector::{DetectionNetwork, FaceDetector, OnnxDetectionNetwork};
pub use postprocess::decode_detections;
pub use preprocess::detection_tensor;

/// Axis-aligned face rectangle in source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceBox {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Tunables for detection preprocessing and filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Square network input side.
    pub input_size: u32,
    /// Per-channel mean in BGR order, subtracted from raw `0..=255` values.
    pub mean: [f32; 3],
    /// Detections must score strictly above this.
    pub score_threshold: f32,
    /// Boxes wider or taller than this fraction of the image are discarded.
    pub max_box_fraction: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        (&DetectionSettings::default()).into()
    }
}

impl From<&DetectionSettings> for DetectorConfig {
    fn from(settings: &DetectionSettings) -> Self {
        Self {
            input_size: settings.input_size,
            mean: settings.mean,
            score_threshold: settings.score_threshold,
            max_box_fraction: settings.max_box_fraction,
        }
    }
}
