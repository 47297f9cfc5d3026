//! Core face detection and background blur pipeline.
//!
//! This crate loads ONNX networks with `tract-onnx`. It detects faces with an SSD detector
//! and can cover them with a pasted image. A saliency network separates subject from
//! background, and its output drives a mask-weighted blur composite.

/// Shared model store with one-time initialization.
pub mod context;
/// Pipeline error type.
pub mod error;
/// Face detection.
pub mod face;
/// ONNX model loading and execution.
pub mod model;
/// Boundary functions and response payloads.
pub mod pipeline;
/// Segmentation, mask tuning and compositing.
pub mod segment;

pub use context::ModelContext;
pub use error::{ErrorKind, PipelineError};
pub use face::{
    DetectionNetwork, DetectorConfig, FaceBox, FaceDetector, OnnxDetectionNetwork, cover_faces,
};
pub use model::OnnxModel;
pub use pipeline::{
    BlurOptions, BlurReport, BlurResponse, DetectResponse, MaskOptions, MaskReport, MaskResponse,
    blur_background, blur_background_with, default_masked_path, default_output_path,
    detect_faces, mask_faces, mask_faces_with, overlay_path_for,
};
pub use segment::{
    Mask, OnnxSegmentationNetwork, ProbabilityMap, SegmentationConfig, SegmentationNetwork,
    SegmentationOutput, Segmenter,
};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
