//! Shared configuration types consumed across the veil workspace.
//!
//! The settings here describe both networks, the mask tuning constants, face masking, and
//! telemetry preferences. They serialize to JSON so a single settings file can drive the CLI.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Locations of the bundled ONNX networks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelPaths {
    /// ResNet-10 SSD face detector exported to ONNX (300x300 input).
    pub detector: PathBuf,
    /// U²-Net-p saliency network (320x320 input).
    pub segmenter: PathBuf,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            detector: PathBuf::from("models/face_detection_ssd_300.onnx"),
            segmenter: PathBuf::from("models/u2netp.onnx"),
        }
    }
}

/// Face detection parameters.
///
/// The defaults reproduce the OpenCV SSD face detector setup: BGR mean subtraction and a
/// permissive confidence cut so that small faces in group photos still come through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionSettings {
    /// Detections must score strictly above this value.
    pub score_threshold: f32,
    /// Boxes wider or taller than this fraction of the image are discarded.
    pub max_box_fraction: f32,
    /// Square network input edge in pixels.
    pub input_size: u32,
    /// Per-channel mean subtracted in B, G, R order.
    pub mean: [f32; 3],
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            score_threshold: 0.3,
            max_box_fraction: 0.8,
            input_size: 300,
            mean: [104.0, 177.0, 123.0],
        }
    }
}

/// Background segmentation and compositing parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentationSettings {
    /// Longest side allowed before the source is downscaled.
    pub max_side: u32,
    /// Square network input edge in pixels.
    pub input_size: u32,
    /// Exponent applied to the normalized saliency map.
    pub gamma: f32,
    /// Dilation kernel edge as a fraction of the shorter image side.
    pub dilation_ratio: f64,
    /// Smallest dilation kernel edge in pixels.
    pub min_dilation: u32,
    /// Gaussian kernel size as a fraction of the longer image side.
    pub blur_ratio: f64,
    /// Peak opacity of the red overlay over background pixels.
    pub overlay_opacity: f32,
    /// JPEG quality used for the composite (1-100).
    pub jpeg_quality: u8,
}

impl Default for SegmentationSettings {
    fn default() -> Self {
        Self {
            max_side: 1600,
            input_size: 320,
            gamma: 0.4,
            dilation_ratio: 0.015,
            min_dilation: 5,
            blur_ratio: 0.02,
            overlay_opacity: 0.3,
            jpeg_quality: 95,
        }
    }
}

impl SegmentationSettings {
    /// Clamp values to ranges the pipeline can work with.
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            self.gamma = defaults.gamma;
        }
        if !self.dilation_ratio.is_finite() || self.dilation_ratio < 0.0 {
            self.dilation_ratio = 0.0;
        }
        if !self.blur_ratio.is_finite() || self.blur_ratio < 0.0 {
            self.blur_ratio = 0.0;
        }
        self.overlay_opacity = if self.overlay_opacity.is_finite() {
            self.overlay_opacity.clamp(0.0, 1.0)
        } else {
            defaults.overlay_opacity
        };
        self.jpeg_quality = self.jpeg_quality.clamp(1, 100);
        self.max_side = self.max_side.max(1);
        if self.input_size == 0 {
            self.input_size = defaults.input_size;
        }
    }
}

impl DetectionSettings {
    /// Clamp values to ranges the detector can work with.
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if !self.score_threshold.is_finite() {
            self.score_threshold = defaults.score_threshold;
        }
        self.max_box_fraction = if self.max_box_fraction.is_finite() {
            self.max_box_fraction.clamp(0.0, 1.0)
        } else {
            defaults.max_box_fraction
        };
        if self.input_size == 0 {
            self.input_size = defaults.input_size;
        }
    }
}

/// Face masking parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MaskingSettings {
    /// RGBA image pasted over every detected face.
    pub emoji: PathBuf,
    /// Edge of the square cover relative to the longer side of the face box.
    pub cover_scale: f32,
}

impl Default for MaskingSettings {
    fn default() -> Self {
        Self {
            emoji: PathBuf::from("assets/emoji.png"),
            cover_scale: 1.5,
        }
    }
}

impl MaskingSettings {
    pub fn sanitize(&mut self) {
        if !self.cover_scale.is_finite() || self.cover_scale <= 0.0 {
            self.cover_scale = Self::default().cover_scale;
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        parse_level_filter(&self.level).unwrap_or(LevelFilter::Debug)
    }
}

/// Parse a textual log level (`off`, `error`, `warn`, `info`, `debug`, `trace`).
pub fn parse_level_filter(value: &str) -> Option<LevelFilter> {
    match value.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// Persistent application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub models: ModelPaths,
    pub detection: DetectionSettings,
    pub segmentation: SegmentationSettings,
    pub masking: MaskingSettings,
    pub telemetry: TelemetrySettings,
}

impl AppSettings {
    /// Load settings from a JSON file. Missing keys fall back to their defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;
        settings.sanitize();
        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON, replacing any existing file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }

    pub fn sanitize(&mut self) {
        self.detection.sanitize();
        self.segmentation.sanitize();
        self.masking.sanitize();
    }
}

/// Returns the default settings location (`config/veil.json` under the working directory).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/veil.json"))
        .unwrap_or_else(|_| PathBuf::from("config/veil.json"))
}
