//! Configuration loading and CLI override logic.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{info, warn};
use veil_utils::{
    config::{AppSettings, default_settings_path, parse_level_filter},
    normalize_path,
};

use crate::args::{BlurArgs, CommonArgs, DetectArgs, MaskArgs};

/// Load application settings from a file or use defaults.
pub fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        let settings = AppSettings::load_from_path(&resolved)?;
        info!("Loaded settings from {}", resolved.display());
        Ok(settings)
    } else {
        let default_path = default_settings_path();
        if default_path.exists() {
            let settings = AppSettings::load_from_path(&default_path).with_context(|| {
                format!(
                    "failed to load default settings from {}",
                    default_path.display()
                )
            })?;
            info!("Loaded settings from {}", default_path.display());
            Ok(settings)
        } else {
            Ok(AppSettings::default())
        }
    }
}

/// Apply the telemetry flags shared by all subcommands.
pub fn apply_common_overrides(settings: &mut AppSettings, args: &CommonArgs) {
    if args.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = args.telemetry_level.as_ref() {
        let normalized = level.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return;
        }
        if parse_level_filter(&normalized).is_none() {
            warn!("Ignoring unknown telemetry level '{level}'");
            return;
        }
        if normalized == "off" {
            settings.telemetry.enabled = false;
        }
        settings.telemetry.level = normalized;
    }
}

pub fn apply_detect_overrides(settings: &mut AppSettings, args: &DetectArgs) {
    if let Some(model) = args.model.as_ref() {
        settings.models.detector = model.clone();
    }
    if let Some(score) = args.score_threshold {
        settings.detection.score_threshold = score;
    }
    if let Some(fraction) = args.max_box_fraction {
        settings.detection.max_box_fraction = fraction;
    }
    settings.sanitize();
}

pub fn apply_blur_overrides(settings: &mut AppSettings, args: &BlurArgs) {
    if let Some(model) = args.segmentation_model.as_ref() {
        settings.models.segmenter = model.clone();
    }
    let seg = &mut settings.segmentation;
    if let Some(max_side) = args.max_side {
        seg.max_side = max_side;
    }
    if let Some(gamma) = args.gamma {
        seg.gamma = gamma;
    }
    if let Some(ratio) = args.dilation_ratio {
        seg.dilation_ratio = ratio;
    }
    if let Some(ratio) = args.blur_ratio {
        seg.blur_ratio = ratio;
    }
    if let Some(opacity) = args.overlay_opacity {
        seg.overlay_opacity = opacity;
    }
    if let Some(quality) = args.jpeg_quality {
        seg.jpeg_quality = quality;
    }
    settings.sanitize();
}

pub fn apply_mask_overrides(settings: &mut AppSettings, args: &MaskArgs) {
    if let Some(model) = args.model.as_ref() {
        settings.models.detector = model.clone();
    }
    if let Some(emoji) = args.emoji.as_ref() {
        settings.masking.emoji = emoji.clone();
    }
    if let Some(score) = args.score_threshold {
        settings.detection.score_threshold = score;
    }
    if let Some(scale) = args.cover_scale {
        settings.masking.cover_scale = scale;
    }
    settings.sanitize();
}
