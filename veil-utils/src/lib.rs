//! Common helpers shared across the veil crates.

/// Application configuration and settings management.
pub mod config;
/// Locating optional fixtures and bundled models for tests.
pub mod fixtures;
/// Image loading, resizing, and tensor layout conversion.
pub mod image_utils;
/// JPEG/PNG encoders for pipeline outputs.
pub mod output;
/// Temp upload files and output cleanup guards.
pub mod scratch;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;

use std::path::Path;

use anyhow::Result;
use log::LevelFilter;

pub use fixtures::{fixture_path, fixtures_dir, model_path, models_dir};
pub use image_utils::{
    fit_within, load_image, resize_area, resize_linear, rgb_to_bgr_chw, rgb_to_normalized_chw,
};
pub use output::{ensure_parent_dir, save_jpeg, save_png_rgba, save_rgb};
pub use scratch::{OutputGuard, ScratchUpload};
pub use telemetry::{
    TELEMETRY_TARGET, TimingGuard, configure as configure_telemetry, telemetry_allows,
    telemetry_enabled, timing_guard,
};

/// Initialize logging once for the CLI.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies. Telemetry entries are
/// always let through at the logger level and gated by [`telemetry::configure`] instead.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module(TELEMETRY_TARGET, LevelFilter::Trace);

    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<std::path::PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    Ok(path.canonicalize()?)
}
