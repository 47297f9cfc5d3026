//! Command-line argument definitions for veil-cli.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// Detect faces and blur photo backgrounds with bundled ONNX models.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every subcommand.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Optional settings JSON. Defaults to `config/veil.json` when present, otherwise built-in parameters.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, global = true, value_name = "LEVEL")]
    pub telemetry_level: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Find face bounding boxes in images.
    Detect(DetectArgs),
    /// Blur the background behind the main subject of an image.
    Blur(BlurArgs),
    /// Paste an image over every detected face.
    Mask(MaskArgs),
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Image file, directory of images, or `-` to read one image from stdin.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Path to the face detection ONNX model (overrides settings).
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Override the minimum detection confidence.
    #[arg(long)]
    pub score_threshold: Option<f32>,

    /// Override the largest allowed face size as a fraction of the image side.
    #[arg(long)]
    pub max_box_fraction: Option<f32>,

    /// Write detections to a JSON file instead of stdout.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Directory to write annotated images with bounding boxes overlaid.
    #[arg(long)]
    pub annotate: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct BlurArgs {
    /// Image file, or `-` to read the image from stdin.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Composite JPEG path. Defaults to `<stem>_blurred.jpg` next to the input.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Path to the segmentation ONNX model (overrides settings).
    #[arg(long)]
    pub segmentation_model: Option<PathBuf>,

    /// Longest side processed; larger images are downscaled first.
    #[arg(long)]
    pub max_side: Option<u32>,

    /// Exponent applied to the normalized mask (below 1 widens the subject).
    #[arg(long)]
    pub gamma: Option<f32>,

    /// Dilation kernel as a fraction of the shorter image side.
    #[arg(long)]
    pub dilation_ratio: Option<f64>,

    /// Gaussian kernel as a fraction of the longer image side.
    #[arg(long)]
    pub blur_ratio: Option<f64>,

    /// Peak opacity of the red background overlay (0-1).
    #[arg(long)]
    pub overlay_opacity: Option<f32>,

    /// JPEG quality for the composite (1-100).
    #[arg(long)]
    pub jpeg_quality: Option<u8>,

    /// Skip writing the `_mask.png` overlay.
    #[arg(long = "no-overlay", action = ArgAction::SetTrue)]
    pub no_overlay: bool,
}

#[derive(Debug, Args)]
pub struct MaskArgs {
    /// Image file, or `-` to read the image from stdin.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output path. Defaults to `<stem>_masked.<ext>` next to the input.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// RGBA image pasted over each face (overrides settings).
    #[arg(long)]
    pub emoji: Option<PathBuf>,

    /// Path to the face detection ONNX model (overrides settings).
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Override the minimum detection confidence.
    #[arg(long)]
    pub score_threshold: Option<f32>,

    /// Cover edge relative to the longer side of each face box.
    #[arg(long)]
    pub cover_scale: Option<f32>,
}
