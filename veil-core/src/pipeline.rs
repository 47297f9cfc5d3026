//! Entry points used by collaborators (the CLI, or any request handler).
//!
//! Each function takes an input image path and runs the whole pipeline. Every failure is
//! logged and returned as a [`PipelineError`].

use std::path::{Path, PathBuf};

use image::DynamicImage;
use log::{error, info};
use serde::{Deserialize, Serialize};
use veil_utils::{
    config::MaskingSettings, load_image, save_jpeg, save_png_rgba, save_rgb, timing_guard,
};

use crate::{
    context::ModelContext,
    error::{ErrorKind, PipelineError},
    face::{FaceBox, cover_faces},
};

const BLURRED_SUFFIX: &str = "_blurred.jpg";
const MASK_SUFFIX: &str = "_mask.png";
const MASKED_SUFFIX: &str = "_masked";

/// What [`blur_background_with`] should write besides the composite.
#[derive(Debug, Clone, Copy)]
pub struct BlurOptions {
    pub write_overlay: bool,
}

impl Default for BlurOptions {
    fn default() -> Self {
        Self {
            write_overlay: true,
        }
    }
}

/// Files written by a successful blur.
#[derive(Debug, Clone, PartialEq)]
pub struct BlurReport {
    pub output: PathBuf,
    pub mask: Option<PathBuf>,
    /// File name of the overlay, for callers that expose outputs by name.
    pub mask_file_name: Option<String>,
    pub width: u32,
    pub height: u32,
}

/// How [`mask_faces_with`] sizes the cover pasted over each face.
#[derive(Debug, Clone, Copy)]
pub struct MaskOptions {
    /// Cover edge relative to the longer side of the face box.
    pub cover_scale: f32,
}

impl Default for MaskOptions {
    fn default() -> Self {
        (&MaskingSettings::default()).into()
    }
}

impl From<&MaskingSettings> for MaskOptions {
    fn from(settings: &MaskingSettings) -> Self {
        Self {
            cover_scale: settings.cover_scale,
        }
    }
}

/// Result of a successful face masking run.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskReport {
    pub output: PathBuf,
    /// Faces that were covered; empty when the input was copied through.
    pub faces: Vec<FaceBox>,
}

/// Detect faces in the image at `input`.
pub fn detect_faces<P: AsRef<Path>>(
    context: &ModelContext,
    input: P,
) -> Result<Vec<FaceBox>, PipelineError> {
    let input = input.as_ref();
    let result = run_detection(context, input);
    match &result {
        Ok(faces) => info!("Found {} face(s) in {}", faces.len(), input.display()),
        Err(err) => error!("Face detection failed for {}: {}", input.display(), err.report()),
    }
    result
}

fn run_detection(context: &ModelContext, input: &Path) -> Result<Vec<FaceBox>, PipelineError> {
    let detector = context.detector()?;
    let image = decode(input)?;
    detector
        .detect_image(&image)
        .map_err(|source| PipelineError::processing("face detection", source))
}

/// Blur the background of `input`, writing the composite JPEG to `output` and the overlay
/// PNG next to it.
pub fn blur_background<P: AsRef<Path>, Q: AsRef<Path>>(
    context: &ModelContext,
    input: P,
    output: Q,
) -> Result<BlurReport, PipelineError> {
    blur_background_with(context, input, output, &BlurOptions::default())
}

/// [`blur_background`] with explicit output options.
///
/// On failure, files written before the error are left in place; the caller owns cleanup.
pub fn blur_background_with<P: AsRef<Path>, Q: AsRef<Path>>(
    context: &ModelContext,
    input: P,
    output: Q,
    options: &BlurOptions,
) -> Result<BlurReport, PipelineError> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let result = run_blur(context, input, output, options);
    match &result {
        Ok(report) => info!(
            "Blurred background of {} into {} ({}x{})",
            input.display(),
            report.output.display(),
            report.width,
            report.height
        ),
        Err(err) => error!("Background blur failed for {}: {}", input.display(), err.report()),
    }
    result
}

fn run_blur(
    context: &ModelContext,
    input: &Path,
    output: &Path,
    options: &BlurOptions,
) -> Result<BlurReport, PipelineError> {
    let segmenter = context.segmenter()?;
    let image = decode(input)?;
    let segmented = segmenter
        .segment(&image)
        .map_err(|source| PipelineError::processing("segmentation", source))?;
    let (width, height) = segmented.dimensions();

    {
        let _guard = timing_guard("veil_core::encode_composite", log::Level::Debug);
        save_jpeg(&segmented.composite, output, segmenter.config().jpeg_quality)
            .map_err(|source| PipelineError::processing("composite encoding", source))?;
    }

    let mask = if options.write_overlay {
        let _guard = timing_guard("veil_core::encode_overlay", log::Level::Debug);
        let mask_path = overlay_path_for(output);
        save_png_rgba(&segmented.overlay, &mask_path)
            .map_err(|source| PipelineError::processing("overlay encoding", source))?;
        Some(mask_path)
    } else {
        None
    };

    let mask_file_name = mask
        .as_ref()
        .and_then(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned());

    Ok(BlurReport {
        output: output.to_path_buf(),
        mask,
        mask_file_name,
        width,
        height,
    })
}

/// Cover every face in `input` with the image at `cover` and write the result to `output`.
pub fn mask_faces<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
    context: &ModelContext,
    input: P,
    cover: Q,
    output: R,
) -> Result<MaskReport, PipelineError> {
    mask_faces_with(context, input, cover, output, &MaskOptions::default())
}

/// [`mask_faces`] with an explicit cover size.
///
/// When no face is found the input is re-encoded to `output` unchanged and `cover` is never
/// read.
pub fn mask_faces_with<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
    context: &ModelContext,
    input: P,
    cover: Q,
    output: R,
    options: &MaskOptions,
) -> Result<MaskReport, PipelineError> {
    let (input, cover, output) = (input.as_ref(), cover.as_ref(), output.as_ref());
    let result = run_mask(context, input, cover, output, options);
    match &result {
        Ok(report) if report.faces.is_empty() => info!(
            "No faces in {}; copied to {}",
            input.display(),
            report.output.display()
        ),
        Ok(report) => info!(
            "Covered {} face(s) in {} into {}",
            report.faces.len(),
            input.display(),
            report.output.display()
        ),
        Err(err) => error!("Face masking failed for {}: {}", input.display(), err.report()),
    }
    result
}

fn run_mask(
    context: &ModelContext,
    input: &Path,
    cover: &Path,
    output: &Path,
    options: &MaskOptions,
) -> Result<MaskReport, PipelineError> {
    let detector = context.detector()?;
    let image = decode(input)?;
    let faces = detector
        .detect_image(&image)
        .map_err(|source| PipelineError::processing("face detection", source))?;

    let source = image.to_rgb8();
    let masked = if faces.is_empty() {
        source
    } else {
        let cover = decode(cover)?.to_rgba8();
        cover_faces(&source, &faces, &cover, options.cover_scale)
    };

    {
        let _guard = timing_guard("veil_core::encode_masked", log::Level::Debug);
        save_rgb(&masked, output)
            .map_err(|source| PipelineError::processing("masked image encoding", source))?;
    }

    Ok(MaskReport {
        output: output.to_path_buf(),
        faces,
    })
}

fn decode(path: &Path) -> Result<DynamicImage, PipelineError> {
    let _guard = timing_guard("veil_core::decode", log::Level::Debug);
    load_image(path).map_err(|source| PipelineError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Where the overlay for a composite at `output` is written.
///
/// `photo_blurred.jpg` becomes `photo_mask.png`; any other name gets `_mask.png` appended to
/// its stem.
pub fn overlay_path_for(output: &Path) -> PathBuf {
    let file_name = output
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mask_name = match file_name.strip_suffix(BLURRED_SUFFIX) {
        Some(base) => format!("{base}{MASK_SUFFIX}"),
        None => {
            let stem = output
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string());
            format!("{stem}{MASK_SUFFIX}")
        }
    };
    output.with_file_name(mask_name)
}

/// Default composite path for `input`: `<stem>_blurred.jpg` in the same directory.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    input.with_file_name(format!("{stem}{BLURRED_SUFFIX}"))
}

/// Default masked path for `input`: `<stem>_masked.<ext>` in the same directory, PNG when
/// the input has no extension.
pub fn default_masked_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let extension = input
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    input.with_file_name(format!("{stem}{MASKED_SUFFIX}.{extension}"))
}

/// Serializable outcome of a detection request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetectResponse {
    Faces { faces: Vec<FaceBox> },
    Error { error: String, kind: ErrorKind },
}

impl From<&Result<Vec<FaceBox>, PipelineError>> for DetectResponse {
    fn from(result: &Result<Vec<FaceBox>, PipelineError>) -> Self {
        match result {
            Ok(faces) => DetectResponse::Faces {
                faces: faces.clone(),
            },
            Err(err) => DetectResponse::Error {
                error: err.report(),
                kind: err.kind(),
            },
        }
    }
}

/// Serializable outcome of a blur request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlurResponse {
    Written {
        output: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        mask: Option<String>,
    },
    Error {
        error: String,
        kind: ErrorKind,
    },
}

impl From<&Result<BlurReport, PipelineError>> for BlurResponse {
    fn from(result: &Result<BlurReport, PipelineError>) -> Self {
        match result {
            Ok(report) => BlurResponse::Written {
                output: report.output.display().to_string(),
                mask: report.mask.as_ref().map(|path| path.display().to_string()),
            },
            Err(err) => BlurResponse::Error {
                error: err.report(),
                kind: err.kind(),
            },
        }
    }
}

/// Serializable outcome of a face masking request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaskResponse {
    Written { output: String, faces: Vec<FaceBox> },
    Error { error: String, kind: ErrorKind },
}

impl From<&Result<MaskReport, PipelineError>> for MaskResponse {
    fn from(result: &Result<MaskReport, PipelineError>) -> Self {
        match result {
            Ok(report) => MaskResponse::Written {
                output: report.output.display().to_string(),
                faces: report.faces.clone(),
            },
            Err(err) => MaskResponse::Error {
                error: err.report(),
                kind: err.kind(),
            },
        }
    }
}

impl MaskResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, MaskResponse::Error { .. })
    }
}

impl DetectResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, DetectResponse::Error { .. })
    }
}

impl BlurResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, BlurResponse::Error { .. })
    }
}
