//! Input collection: files, directories and stdin uploads.

use std::{
    io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, info};
use veil_utils::{ScratchUpload, normalize_path};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];
const STDIN_MARKER: &str = "-";

/// One image to process.
#[derive(Debug)]
pub struct InputImage {
    /// Where the bytes live on disk.
    pub path: PathBuf,
    /// Name reported back to the user.
    pub label: String,
}

/// Resolved inputs. Holds the stdin upload alive until processing finishes.
#[derive(Debug)]
pub struct InputSet {
    pub images: Vec<InputImage>,
    upload: Option<ScratchUpload>,
}

impl InputSet {
    pub fn is_upload(&self) -> bool {
        self.upload.is_some()
    }

    /// The only image, for subcommands that take exactly one.
    pub fn single(&self) -> Result<&InputImage> {
        match self.images.as_slice() {
            [image] => Ok(image),
            images => anyhow::bail!(
                "expected a single image, but the input resolved to {} images",
                images.len()
            ),
        }
    }
}

pub fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == STDIN_MARKER
}

/// Resolve `--input` into images. `-` spools stdin into a temp file removed on drop.
pub fn resolve_inputs(input: &Path) -> Result<InputSet> {
    if is_stdin(input) {
        let upload = read_stdin_upload()?;
        let images = vec![InputImage {
            path: upload.path().to_path_buf(),
            label: STDIN_MARKER.to_string(),
        }];
        return Ok(InputSet {
            images,
            upload: Some(upload),
        });
    }

    let resolved = normalize_path(input)?;
    let images = collect_images(&resolved)?;
    if images.is_empty() {
        anyhow::bail!(
            "no images found at {} (supported extensions: {})",
            resolved.display(),
            IMAGE_EXTENSIONS.join(", ")
        );
    }
    info!("Processing {} image(s)...", images.len());
    Ok(InputSet {
        images: images
            .into_iter()
            .map(|path| InputImage {
                label: path.display().to_string(),
                path,
            })
            .collect(),
        upload: None,
    })
}

fn read_stdin_upload() -> Result<ScratchUpload> {
    let stdin = io::stdin();
    let upload = ScratchUpload::from_reader(stdin.lock()).context("failed to read image from stdin")?;
    anyhow::ensure!(!upload.is_empty(), "no image data received on stdin");
    info!("Received {} byte upload on stdin", upload.len());
    Ok(upload)
}

/// Collect all image paths from a file or directory.
pub fn collect_images(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    if !path.is_dir() {
        anyhow::bail!(
            "input path is neither file nor directory: {}",
            path.display()
        );
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        if let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) {
            let ext_lower = ext.to_ascii_lowercase();
            if IMAGE_EXTENSIONS.contains(&ext_lower.as_str()) {
                images.push(entry.path().to_path_buf());
            } else {
                debug!("Skipping non-image file {}", entry.path().display());
            }
        }
    }
    images.sort();
    Ok(images)
}
