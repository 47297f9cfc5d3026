//! `veil-cli detect`: face boxes for one or many images.

use std::{fs::File, io::BufWriter, path::Path};

use anyhow::{Context, Result};
use log::{error, info, warn};
use serde::Serialize;
use veil_core::{DetectResponse, FaceBox, ModelContext, PipelineError, detect_faces};
use veil_utils::{config::AppSettings, ensure_parent_dir};

use crate::{
    annotate::{annotate_image, annotated_file_name},
    args::DetectArgs,
    input::resolve_inputs,
};

#[derive(Debug, Serialize)]
struct DetectRecord {
    image: String,
    #[serde(flatten)]
    response: DetectResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    annotated: Option<String>,
}

/// Run detection and report per-image results. Returns `false` when any image failed.
pub fn run(args: &DetectArgs, settings: &AppSettings) -> Result<bool> {
    let context = ModelContext::from_settings(settings);
    // The detector is loaded before any input is touched so a bad model aborts the run.
    if let Err(err) = context.detector() {
        error!("{}", err.report());
        let failed: Result<Vec<FaceBox>, PipelineError> = Err(err);
        let record = DetectRecord {
            image: args.input.display().to_string(),
            response: DetectResponse::from(&failed),
            annotated: None,
        };
        write_records(&[record], args.json.as_deref())?;
        return Ok(false);
    }

    let inputs = resolve_inputs(&args.input)?;
    let mut all_ok = true;
    let mut records = Vec::with_capacity(inputs.images.len());
    for image in &inputs.images {
        let result = detect_faces(&context, &image.path);
        all_ok &= result.is_ok();

        let annotated = match (&result, args.annotate.as_ref()) {
            (Ok(faces), Some(dir)) => {
                let name = annotated_file_name(&image.path, inputs.is_upload());
                match annotate_image(&image.path, faces, dir, &name) {
                    Ok(path) => {
                        info!("Annotated image saved to {}", path.display());
                        Some(path.display().to_string())
                    }
                    Err(err) => {
                        warn!("Failed to annotate {}: {err:#}", image.label);
                        None
                    }
                }
            }
            _ => None,
        };

        records.push(DetectRecord {
            image: image.label.clone(),
            response: DetectResponse::from(&result),
            annotated,
        });
    }

    write_records(&records, args.json.as_deref())?;
    Ok(all_ok)
}

fn write_records(records: &[DetectRecord], json_path: Option<&Path>) -> Result<()> {
    if let Some(json_path) = json_path {
        ensure_parent_dir(json_path)?;
        let file = File::create(json_path)
            .with_context(|| format!("failed to create {}", json_path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), records).with_context(|| {
            format!("failed to write detection JSON to {}", json_path.display())
        })?;
        info!("Wrote detections to {}", json_path.display());
    } else {
        let json =
            serde_json::to_string_pretty(records).context("failed to serialize detections")?;
        println!("{json}");
    }
    Ok(())
}
