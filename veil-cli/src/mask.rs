//! `veil-cli mask`: cover every detected face with an image.

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::error;
use veil_core::{
    MaskOptions, MaskReport, MaskResponse, ModelContext, PipelineError, default_masked_path,
    mask_faces_with,
};
use veil_utils::{OutputGuard, config::AppSettings};

use crate::{
    args::MaskArgs,
    input::{is_stdin, resolve_inputs},
};

/// Mask one image and print the response. Returns `false` when the pipeline failed.
pub fn run(args: &MaskArgs, settings: &AppSettings) -> Result<bool> {
    let output = resolve_output(&args.input, args.output.as_deref())?;
    let options = MaskOptions::from(&settings.masking);

    let context = ModelContext::from_settings(settings);
    if let Err(err) = context.detector() {
        error!("{}", err.report());
        let failed: Result<MaskReport, PipelineError> = Err(err);
        print_response(&MaskResponse::from(&failed))?;
        return Ok(false);
    }

    let inputs = resolve_inputs(&args.input)?;
    let image = inputs.single()?;

    let mut guard = OutputGuard::new();
    guard.track_new(&output);

    let result = mask_faces_with(
        &context,
        &image.path,
        &settings.masking.emoji,
        &output,
        &options,
    );
    let response = MaskResponse::from(&result);
    if result.is_ok() {
        guard.commit();
    }
    drop(inputs);

    print_response(&response)?;
    Ok(!response.is_error())
}

fn resolve_output(input: &Path, output: Option<&Path>) -> Result<PathBuf> {
    match output {
        Some(path) => Ok(path.to_path_buf()),
        None if is_stdin(input) => {
            anyhow::bail!("--output is required when reading the image from stdin")
        }
        None => Ok(default_masked_path(input)),
    }
}

fn print_response(response: &MaskResponse) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}
