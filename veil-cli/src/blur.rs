//! `veil-cli blur`: background blur composite plus mask overlay for one image.

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::error;
use veil_core::{
    BlurOptions, BlurReport, BlurResponse, ModelContext, PipelineError, blur_background_with,
    default_output_path, overlay_path_for,
};
use veil_utils::{OutputGuard, config::AppSettings};

use crate::{
    args::BlurArgs,
    input::{is_stdin, resolve_inputs},
};

/// Blur one image and print the response. Returns `false` when the pipeline failed.
pub fn run(args: &BlurArgs, settings: &AppSettings) -> Result<bool> {
    let output = resolve_output(&args.input, args.output.as_deref())?;
    let options = BlurOptions {
        write_overlay: !args.no_overlay,
    };

    let context = ModelContext::from_settings(settings);
    if let Err(err) = context.segmenter() {
        error!("{}", err.report());
        let failed: Result<BlurReport, PipelineError> = Err(err);
        print_response(&BlurResponse::from(&failed))?;
        return Ok(false);
    }

    let inputs = resolve_inputs(&args.input)?;
    let image = inputs.single()?;

    let mut guard = OutputGuard::new();
    guard.track_new(&output);
    if options.write_overlay {
        guard.track_new(overlay_path_for(&output));
    }

    let result = blur_background_with(&context, &image.path, &output, &options);
    let response = BlurResponse::from(&result);
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
        None => Ok(default_output_path(input)),
    }
}

fn print_response(response: &BlurResponse) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_defaults_next_to_input() {
        assert_eq!(
            resolve_output(Path::new("shots/cat.png"), None).unwrap(),
            PathBuf::from("shots/cat_blurred.jpg")
        );
        assert_eq!(
            resolve_output(Path::new("shots/cat.png"), Some(Path::new("out.jpg"))).unwrap(),
            PathBuf::from("out.jpg")
        );
        assert!(resolve_output(Path::new("-"), None).is_err());
    }
}
