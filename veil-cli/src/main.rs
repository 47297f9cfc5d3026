//! Command-line front end for the veil face detection, face masking and background blur
//! pipeline.

mod annotate;
mod args;
mod blur;
mod config;
mod detect;
mod input;
mod mask;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug};
use veil_utils::{configure_telemetry, init_logging};

use crate::{
    args::{Cli, Command},
    config::{
        apply_blur_overrides, apply_common_overrides, apply_detect_overrides,
        apply_mask_overrides, load_settings,
    },
};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let level = match cli.common.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    init_logging(level)?;
    debug!("veil-core {}", veil_core::version());

    let mut settings = load_settings(cli.common.config.as_ref())?;
    apply_common_overrides(&mut settings, &cli.common);

    let succeeded = match &cli.command {
        Command::Detect(args) => {
            apply_detect_overrides(&mut settings, args);
            configure_telemetry(settings.telemetry.enabled, settings.telemetry.level_filter());
            detect::run(args, &settings)?
        }
        Command::Blur(args) => {
            apply_blur_overrides(&mut settings, args);
            configure_telemetry(settings.telemetry.enabled, settings.telemetry.level_filter());
            blur::run(args, &settings)?
        }
        Command::Mask(args) => {
            apply_mask_overrides(&mut settings, args);
            configure_telemetry(settings.telemetry.enabled, settings.telemetry.level_filter());
            mask::run(args, &settings)?
        }
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
