use std::error::Error;
use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use image::{Rgb, RgbImage};
use serde_json::Value;
use tempfile::tempdir;
use veil_utils::model_path;

#[test]
fn help_lists_subcommands() {
    let output = cargo_bin_cmd!("veil-cli").arg("--help").output().unwrap();
    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    assert!(help.contains("detect"));
    assert!(help.contains("blur"));
    assert!(help.contains("mask"));
}

#[test]
fn blur_with_missing_model_fails_without_outputs() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let input = work_dir.path().join("portrait.png");
    RgbImage::from_pixel(48, 32, Rgb([120, 80, 40])).save(&input)?;

    let output = cargo_bin_cmd!("veil-cli")
        .current_dir(work_dir.path())
        .arg("blur")
        .arg("--input")
        .arg(&input)
        .arg("--segmentation-model")
        .arg(work_dir.path().join("missing.onnx"))
        .output()?;

    assert!(!output.status.success());
    let response: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(response["kind"], "model_load");
    assert!(response["error"].as_str().unwrap_or_default().contains("missing.onnx"));
    assert!(!work_dir.path().join("portrait_blurred.jpg").exists());
    assert!(!work_dir.path().join("portrait_mask.png").exists());
    Ok(())
}

#[test]
fn detect_with_missing_model_writes_error_json() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let json_path = work_dir.path().join("out/faces.json");

    let mut cmd = cargo_bin_cmd!("veil-cli");
    cmd.current_dir(work_dir.path())
        .arg("detect")
        .arg("--input")
        .arg("-")
        .arg("--model")
        .arg("nowhere/detector.onnx")
        .arg("--json")
        .arg(&json_path)
        .write_stdin("not an image");
    cmd.assert().failure();

    let records: Value = serde_json::from_str(&fs::read_to_string(&json_path)?)?;
    assert_eq!(records[0]["image"], "-");
    assert_eq!(records[0]["kind"], "model_load");
    Ok(())
}

#[test]
fn blur_from_stdin_requires_output() {
    let mut cmd = cargo_bin_cmd!("veil-cli");
    cmd.arg("blur").arg("--input").arg("-").write_stdin("bytes");
    cmd.assert().failure();
}

#[test]
fn mask_with_missing_model_reports_model_load() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let input = work_dir.path().join("group.jpg");
    RgbImage::from_pixel(40, 30, Rgb([90, 120, 150])).save(&input)?;

    let output = cargo_bin_cmd!("veil-cli")
        .current_dir(work_dir.path())
        .arg("mask")
        .arg("-i")
        .arg(&input)
        .arg("--model")
        .arg("gone/detector.onnx")
        .arg("--emoji")
        .arg("gone/emoji.png")
        .output()?;

    assert!(!output.status.success());
    let response: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(response["kind"], "model_load");
    assert!(!work_dir.path().join("group_masked.jpg").exists());
    Ok(())
}

#[test]
fn mask_from_stdin_requires_output() {
    let mut cmd = cargo_bin_cmd!("veil-cli");
    cmd.arg("mask").arg("-i").arg("-").write_stdin("bytes");
    cmd.assert().failure();
}

#[test]
fn blur_with_bundled_model_writes_composite_and_mask() -> Result<(), Box<dyn Error>> {
    let Some(model) = model_path("u2netp.onnx") else {
        eprintln!("Skipping test: segmentation model not found");
        return Ok(());
    };

    let work_dir = tempdir()?;
    let input = work_dir.path().join("scene.png");
    RgbImage::from_fn(320, 240, |x, y| {
        if (100..220).contains(&x) && (40..220).contains(&y) {
            Rgb([200, 150, 120])
        } else {
            Rgb([((x * 7) % 255) as u8, ((y * 5) % 255) as u8, 90])
        }
    })
    .save(&input)?;

    let output = cargo_bin_cmd!("veil-cli")
        .current_dir(work_dir.path())
        .arg("blur")
        .arg("-i")
        .arg(&input)
        .arg("--segmentation-model")
        .arg(&model)
        .output()?;
    assert!(output.status.success());

    let response: Value = serde_json::from_slice(&output.stdout)?;
    let composite = work_dir.path().join("scene_blurred.jpg");
    let mask = work_dir.path().join("scene_mask.png");
    assert_eq!(response["output"], composite.display().to_string());
    assert_eq!(response["mask"], mask.display().to_string());

    let overlay = image::open(&mask)?.to_rgba8();
    assert_eq!(overlay.dimensions(), (320, 240));
    assert_eq!(image::open(&composite)?.to_rgb8().dimensions(), (320, 240));
    Ok(())
}
