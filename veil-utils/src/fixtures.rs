//! Locating optional test assets (fixture images and bundled models).
//!
//! Neither the fixtures nor the ONNX models are committed to the repository, so every
//! lookup returns `None` when the asset is absent and callers skip instead of failing.

use std::{
    env,
    path::{Path, PathBuf},
};

const FIXTURE_ENV: &str = "VEIL_FIXTURE_ROOT";
const MODEL_ENV: &str = "VEIL_MODEL_ROOT";

/// Resolve the fixtures directory from `VEIL_FIXTURE_ROOT` or the nearest `fixtures/`
/// ancestor of the crate manifest.
pub fn fixtures_dir() -> Option<PathBuf> {
    locate_dir(FIXTURE_ENV, "fixtures")
}

/// Resolve the models directory from `VEIL_MODEL_ROOT` or the nearest `models/` ancestor.
pub fn models_dir() -> Option<PathBuf> {
    locate_dir(MODEL_ENV, "models")
}

/// Path to a fixture file, if it exists.
pub fn fixture_path<P: AsRef<Path>>(relative: P) -> Option<PathBuf> {
    fixtures_dir()
        .map(|root| root.join(relative.as_ref()))
        .filter(|path| path.exists())
}

/// Path to a bundled model file, if it exists.
pub fn model_path<P: AsRef<Path>>(file_name: P) -> Option<PathBuf> {
    models_dir()
        .map(|root| root.join(file_name.as_ref()))
        .filter(|path| path.exists())
}

fn locate_dir(env_key: &str, name: &str) -> Option<PathBuf> {
    if let Ok(value) = env::var(env_key) {
        let path = PathBuf::from(value);
        return path.is_dir().then_some(path);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .map(|ancestor| ancestor.join(name))
        .find(|candidate| candidate.is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fixture_is_none() {
        assert!(fixture_path("images/definitely-missing-veil-fixture.png").is_none());
        assert!(model_path("definitely-missing.onnx").is_none());
    }
}
