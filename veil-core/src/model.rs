use std::{fmt, path::Path};

use anyhow::{Context, Result};
use log::{debug, warn};
use tract_onnx::prelude::*;

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A fixed-input ONNX graph prepared for repeated CPU inference.
///
/// The graph's input is pinned to `[1, 3, height, width]` so exports with symbolic batch or
/// spatial dimensions still optimize into a concrete plan.
pub struct OnnxModel {
    runnable: RunnableModel,
    input_shape: [usize; 4],
    label: &'static str,
}

impl fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxModel")
            .field("label", &self.label)
            .field("input_shape", &self.input_shape)
            .finish()
    }
}

impl OnnxModel {
    /// Load and optimize an ONNX graph for a square `size`x`size` RGB input.
    ///
    /// When the optimizer rejects the graph the model is retried as a decluttered (slower)
    /// plan before giving up.
    pub fn load<P: AsRef<Path>>(model_path: P, size: u32, label: &'static str) -> Result<Self> {
        let path = model_path.as_ref();
        anyhow::ensure!(
            path.is_file(),
            "{label} model file not found: {}",
            path.display()
        );
        let input_shape = [1, 3, size as usize, size as usize];

        let runnable = match load_runnable_model(path, input_shape, true) {
            Ok(model) => {
                debug!(
                    "{label} model {} optimized for input {:?}",
                    path.display(),
                    input_shape
                );
                model
            }
            Err(opt_err) => {
                warn!(
                    "{label} model {} failed optimized load ({opt_err:#}); falling back to decluttered graph",
                    path.display()
                );
                load_runnable_model(path, input_shape, false).with_context(|| {
                    format!("fallback to decluttered {label} graph failed after optimize error: {opt_err}")
                })?
            }
        };

        Ok(Self {
            runnable,
            input_shape,
            label,
        })
    }

    /// Run a forward pass and return every output tensor in graph order.
    pub fn run(&self, input: Tensor) -> Result<Vec<Tensor>> {
        anyhow::ensure!(
            input.shape() == self.input_shape,
            "{} input must have shape {:?}, got {:?}",
            self.label,
            self.input_shape,
            input.shape()
        );
        let outputs = self
            .runnable
            .run(tvec![input.into()])
            .with_context(|| format!("{} execution failed", self.label))?;
        anyhow::ensure!(!outputs.is_empty(), "{} model produced no outputs", self.label);
        Ok(outputs.into_iter().map(|value| value.into_tensor()).collect())
    }

    pub fn input_shape(&self) -> [usize; 4] {
        self.input_shape
    }
}

fn load_runnable_model(path: &Path, input_shape: [usize; 4], optimized: bool) -> Result<RunnableModel> {
    let model = tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("failed to parse ONNX graph from {}", path.display()))?
        .with_input_fact(0, f32::fact(input_shape).into())
        .context("failed to pin ONNX input shape")?;

    if optimized {
        model
            .into_optimized()
            .context("unable to optimize graph")?
            .into_runnable()
            .context("unable to make graph runnable")
    } else {
        model
            .into_typed()
            .context("unable to type-check graph")?
            .into_decluttered()
            .context("unable to declutter graph")?
            .into_runnable()
            .context("unable to make graph runnable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loading_missing_model_fails() {
        let err = OnnxModel::load("missing.onnx", 320, "segmentation").expect_err("missing");
        assert!(format!("{err}").contains("model file not found"));
    }

    #[test]
    fn invalid_model_produces_useful_error() {
        let mut temp = NamedTempFile::new().expect("temp file");
        temp.write_all(b"not a real onnx file")
            .expect("write mock model");

        let err = OnnxModel::load(temp.path(), 300, "face detection")
            .expect_err("invalid ONNX should fail");
        let message = format!("{err:#}");
        assert!(
            message.contains("failed to parse ONNX") || message.contains("decluttered"),
            "Unexpected error message: {message}"
        );
    }
}
