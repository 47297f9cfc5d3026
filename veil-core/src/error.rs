use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure categories surfaced by the pipeline entry points.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A model file is missing or could not be turned into a runnable graph.
    #[error("failed to load model from {path}")]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    /// The input could not be read or decoded as an image.
    #[error("failed to decode image {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    /// Anything else during inference, mask tuning, compositing or encoding.
    #[error("{stage} failed")]
    Processing {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// Stable, serializable discriminant of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ModelLoad,
    Decode,
    Processing,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::ModelLoad { .. } => ErrorKind::ModelLoad,
            PipelineError::Decode { .. } => ErrorKind::Decode,
            PipelineError::Processing { .. } => ErrorKind::Processing,
        }
    }

    pub(crate) fn processing(stage: &'static str, source: anyhow::Error) -> Self {
        PipelineError::Processing { stage, source }
    }

    /// Full message including the source chain, suitable for a response body.
    pub fn report(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}
