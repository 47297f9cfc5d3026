use std::path::{Path, PathBuf};

use log::info;
use once_cell::sync::OnceCell;
use veil_utils::config::{AppSettings, ModelPaths};

use crate::{
    error::PipelineError,
    face::{DetectorConfig, FaceDetector},
    segment::{SegmentationConfig, Segmenter},
};

/// Owns the detection and segmentation networks for the lifetime of the process.
///
/// Each network is built at most once, either eagerly through [`ModelContext::load`] or on
/// first use. After initialization the context is shared read-only between invocations.
#[derive(Debug)]
pub struct ModelContext {
    paths: ModelPaths,
    detector_config: DetectorConfig,
    segmentation_config: SegmentationConfig,
    detector: OnceCell<FaceDetector>,
    segmenter: OnceCell<Segmenter>,
}

impl ModelContext {
    /// Record model locations and settings without touching the filesystem.
    pub fn lazy(
        paths: ModelPaths,
        detector_config: DetectorConfig,
        segmentation_config: SegmentationConfig,
    ) -> Self {
        Self {
            paths,
            detector_config,
            segmentation_config,
            detector: OnceCell::new(),
            segmenter: OnceCell::new(),
        }
    }

    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::lazy(
            settings.models.clone(),
            (&settings.detection).into(),
            (&settings.segmentation).into(),
        )
    }

    /// Build the context and load both networks immediately.
    pub fn load(settings: &AppSettings) -> Result<Self, PipelineError> {
        let context = Self::from_settings(settings);
        context.detector()?;
        context.segmenter()?;
        Ok(context)
    }

    /// Install a ready-made detector, skipping model loading.
    pub fn with_detector(mut self, detector: FaceDetector) -> Self {
        self.detector = OnceCell::with_value(detector);
        self
    }

    /// Install a ready-made segmenter, skipping model loading.
    pub fn with_segmenter(mut self, segmenter: Segmenter) -> Self {
        self.segmenter = OnceCell::with_value(segmenter);
        self
    }

    pub fn paths(&self) -> &ModelPaths {
        &self.paths
    }

    /// The face detector, loading it on first call.
    pub fn detector(&self) -> Result<&FaceDetector, PipelineError> {
        self.detector.get_or_try_init(|| {
            let path = &self.paths.detector;
            info!("Loading face detection model from {}", path.display());
            FaceDetector::new(path, self.detector_config.clone())
                .map_err(|source| model_load_error(path, source))
        })
    }

    /// The segmenter, loading it on first call.
    pub fn segmenter(&self) -> Result<&Segmenter, PipelineError> {
        self.segmenter.get_or_try_init(|| {
            let path = &self.paths.segmenter;
            info!("Loading segmentation model from {}", path.display());
            Segmenter::new(path, self.segmentation_config.clone())
                .map_err(|source| model_load_error(path, source))
        })
    }

    pub fn detector_loaded(&self) -> bool {
        self.detector.get().is_some()
    }

    pub fn segmenter_loaded(&self) -> bool {
        self.segmenter.get().is_some()
    }
}

fn model_load_error(path: &Path, source: anyhow::Error) -> PipelineError {
    PipelineError::ModelLoad {
        path: PathBuf::from(path),
        source,
    }
}
