//! OCRS engine (pure Rust, feature `ocr-ocrs`).
//!
//! Models are not downloaded at runtime; `text-detection.rten` and
//! `text-recognition.rten` must already be present in the model directory.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::backend::{OcrEngine, OcrEngineFactory, OcrEngineKind, OcrError};
use super::model_utils::ModelDirConfig;

const MODEL_CONFIG: ModelDirConfig = ModelDirConfig {
    subdir: "ocrs",
    required_files: &["text-detection.rten", "text-recognition.rten"],
};

/// Creates OCRS engines from on-disk models.
#[derive(Debug, Clone, Default)]
pub struct OcrsFactory {
    model_dir: Option<PathBuf>,
}

impl OcrsFactory {
    pub fn new(model_dir: Option<PathBuf>) -> Self {
        Self { model_dir }
    }

    fn find_model_dir(&self) -> Option<PathBuf> {
        MODEL_CONFIG.find(self.model_dir.as_deref())
    }
}

#[async_trait]
impl OcrEngineFactory for OcrsFactory {
    fn kind(&self) -> OcrEngineKind {
        OcrEngineKind::Ocrs
    }

    fn is_available(&self) -> bool {
        self.find_model_dir().is_some()
    }

    fn availability_hint(&self) -> String {
        match self.find_model_dir() {
            Some(path) => format!("OCRS models found at {:?}", path),
            None => format!(
                "OCRS models not found. Place {} in {:?}",
                MODEL_CONFIG.required_files.join(" and "),
                self.model_dir
                    .clone()
                    .unwrap_or_else(|| MODEL_CONFIG.default_dir())
            ),
        }
    }

    /// OCRS models are language-agnostic (Latin script); the language is ignored.
    async fn create(&self, _language: &str) -> Result<Box<dyn OcrEngine>, OcrError> {
        let model_dir = self
            .find_model_dir()
            .ok_or_else(|| OcrError::BackendNotAvailable(self.availability_hint()))?;

        let engine = tokio::task::spawn_blocking(move || {
            let detection_model = rten::Model::load_file(model_dir.join("text-detection.rten"))
                .map_err(|e| {
                    OcrError::OcrFailed(format!("Failed to load detection model: {}", e))
                })?;
            let recognition_model =
                rten::Model::load_file(model_dir.join("text-recognition.rten")).map_err(|e| {
                    OcrError::OcrFailed(format!("Failed to load recognition model: {}", e))
                })?;

            ocrs::OcrEngine::new(ocrs::OcrEngineParams {
                detection_model: Some(detection_model),
                recognition_model: Some(recognition_model),
                ..Default::default()
            })
            .map_err(|e| OcrError::OcrFailed(format!("Failed to create OCR engine: {}", e)))
        })
        .await
        .map_err(|e| OcrError::OcrFailed(format!("OCR init task failed: {}", e)))??;

        Ok(Box::new(OcrsEngine {
            engine: Arc::new(engine),
        }))
    }
}

pub struct OcrsEngine {
    engine: Arc<ocrs::OcrEngine>,
}

fn recognize_blocking(engine: &ocrs::OcrEngine, image: &[u8]) -> Result<String, OcrError> {
    let img = image::load_from_memory(image)
        .map_err(|e| OcrError::ImageError(format!("Failed to decode image: {}", e)))?;
    let rgb_img = img.to_rgb8();
    let (width, height) = rgb_img.dimensions();

    let img_source = ocrs::ImageSource::from_bytes(rgb_img.as_raw(), (width, height))
        .map_err(|e| OcrError::ImageError(format!("Failed to convert image: {}", e)))?;
    let input = engine
        .prepare_input(img_source)
        .map_err(|e| OcrError::OcrFailed(format!("Failed to prepare input: {}", e)))?;

    engine
        .get_text(&input)
        .map_err(|e| OcrError::OcrFailed(format!("Failed to extract text: {}", e)))
}

#[async_trait]
impl OcrEngine for OcrsEngine {
    async fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
        let engine = self.engine.clone();
        let image = image.to_vec();
        let text = tokio::task::spawn_blocking(move || recognize_blocking(&engine, &image))
            .await
            .map_err(|e| OcrError::OcrFailed(format!("OCR task failed: {}", e)))??;
        Ok(text.trim().to_string())
    }

    async fn terminate(&self) -> Result<(), OcrError> {
        Ok(())
    }
}
