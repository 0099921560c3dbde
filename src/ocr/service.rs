//! Process-wide text recovery unit.
//!
//! Owns at most one recognition engine. The engine is created on the first
//! call; callers that arrive while creation is pending wait on the same
//! initialization instead of starting their own.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info, warn};

use super::backend::{OcrEngine, OcrEngineFactory, OcrError};

/// Lazily-initialized, shared OCR engine.
pub struct OcrService {
    factory: Arc<dyn OcrEngineFactory>,
    language: String,
    /// Recognition is serialized per engine instance.
    engine: OnceCell<Mutex<Box<dyn OcrEngine>>>,
}

impl OcrService {
    pub fn new(factory: Arc<dyn OcrEngineFactory>, language: impl Into<String>) -> Self {
        Self {
            factory,
            language: language.into(),
            engine: OnceCell::new(),
        }
    }

    /// Whether the engine has been created.
    pub fn is_initialized(&self) -> bool {
        self.engine.initialized()
    }

    async fn engine(&self) -> Result<&Mutex<Box<dyn OcrEngine>>, OcrError> {
        self.engine
            .get_or_try_init(|| async {
                let start = Instant::now();
                let engine = self.factory.create(&self.language).await?;
                info!(
                    engine = %self.factory.kind(),
                    language = %self.language,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "OCR engine initialized"
                );
                Ok(Mutex::new(engine))
            })
            .await
    }

    /// Recover text from an encoded image.
    ///
    /// An image without recognizable text yields `Ok("")`.
    pub async fn extract_text(&self, image: &[u8]) -> Result<String, OcrError> {
        let result = async {
            let engine = self.engine().await?;
            let engine = engine.lock().await;
            engine.recognize(image).await
        }
        .await;

        match result {
            Ok(text) => {
                debug!(chars = text.len(), "OCR completed");
                Ok(text)
            }
            Err(e) => {
                error!(error = %e, "OCR service failed");
                Err(e)
            }
        }
    }

    /// Release the engine if one was created. Failures are logged only.
    pub async fn shutdown(&self) {
        let Some(engine) = self.engine.get() else {
            return;
        };
        let engine = engine.lock().await;
        match engine.terminate().await {
            Ok(()) => debug!("OCR engine terminated"),
            Err(e) => warn!(error = %e, "Failed to terminate OCR engine"),
        }
    }
}
