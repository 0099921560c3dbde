//! Text recovery from receipt images.
//!
//! - **Tesseract**: command-line OCR, the default engine
//! - **OCRS**: pure Rust OCR from on-disk models (feature: ocr-ocrs)
//!
//! [`OcrService`] owns the single process-wide engine and creates it lazily.

mod backend;
mod model_utils;
mod service;
mod tesseract;

#[cfg(feature = "ocr-ocrs")]
mod ocrs_backend;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::OcrSettings;

pub use backend::{OcrEngine, OcrEngineFactory, OcrEngineKind, OcrError};
pub use service::OcrService;
pub use tesseract::TesseractFactory;

#[cfg(feature = "ocr-ocrs")]
pub use ocrs_backend::OcrsFactory;

/// Build the factory for a configured engine kind.
pub fn engine_factory(
    kind: OcrEngineKind,
    model_dir: Option<PathBuf>,
) -> Result<Arc<dyn OcrEngineFactory>, OcrError> {
    match kind {
        OcrEngineKind::Tesseract => {
            let _ = model_dir;
            Ok(Arc::new(TesseractFactory::new()))
        }
        #[cfg(feature = "ocr-ocrs")]
        OcrEngineKind::Ocrs => Ok(Arc::new(OcrsFactory::new(model_dir))),
        #[cfg(not(feature = "ocr-ocrs"))]
        OcrEngineKind::Ocrs => Err(OcrError::BackendNotAvailable(
            "OCRS support not compiled in (rebuild with --features ocr-ocrs)".to_string(),
        )),
    }
}

/// Build the shared OCR service from settings. No engine is started yet.
pub fn service_from_settings(settings: &OcrSettings) -> Result<OcrService, OcrError> {
    let factory = engine_factory(settings.engine, settings.model_dir.clone())?;
    if !factory.is_available() {
        tracing::warn!(
            engine = %settings.engine,
            hint = %factory.availability_hint(),
            "OCR engine not available; extraction requests will fail"
        );
    }
    Ok(OcrService::new(factory, &settings.language))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tesseract_factory_kind() {
        let factory = engine_factory(OcrEngineKind::Tesseract, None).unwrap();
        assert_eq!(factory.kind(), OcrEngineKind::Tesseract);
    }

    #[cfg(not(feature = "ocr-ocrs"))]
    #[test]
    fn test_ocrs_requires_feature() {
        let result = engine_factory(OcrEngineKind::Ocrs, None);
        assert!(matches!(result, Err(OcrError::BackendNotAvailable(_))));
    }
}
