//! OCR engine abstraction.
//!
//! An engine is created once by its factory (loading language data or
//! models) and then reused for every recognition call.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from OCR engines.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(String),
}

/// Available OCR engine types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OcrEngineKind {
    /// Tesseract via command-line.
    #[default]
    Tesseract,
    /// Pure Rust OCR engine (ocrs crate, feature `ocr-ocrs`).
    Ocrs,
}

impl OcrEngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrEngineKind::Tesseract => "tesseract",
            OcrEngineKind::Ocrs => "ocrs",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tesseract" => Some(OcrEngineKind::Tesseract),
            "ocrs" => Some(OcrEngineKind::Ocrs),
            _ => None,
        }
    }
}

impl std::fmt::Display for OcrEngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An initialized recognition engine.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize text in an encoded image (PNG, JPEG).
    ///
    /// Returns an empty string when the engine ran but found no text.
    async fn recognize(&self, image: &[u8]) -> Result<String, OcrError>;

    /// Release engine resources. Called once at process shutdown.
    async fn terminate(&self) -> Result<(), OcrError>;
}

/// Builds engines. Construction is the expensive step the OCR service memoizes.
#[async_trait]
pub trait OcrEngineFactory: Send + Sync {
    fn kind(&self) -> OcrEngineKind;

    /// Check if this engine can be created (binaries installed, models present).
    fn is_available(&self) -> bool;

    /// Get a description of what's needed to make this engine available.
    fn availability_hint(&self) -> String;

    /// Create and initialize an engine for the given language.
    async fn create(&self, language: &str) -> Result<Box<dyn OcrEngine>, OcrError>;
}
