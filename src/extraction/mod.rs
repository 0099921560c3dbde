//! Receipt extraction pipeline.
//!
//! [`ReceiptExtractor`] validates the upload, picks a backend through the
//! [`BackendSelector`] and persists the accepted record. Each
//! [`ExtractionBackend`] runs OCR once and then gives its model up to three
//! attempts to produce a receipt that passes validation.

mod backend;
mod orchestrator;
mod retry;
mod selector;
mod validate;

use std::time::Duration;

use thiserror::Error;

use crate::llm::LlmError;
use crate::models::AiProvider;
use crate::ocr::OcrError;
use crate::storage::StorageError;

pub use backend::{ExtractionBackend, GoogleBackend, OpenAiBackend, SchemaBackend, MAX_ATTEMPTS};
pub use orchestrator::{ReceiptExtractor, ALLOWED_MIME_TYPES};
pub use retry::{retry, RetryExhausted};
pub use selector::BackendSelector;
pub use validate::{normalize_currency, normalize_date, parse_candidate, validate_candidate};

/// Why a request could not produce a receipt.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("No file uploaded.")]
    MissingFile,

    #[error("Invalid file type {0}. Only JPG, JPEG, and PNG are allowed.")]
    UnsupportedMediaType(String),

    #[error("Invalid AI provider: {0}")]
    InvalidProvider(String),

    #[error("Failed to OCR the receipt image: {0}")]
    OcrFailure(#[from] OcrError),

    #[error("Failed to extract receipt details from {provider} after {attempts} attempts.")]
    ExtractionFailure { provider: AiProvider, attempts: u32 },

    #[error("Failed to persist receipt: {0}")]
    Storage(#[from] StorageError),
}

impl ExtractError {
    /// Stable identifier used in error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::MissingFile => "MissingFile",
            ExtractError::UnsupportedMediaType(_) => "UnsupportedMediaType",
            ExtractError::InvalidProvider(_) => "InvalidProvider",
            ExtractError::OcrFailure(_) => "OcrFailure",
            ExtractError::ExtractionFailure { .. } => "ExtractionFailure",
            ExtractError::Storage(_) => "StorageFailure",
        }
    }

    /// Caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ExtractError::MissingFile
                | ExtractError::UnsupportedMediaType(_)
                | ExtractError::InvalidProvider(_)
        )
    }
}

/// Why a single model attempt was discarded.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("provider call failed: {0}")]
    Transport(#[from] LlmError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("response is not valid JSON: {0}")]
    Parse(String),

    #[error("response failed validation: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_and_classes() {
        assert_eq!(ExtractError::MissingFile.kind(), "MissingFile");
        assert!(ExtractError::InvalidProvider("X".into()).is_client_error());

        let failure = ExtractError::ExtractionFailure {
            provider: AiProvider::Google,
            attempts: 3,
        };
        assert_eq!(failure.kind(), "ExtractionFailure");
        assert!(!failure.is_client_error());
        assert_eq!(
            failure.to_string(),
            "Failed to extract receipt details from GOOGLE after 3 attempts."
        );
    }
}
