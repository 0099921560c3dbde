//! Schema-constrained extraction backends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, info_span, Instrument};

use super::retry::retry;
use super::validate::{parse_candidate, validate_candidate};
use super::{AttemptError, ExtractError};
use crate::llm::{build_receipt_prompt, GeminiClient, OpenAiClient, StructuredGenerator};
use crate::models::{AiProvider, ExtractedReceipt, ReceiptUpload};
use crate::ocr::OcrService;

/// Model attempts per extraction.
pub const MAX_ATTEMPTS: u32 = 3;

/// Extracts a validated receipt from an uploaded image.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    fn provider(&self) -> AiProvider;

    fn default_model(&self) -> &str;

    /// OCR the image, then try the model until a candidate validates.
    ///
    /// `model` falls back to [`default_model`](Self::default_model).
    async fn extract_receipt_details(
        &self,
        upload: &ReceiptUpload,
        model: Option<&str>,
    ) -> Result<ExtractedReceipt, ExtractError>;
}

/// OCR text plus a [`StructuredGenerator`] behind the retry loop.
pub struct SchemaBackend<G> {
    generator: G,
    ocr: Arc<OcrService>,
    attempt_timeout: Duration,
}

pub type OpenAiBackend = SchemaBackend<OpenAiClient>;
pub type GoogleBackend = SchemaBackend<GeminiClient>;

impl<G: StructuredGenerator> SchemaBackend<G> {
    pub fn new(generator: G, ocr: Arc<OcrService>, attempt_timeout: Duration) -> Self {
        Self {
            generator,
            ocr,
            attempt_timeout,
        }
    }

    /// One model call, bounded by the per-attempt timeout.
    async fn attempt(&self, model: &str, prompt: &str) -> Result<String, AttemptError> {
        match tokio::time::timeout(self.attempt_timeout, self.generator.generate(model, prompt))
            .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(AttemptError::Timeout(self.attempt_timeout)),
        }
    }
}

#[async_trait]
impl<G: StructuredGenerator> ExtractionBackend for SchemaBackend<G> {
    fn provider(&self) -> AiProvider {
        self.generator.provider()
    }

    fn default_model(&self) -> &str {
        self.generator.default_model()
    }

    async fn extract_receipt_details(
        &self,
        upload: &ReceiptUpload,
        model: Option<&str>,
    ) -> Result<ExtractedReceipt, ExtractError> {
        let provider = self.provider();
        let model = model.unwrap_or_else(|| self.default_model());
        let span = info_span!("extract", provider = %provider, model);

        async move {
            let ocr_text = self.ocr.extract_text(&upload.bytes).await?;
            let prompt = build_receipt_prompt(&ocr_text);

            let receipt = retry(
                MAX_ATTEMPTS,
                |_attempt| self.attempt(model, &prompt),
                |text| parse_candidate(&text).and_then(validate_candidate),
            )
            .await
            .map_err(|exhausted| ExtractError::ExtractionFailure {
                provider,
                attempts: exhausted.attempts,
            })?;

            info!(vendor = %receipt.vendor_name, total = receipt.total, "Receipt extracted");
            Ok::<_, ExtractError>(receipt)
        }
        .instrument(span)
        .await
    }
}
