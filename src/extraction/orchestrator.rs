//! The extract-receipt-details use case.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use uuid::Uuid;

use super::backend::{ExtractionBackend, GoogleBackend, OpenAiBackend};
use super::selector::BackendSelector;
use super::ExtractError;
use crate::config::Settings;
use crate::llm::{GeminiClient, LlmError, OpenAiClient};
use crate::models::{AiProvider, ExtractionRequest, ReceiptRecord};
use crate::ocr::OcrService;
use crate::storage::{image_extension, image_url, ReceiptStore};

/// Declared MIME types accepted for upload.
pub const ALLOWED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/jpg"];

/// Validates, extracts and persists receipts.
pub struct ReceiptExtractor {
    selector: BackendSelector,
    store: Arc<ReceiptStore>,
    default_provider: AiProvider,
}

impl ReceiptExtractor {
    pub fn new(
        selector: BackendSelector,
        store: Arc<ReceiptStore>,
        default_provider: AiProvider,
    ) -> Self {
        Self {
            selector,
            store,
            default_provider,
        }
    }

    /// Wire up the real provider clients from settings.
    pub fn from_settings(
        settings: &Settings,
        ocr: Arc<OcrService>,
        store: Arc<ReceiptStore>,
    ) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(settings.attempt_timeout_secs);
        let openai: Arc<dyn ExtractionBackend> = Arc::new(OpenAiBackend::new(
            OpenAiClient::new(settings.openai.clone())?,
            ocr.clone(),
            timeout,
        ));
        let google: Arc<dyn ExtractionBackend> = Arc::new(GoogleBackend::new(
            GeminiClient::new(settings.google.clone())?,
            ocr,
            timeout,
        ));

        Ok(Self::new(
            BackendSelector::new(openai, google),
            store,
            settings.default_provider,
        ))
    }

    pub fn store(&self) -> &ReceiptStore {
        &self.store
    }

    /// Run one request through validation, extraction and persistence.
    pub async fn extract_receipt_details(
        &self,
        request: ExtractionRequest,
    ) -> Result<ReceiptRecord, ExtractError> {
        let upload = request.file.ok_or(ExtractError::MissingFile)?;

        let provider_id = request
            .provider
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| self.default_provider.as_str().to_string());
        let model = request.model.filter(|m| !m.trim().is_empty());

        if !ALLOWED_MIME_TYPES.contains(&upload.mime_type.as_str()) {
            return Err(ExtractError::UnsupportedMediaType(upload.mime_type));
        }

        let backend = self.selector.select(&provider_id)?;
        debug!(
            provider = %backend.provider(),
            model = model.as_deref().unwrap_or(backend.default_model()),
            bytes = upload.bytes.len(),
            "Extracting receipt"
        );
        let extracted = backend
            .extract_receipt_details(&upload, model.as_deref())
            .await?;

        let id = Uuid::new_v4().to_string();
        let extension = image_extension(&upload.file_name, &upload.mime_type);
        self.store.save_image(&id, &extension, &upload.bytes).await?;

        let url = image_url(&id, &extension);
        let record = extracted.into_record(id, url);
        self.store.append(&record).await?;

        info!(
            receipt_id = %record.id,
            provider = %backend.provider(),
            vendor = %record.vendor_name,
            "Receipt persisted"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::SchemaBackend;
    use crate::models::ReceiptUpload;
    use crate::testing::{CountingEngineFactory, ScriptedGenerator};
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    struct Harness {
        extractor: ReceiptExtractor,
        openai: ScriptedGenerator,
        google: ScriptedGenerator,
        ocr: CountingEngineFactory,
        _dir: TempDir,
    }

    fn receipt_json(currency: &str, total: f64) -> String {
        json!({
            "date": "2025-08-23",
            "currency": currency,
            "vendor_name": "Corner Deli",
            "receipt_items": [{"item_name": "Sandwich", "item_cost": total}],
            "total": total
        })
        .to_string()
    }

    async fn harness(openai: ScriptedGenerator, google: ScriptedGenerator) -> Harness {
        let dir = tempdir().unwrap();
        let store = Arc::new(ReceiptStore::open(dir.path()).await.unwrap());
        let ocr_factory = CountingEngineFactory::new("TOTAL $11.00");
        let ocr = Arc::new(OcrService::new(Arc::new(ocr_factory.clone()), "eng"));
        let timeout = Duration::from_secs(5);
        let selector = BackendSelector::new(
            Arc::new(SchemaBackend::new(openai.clone(), ocr.clone(), timeout)),
            Arc::new(SchemaBackend::new(google.clone(), ocr, timeout)),
        );
        Harness {
            extractor: ReceiptExtractor::new(selector, store, AiProvider::OpenAi),
            openai,
            google,
            ocr: ocr_factory,
            _dir: dir,
        }
    }

    fn request(mime: &str, file_name: &str, provider: Option<&str>) -> ExtractionRequest {
        ExtractionRequest {
            file: Some(ReceiptUpload::new(b"image-bytes".to_vec(), mime, file_name)),
            provider: provider.map(str::to_string),
            model: None,
        }
    }

    #[tokio::test]
    async fn test_missing_file() {
        let h = harness(
            ScriptedGenerator::new(AiProvider::OpenAi, "gpt-4.1-mini"),
            ScriptedGenerator::new(AiProvider::Google, "gemini-2.5-pro"),
        )
        .await;
        let err = h
            .extractor
            .extract_receipt_details(ExtractionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::MissingFile));
    }

    #[tokio::test]
    async fn test_pdf_rejected_before_ocr_or_model() {
        let h = harness(
            ScriptedGenerator::new(AiProvider::OpenAi, "gpt-4.1-mini"),
            ScriptedGenerator::new(AiProvider::Google, "gemini-2.5-pro"),
        )
        .await;
        let err = h
            .extractor
            .extract_receipt_details(request("application/pdf", "r.pdf", Some("GOOGLE")))
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::UnsupportedMediaType(ref m) if m == "application/pdf"));
        assert_eq!(h.ocr.engines_created(), 0);
        assert_eq!(h.ocr.recognitions(), 0);
        assert_eq!(h.openai.calls() + h.google.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_provider_invokes_no_backend() {
        let h = harness(
            ScriptedGenerator::new(AiProvider::OpenAi, "gpt-4.1-mini"),
            ScriptedGenerator::new(AiProvider::Google, "gemini-2.5-pro"),
        )
        .await;
        let err = h
            .extractor
            .extract_receipt_details(request("image/png", "r.png", Some("MISTRAL")))
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::InvalidProvider(_)));
        assert_eq!(h.ocr.recognitions(), 0);
        assert_eq!(h.openai.calls() + h.google.calls(), 0);
    }

    #[tokio::test]
    async fn test_default_provider_and_model() {
        let openai = ScriptedGenerator::new(AiProvider::OpenAi, "gpt-4.1-mini")
            .then_text(&receipt_json("USD", 4.0));
        let h = harness(
            openai,
            ScriptedGenerator::new(AiProvider::Google, "gemini-2.5-pro"),
        )
        .await;

        let record = h
            .extractor
            .extract_receipt_details(request("image/jpeg", "r.jpg", None))
            .await
            .unwrap();
        assert_eq!(record.total, 4.0);
        assert_eq!(h.openai.models_seen(), vec!["gpt-4.1-mini"]);
        assert_eq!(h.google.calls(), 0);
    }

    #[tokio::test]
    async fn test_google_total_and_currency() {
        let google = ScriptedGenerator::new(AiProvider::Google, "gemini-2.5-pro")
            .then_text(&receipt_json("USD", 11.0));
        let h = harness(
            ScriptedGenerator::new(AiProvider::OpenAi, "gpt-4.1-mini"),
            google,
        )
        .await;

        let record = h
            .extractor
            .extract_receipt_details(request("image/jpeg", "receipt.jpeg", Some("GOOGLE")))
            .await
            .unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["total"], 11.0);
        assert_eq!(json["currency"], "USD");
        assert!(json["items"].is_array());
        assert!(h.google.prompts_seen()[0].contains("TOTAL $11.00"));
        assert_eq!(h.google.models_seen(), vec!["gemini-2.5-pro"]);
    }

    #[tokio::test]
    async fn test_persisted_image_matches_upload() {
        let openai = ScriptedGenerator::new(AiProvider::OpenAi, "gpt-4.1-mini")
            .then_text(&receipt_json("EUR", 2.5));
        let h = harness(
            openai,
            ScriptedGenerator::new(AiProvider::Google, "gemini-2.5-pro"),
        )
        .await;

        let record = h
            .extractor
            .extract_receipt_details(request("image/png", "Scan.PNG", Some("openai")))
            .await
            .unwrap();

        assert_eq!(record.image_url, format!("/receipts/{}.png", record.id));
        let file_name = record.image_url.trim_start_matches("/receipts/");
        let path = h.extractor.store().image_path(file_name).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"image-bytes");

        let stored = h.extractor.store().records().await.unwrap();
        assert_eq!(stored, vec![record]);
    }

    #[tokio::test]
    async fn test_failed_extraction_persists_nothing() {
        let h = harness(
            ScriptedGenerator::new(AiProvider::OpenAi, "gpt-4.1-mini"),
            ScriptedGenerator::new(AiProvider::Google, "gemini-2.5-pro"),
        )
        .await;
        let err = h
            .extractor
            .extract_receipt_details(request("image/jpg", "r.jpg", None))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ExtractError::ExtractionFailure {
                provider: AiProvider::OpenAi,
                attempts: 3
            }
        ));
        assert!(h.extractor.store().records().await.unwrap().is_empty());
    }
}
