//! End-to-end extraction through the public API with scripted providers.

use std::sync::Arc;
use std::time::Duration;

use receipt_extractor::extraction::{BackendSelector, ExtractError, ReceiptExtractor, SchemaBackend};
use receipt_extractor::models::{AiProvider, ExtractionRequest, ReceiptUpload};
use receipt_extractor::ocr::OcrService;
use receipt_extractor::storage::ReceiptStore;
use receipt_extractor::testing::{CountingEngineFactory, ScriptedGenerator};
use serde_json::json;
use tempfile::TempDir;

struct Pipeline {
    extractor: Arc<ReceiptExtractor>,
    store: Arc<ReceiptStore>,
    ocr: Arc<OcrService>,
    engines: CountingEngineFactory,
    _dir: TempDir,
}

async fn pipeline(openai: ScriptedGenerator, google: ScriptedGenerator) -> Pipeline {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ReceiptStore::open(dir.path()).await.unwrap());
    let engines = CountingEngineFactory::new("FARMERS MARKET\nAPPLES 3.00\nTOTAL 3.00")
        .with_init_delay(Duration::from_millis(30));
    let ocr = Arc::new(OcrService::new(Arc::new(engines.clone()), "eng"));
    let timeout = Duration::from_secs(5);
    let selector = BackendSelector::new(
        Arc::new(SchemaBackend::new(openai, ocr.clone(), timeout)),
        Arc::new(SchemaBackend::new(google, ocr.clone(), timeout)),
    );
    let extractor = Arc::new(ReceiptExtractor::new(selector, store.clone(), AiProvider::OpenAi));

    Pipeline {
        extractor,
        store,
        ocr,
        engines,
        _dir: dir,
    }
}

fn receipt(vendor: &str, total: serde_json::Value) -> String {
    json!({
        "date": "2025-06-14",
        "currency": "€",
        "vendor_name": vendor,
        "receipt_items": [{"item_name": "Apples", "item_cost": "3.00"}],
        "tax": null,
        "total": total
    })
    .to_string()
}

fn upload_request(provider: &str) -> ExtractionRequest {
    ExtractionRequest {
        file: Some(ReceiptUpload::new(
            b"\x89PNG fake image".to_vec(),
            "image/png",
            "market.png",
        )),
        provider: Some(provider.to_string()),
        model: None,
    }
}

#[tokio::test]
async fn recovers_after_invalid_candidates() {
    let openai = ScriptedGenerator::new(AiProvider::OpenAi, "gpt-4.1-mini")
        .then_text("not json at all")
        .then_text(r#"{"date": "2025-06-14"}"#)
        .then_text(&format!("```json\n{}\n```", receipt("Farmers Market", json!(3.0))));
    let google = ScriptedGenerator::new(AiProvider::Google, "gemini-2.5-pro");
    let p = pipeline(openai.clone(), google.clone()).await;

    let record = p
        .extractor
        .extract_receipt_details(upload_request("openai"))
        .await
        .unwrap();

    assert_eq!(openai.calls(), 3);
    assert_eq!(google.calls(), 0);
    assert_eq!(record.vendor_name, "Farmers Market");
    assert_eq!(record.currency, "EUR");
    assert_eq!(record.tax, None);
    assert_eq!(record.items[0].cost, 3.0);
    assert!(openai.prompts_seen()[0].contains("APPLES 3.00"));

    let stored = p.store.records().await.unwrap();
    assert_eq!(stored, vec![record]);
}

#[tokio::test]
async fn concurrent_requests_share_one_engine() {
    let mut openai = ScriptedGenerator::new(AiProvider::OpenAi, "gpt-4.1-mini");
    let mut google = ScriptedGenerator::new(AiProvider::Google, "gemini-2.5-pro");
    for i in 0..4 {
        openai = openai.then_text(&receipt(&format!("Vendor {}", i), json!(3)));
        google = google.then_text(&receipt(&format!("Vendor {}", i), json!("3.00")));
    }
    let p = pipeline(openai.clone(), google.clone()).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let extractor = p.extractor.clone();
        let provider = if i % 2 == 0 { "OPENAI" } else { "GOOGLE" };
        handles.push(tokio::spawn(async move {
            extractor.extract_receipt_details(upload_request(provider)).await
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }

    assert_eq!(p.engines.engines_created(), 1);
    assert_eq!(p.engines.recognitions(), 8);
    assert_eq!(openai.calls(), 4);
    assert_eq!(google.calls(), 4);
    assert_eq!(google.models_seen()[0], "gemini-2.5-pro");

    let stored = p.store.records().await.unwrap();
    assert_eq!(stored.len(), 8);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);

    p.ocr.shutdown().await;
    assert_eq!(p.engines.terminations(), 1);
}

#[tokio::test]
async fn exhausted_provider_reports_attempts() {
    let google = ScriptedGenerator::new(AiProvider::Google, "gemini-2.5-pro")
        .then_error()
        .then_text("[]")
        .then_text(&receipt("", json!(3.0)));
    let openai = ScriptedGenerator::new(AiProvider::OpenAi, "gpt-4.1-mini");
    let p = pipeline(openai, google.clone()).await;

    let err = p
        .extractor
        .extract_receipt_details(upload_request("GOOGLE"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ExtractError::ExtractionFailure {
            provider: AiProvider::Google,
            attempts: 3
        }
    ));
    assert_eq!(google.calls(), 3);
    assert!(p.store.records().await.unwrap().is_empty());
}
