//! One-shot extraction from a local file.

use std::path::Path;
use std::sync::Arc;

use console::style;

use crate::config::Settings;
use crate::extraction::ReceiptExtractor;
use crate::models::{ExtractionRequest, ReceiptUpload};
use crate::ocr;
use crate::storage::ReceiptStore;

/// Run the full pipeline on `file` and print the stored record.
pub async fn cmd_extract(
    settings: &Settings,
    file: &Path,
    provider: Option<String>,
    model: Option<String>,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file).await?;
    let mime_type = mime_guess::from_path(file)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let ocr = Arc::new(ocr::service_from_settings(&settings.ocr)?);
    let store = Arc::new(ReceiptStore::open(&settings.storage_dir).await?);
    let extractor = ReceiptExtractor::from_settings(settings, ocr.clone(), store)?;

    eprintln!(
        "{} Extracting {} ({})",
        style("→").cyan(),
        file.display(),
        mime_type
    );

    let request = ExtractionRequest {
        file: Some(ReceiptUpload::new(bytes, mime_type, file_name)),
        provider,
        model,
    };
    let result = extractor.extract_receipt_details(request).await;
    ocr.shutdown().await;

    match result {
        Ok(record) => {
            eprintln!("  {} Stored receipt {}", style("✓").green(), record.id);
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("  {} {}", style("✗").red(), e);
            Err(e.into())
        }
    }
}
