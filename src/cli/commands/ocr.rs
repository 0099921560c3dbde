//! OCR inspection commands.

use std::path::Path;

use console::style;

use crate::config::Settings;
use crate::ocr::{self, OcrEngineKind};

/// Print the recognized text of an image.
pub async fn cmd_ocr(settings: &Settings, file: &Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file).await?;
    let service = ocr::service_from_settings(&settings.ocr)?;

    let result = service.extract_text(&bytes).await;
    service.shutdown().await;

    let text = result?;
    if text.is_empty() {
        eprintln!("{} No text recognized", style("!").yellow());
    } else {
        println!("{}", text);
    }
    Ok(())
}

/// Report availability of each OCR engine.
pub async fn cmd_ocr_check(settings: &Settings) -> anyhow::Result<()> {
    println!("\n{}", style("OCR Engine Status").bold());
    println!("{}", "-".repeat(50));

    for kind in [OcrEngineKind::Tesseract, OcrEngineKind::Ocrs] {
        let marker = if kind == settings.ocr.engine { "*" } else { " " };
        match ocr::engine_factory(kind, settings.ocr.model_dir.clone()) {
            Ok(factory) => {
                let status = if factory.is_available() {
                    style("✓ available").green()
                } else {
                    style("✗ not available").red()
                };
                println!("{} {:<15} {}", marker, kind, status);
                println!("                  {}", style(factory.availability_hint()).dim());
            }
            Err(e) => {
                println!("{} {:<15} {}", marker, kind, style(e.to_string()).dim());
            }
        }
    }

    println!(
        "\n  Configured: {} (language: {})",
        style(settings.ocr.engine).cyan(),
        settings.ocr.language
    );
    Ok(())
}
