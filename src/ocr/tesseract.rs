//! Tesseract OCR engine.
//!
//! Drives the `tesseract` command-line tool. Creating the engine verifies the
//! binary and the requested language pack once, so per-image calls only pay
//! for recognition.

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

use super::backend::{OcrEngine, OcrEngineFactory, OcrEngineKind, OcrError};
use super::model_utils::check_binary;

/// Creates Tesseract engines.
#[derive(Debug, Clone, Default)]
pub struct TesseractFactory;

impl TesseractFactory {
    pub fn new() -> Self {
        Self
    }
}

/// Map a process spawn error the way every tesseract invocation does.
fn spawn_error(e: std::io::Error) -> OcrError {
    if e.kind() == std::io::ErrorKind::NotFound {
        OcrError::BackendNotAvailable("tesseract not found (install tesseract-ocr)".to_string())
    } else {
        OcrError::Io(e)
    }
}

/// Parse `tesseract --list-langs` output.
///
/// The first line is a header; some versions print the list on stderr.
fn parse_language_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.starts_with("List of available languages"))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// `eng+deu` needs both packs.
fn missing_languages(requested: &str, installed: &[String]) -> Vec<String> {
    requested
        .split('+')
        .map(str::trim)
        .filter(|lang| !lang.is_empty() && !installed.iter().any(|i| i == lang))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl OcrEngineFactory for TesseractFactory {
    fn kind(&self) -> OcrEngineKind {
        OcrEngineKind::Tesseract
    }

    fn is_available(&self) -> bool {
        check_binary("tesseract")
    }

    fn availability_hint(&self) -> String {
        if check_binary("tesseract") {
            "Tesseract is available".to_string()
        } else {
            "Tesseract not installed. Install with: apt install tesseract-ocr".to_string()
        }
    }

    async fn create(&self, language: &str) -> Result<Box<dyn OcrEngine>, OcrError> {
        let output = Command::new("tesseract")
            .arg("--list-langs")
            .output()
            .await
            .map_err(spawn_error)?;

        let listing = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let installed = parse_language_list(&listing);
        let missing = missing_languages(language, &installed);
        if !missing.is_empty() {
            return Err(OcrError::BackendNotAvailable(format!(
                "tesseract language data missing: {} (install tesseract-ocr-{})",
                missing.join(", "),
                missing[0]
            )));
        }

        let workspace = TempDir::new()?;
        debug!(language, workspace = %workspace.path().display(), "Tesseract engine ready");

        Ok(Box::new(TesseractEngine {
            language: language.to_string(),
            workspace: Mutex::new(Some(workspace)),
        }))
    }
}

/// A Tesseract engine bound to one language and a scratch directory.
pub struct TesseractEngine {
    language: String,
    /// `None` once terminated.
    workspace: Mutex<Option<TempDir>>,
}

impl TesseractEngine {
    /// Write the image into the workspace so tesseract can read it.
    fn stage_image(&self, image: &[u8]) -> Result<tempfile::TempPath, OcrError> {
        let guard = self
            .workspace
            .lock()
            .map_err(|_| OcrError::OcrFailed("tesseract workspace poisoned".to_string()))?;
        let dir = guard
            .as_ref()
            .ok_or_else(|| OcrError::BackendNotAvailable("OCR engine terminated".to_string()))?;

        let mut file = tempfile::Builder::new()
            .prefix("receipt-")
            .suffix(".img")
            .tempfile_in(dir.path())?;
        file.write_all(image)?;
        file.flush()?;
        Ok(file.into_temp_path())
    }

    async fn run_tesseract(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.language])
            .output()
            .await
            .map_err(spawn_error)?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(OcrError::OcrFailed(format!("tesseract failed: {}", stderr.trim())))
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
        let start = Instant::now();
        let staged = self.stage_image(image)?;
        let text = self.run_tesseract(&staged).await?;
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "tesseract recognition finished"
        );
        Ok(text.trim().to_string())
    }

    async fn terminate(&self) -> Result<(), OcrError> {
        let workspace = self
            .workspace
            .lock()
            .map_err(|_| OcrError::OcrFailed("tesseract workspace poisoned".to_string()))?
            .take();
        if let Some(dir) = workspace {
            dir.close()?;
        }
        Ok(())
    }
}
