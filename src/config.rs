//! Configuration management using the prefer crate.
//!
//! [`Config`] mirrors the on-disk file (every field optional); [`Settings`]
//! is the fully-resolved runtime view. Resolution order: built-in defaults,
//! then the config file, then environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::ProviderSettings;
use crate::models::AiProvider;
use crate::ocr::OcrEngineKind;

/// Name used for config discovery (`receipt-extractor.toml` and friends).
pub const CONFIG_NAME: &str = "receipt-extractor";

const DEFAULT_BIND: &str = "127.0.0.1:3000";
const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// OCR section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrConfig {
    /// `tesseract` or `ocrs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    /// Recognition language, e.g. `eng` or `eng+deu`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Directory holding OCRS model files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<String>,
}

/// A provider section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl ProviderConfig {
    fn apply(&self, settings: &mut ProviderSettings) {
        if let Some(ref key) = self.api_key {
            settings.api_key = Some(key.clone());
        }
        if let Some(ref endpoint) = self.endpoint {
            settings.endpoint = endpoint.clone();
        }
        if let Some(ref model) = self.default_model {
            settings.default_model = model.clone();
        }
    }
}

/// Configuration file contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory for receipt images and `db.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<String>,
    /// Listen address for `serve`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    /// Provider used when a request names none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,
    /// Deadline for a single model call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_timeout_secs: Option<u64>,
    /// Largest accepted request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_upload_bytes: Option<usize>,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub google: ProviderConfig,
    /// Path the config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

/// Resolved OCR settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrSettings {
    pub engine: OcrEngineKind,
    pub language: String,
    pub model_dir: Option<PathBuf>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            engine: OcrEngineKind::Tesseract,
            language: "eng".to_string(),
            model_dir: None,
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub storage_dir: PathBuf,
    pub bind: String,
    pub default_provider: AiProvider,
    pub attempt_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub ocr: OcrSettings,
    pub openai: ProviderSettings,
    pub google: ProviderSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("receipts"),
            bind: DEFAULT_BIND.to_string(),
            default_provider: AiProvider::default(),
            attempt_timeout_secs: DEFAULT_ATTEMPT_TIMEOUT_SECS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            ocr: OcrSettings::default(),
            openai: ProviderSettings::openai(),
            google: ProviderSettings::google(),
        }
    }
}

impl Settings {
    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `RECEIPTS_DIR`: storage directory
    /// - `PORT`: replaces the port of the bind address
    /// - `OPENAI_API_KEY`
    /// - `GOOGLE_API_KEY` (falls back to `GEMINI_API_KEY`)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(dir) = var("RECEIPTS_DIR") {
            self.storage_dir = expand_path(&dir);
        }
        if let Some(port) = var("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.bind = with_port(&self.bind, port),
                Err(_) => warn!(port = %port, "Ignoring invalid PORT"),
            }
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(key) = var("GOOGLE_API_KEY").or_else(|| var("GEMINI_API_KEY")) {
            self.google.api_key = Some(key);
        }
    }

    /// Ensure the storage directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.storage_dir)
    }
}

/// Replace the port in a `host:port` address.
fn with_port(bind: &str, port: u16) -> String {
    let host = bind.rsplit_once(':').map(|(host, _)| host).unwrap_or(bind);
    format!("{}:{}", host, port)
}

fn expand_path(path_str: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path_str).as_ref())
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    pub async fn load() -> Self {
        match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await.unwrap_or_else(|e| {
                    warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                    Self::default()
                }),
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Format is chosen by extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory of the config file, for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let path = expand_path(path_str);
        if path.is_absolute() {
            path
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref dir) = self.storage_dir {
            settings.storage_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(ref bind) = self.bind {
            settings.bind = bind.clone();
        }
        if let Some(ref provider) = self.default_provider {
            match AiProvider::from_str(provider) {
                Some(p) => settings.default_provider = p,
                None => warn!(provider = %provider, "Unknown default_provider in config"),
            }
        }
        if let Some(secs) = self.attempt_timeout_secs {
            settings.attempt_timeout_secs = secs.max(1);
        }
        if let Some(bytes) = self.max_upload_bytes {
            settings.max_upload_bytes = bytes;
        }

        if let Some(ref engine) = self.ocr.engine {
            match OcrEngineKind::from_str(engine) {
                Some(kind) => settings.ocr.engine = kind,
                None => warn!(engine = %engine, "Unknown OCR engine in config"),
            }
        }
        if let Some(ref language) = self.ocr.language {
            settings.ocr.language = language.clone();
        }
        if let Some(ref dir) = self.ocr.model_dir {
            settings.ocr.model_dir = Some(self.resolve_path(dir, base_dir));
        }

        self.openai.apply(&mut settings.openai);
        self.google.apply(&mut settings.google);
    }
}

/// Load settings: defaults, then the config file, then the environment.
///
/// An explicit `config_path` must load; a discovered one that fails to parse
/// is logged and skipped.
pub async fn load_settings(config_path: Option<&Path>) -> Result<Settings, String> {
    let config = match config_path {
        Some(path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };
    if let Some(ref path) = config.source_path {
        debug!(path = %path.display(), "Loaded config");
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = config.base_dir().unwrap_or(cwd);

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);
    settings.apply_env(|name| std::env::var(name).ok());
    Ok(settings)
}
