//! Receipt records, extraction requests and provider identifiers.

use serde::{Deserialize, Serialize};

/// Supported generative-model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AiProvider {
    /// OpenAI chat completions with `json_schema` response format (primary)
    #[default]
    OpenAi,
    /// Google Gemini `generateContent` with a response schema.
    Google,
}

impl AiProvider {
    /// All providers, in selector order.
    pub const ALL: [AiProvider; 2] = [AiProvider::OpenAi, AiProvider::Google];

    pub fn as_str(&self) -> &'static str {
        match self {
            AiProvider::OpenAi => "OPENAI",
            AiProvider::Google => "GOOGLE",
        }
    }

    /// Parse a provider identifier (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "OPENAI" => Some(AiProvider::OpenAi),
            "GOOGLE" => Some(AiProvider::Google),
            _ => None,
        }
    }
}

impl std::fmt::Display for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single receipt line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub name: String,
    pub cost: f64,
}

/// A persisted, accepted receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRecord {
    pub id: String,
    /// Purchase date as `YYYY-MM-DD`.
    pub date: String,
    /// ISO 4217 currency code.
    pub currency: String,
    pub vendor_name: String,
    /// Line items in receipt order. Never absent, possibly empty.
    #[serde(default)]
    pub items: Vec<ReceiptItem>,
    /// `None` means the receipt did not state a tax amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax: Option<f64>,
    pub total: f64,
    /// Relative URL of the stored source image.
    pub image_url: String,
}

/// Model output after validation, before an id and image are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedReceipt {
    pub date: String,
    pub currency: String,
    pub vendor_name: String,
    pub items: Vec<ReceiptItem>,
    pub tax: Option<f64>,
    pub total: f64,
}

impl ExtractedReceipt {
    /// Attach persistence identity to produce the final record.
    pub fn into_record(self, id: String, image_url: String) -> ReceiptRecord {
        ReceiptRecord {
            id,
            date: self.date,
            currency: self.currency,
            vendor_name: self.vendor_name,
            items: self.items,
            tax: self.tax,
            total: self.total,
            image_url,
        }
    }
}

/// An uploaded receipt image.
#[derive(Debug, Clone)]
pub struct ReceiptUpload {
    pub bytes: Vec<u8>,
    /// MIME type declared by the client (not sniffed).
    pub mime_type: String,
    /// Original filename, used to derive the stored extension.
    pub file_name: String,
}

impl ReceiptUpload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }
}

/// One extraction call. Lives for a single request and is never stored.
#[derive(Debug, Clone, Default)]
pub struct ExtractionRequest {
    pub file: Option<ReceiptUpload>,
    /// Provider identifier as supplied by the caller.
    pub provider: Option<String>,
    /// Free-form model identifier, validated only by the provider.
    pub model: Option<String>,
}
