//! Provider identifier to backend.

use std::sync::Arc;

use super::backend::ExtractionBackend;
use super::ExtractError;
use crate::models::AiProvider;

/// One backend per supported provider.
#[derive(Clone)]
pub struct BackendSelector {
    openai: Arc<dyn ExtractionBackend>,
    google: Arc<dyn ExtractionBackend>,
}

impl BackendSelector {
    pub fn new(openai: Arc<dyn ExtractionBackend>, google: Arc<dyn ExtractionBackend>) -> Self {
        Self { openai, google }
    }

    pub fn backend(&self, provider: AiProvider) -> Arc<dyn ExtractionBackend> {
        match provider {
            AiProvider::OpenAi => self.openai.clone(),
            AiProvider::Google => self.google.clone(),
        }
    }

    /// Resolve a caller-supplied provider identifier.
    pub fn select(&self, provider_id: &str) -> Result<Arc<dyn ExtractionBackend>, ExtractError> {
        AiProvider::from_str(provider_id)
            .map(|provider| self.backend(provider))
            .ok_or_else(|| ExtractError::InvalidProvider(provider_id.to_string()))
    }
}
