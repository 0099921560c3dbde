//! Test doubles for the OCR engine and model providers.
//!
//! Both doubles are cheap to clone and share their counters, so a test can
//! hand one clone to the code under test and assert on another.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{LlmError, StructuredGenerator};
use crate::models::AiProvider;
use crate::ocr::{OcrEngine, OcrEngineFactory, OcrEngineKind, OcrError};

#[derive(Default)]
struct ScriptState {
    responses: VecDeque<Result<String, String>>,
    calls: u32,
    models: Vec<String>,
    prompts: Vec<String>,
}

/// A [`StructuredGenerator`] that replays scripted responses in order.
///
/// Once the script runs out every call fails with [`LlmError::EmptyResponse`].
#[derive(Clone)]
pub struct ScriptedGenerator {
    provider: AiProvider,
    default_model: String,
    delay: Option<Duration>,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedGenerator {
    pub fn new(provider: AiProvider, default_model: impl Into<String>) -> Self {
        Self {
            provider,
            default_model: default_model.into(),
            delay: None,
            state: Arc::new(Mutex::new(ScriptState::default())),
        }
    }

    /// Queue a response body.
    pub fn then_text(self, text: &str) -> Self {
        self.push(Ok(text.to_string()));
        self
    }

    /// Queue a transport failure.
    pub fn then_error(self) -> Self {
        self.push(Err("scripted failure".to_string()));
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(&self, response: Result<String, String>) {
        self.lock().responses.push_back(response);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> u32 {
        self.lock().calls
    }

    pub fn models_seen(&self) -> Vec<String> {
        self.lock().models.clone()
    }

    pub fn prompts_seen(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }
}

#[async_trait]
impl StructuredGenerator for ScriptedGenerator {
    fn provider(&self) -> AiProvider {
        self.provider
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        let response = {
            let mut state = self.lock();
            state.calls += 1;
            state.models.push(model.to_string());
            state.prompts.push(prompt.to_string());
            state.responses.pop_front()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match response {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(LlmError::Connection(message)),
            None => Err(LlmError::EmptyResponse),
        }
    }
}

#[derive(Default)]
struct EngineCounters {
    created: AtomicU32,
    create_attempts: AtomicU32,
    recognized: AtomicU32,
    terminated: AtomicU32,
    last_language: Mutex<Option<String>>,
}

/// An [`OcrEngineFactory`] whose engines return fixed text and count calls.
#[derive(Clone)]
pub struct CountingEngineFactory {
    text: String,
    init_delay: Option<Duration>,
    fail_first_init: bool,
    fail_recognition: bool,
    fail_termination: bool,
    counters: Arc<EngineCounters>,
}

impl CountingEngineFactory {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            init_delay: None,
            fail_first_init: false,
            fail_recognition: false,
            fail_termination: false,
            counters: Arc::new(EngineCounters::default()),
        }
    }

    /// Make engine creation slow enough for callers to overlap.
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = Some(delay);
        self
    }

    pub fn failing_first_init(mut self) -> Self {
        self.fail_first_init = true;
        self
    }

    pub fn failing_recognition(mut self) -> Self {
        self.fail_recognition = true;
        self
    }

    pub fn failing_termination(mut self) -> Self {
        self.fail_termination = true;
        self
    }

    /// Engines successfully created.
    pub fn engines_created(&self) -> u32 {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn recognitions(&self) -> u32 {
        self.counters.recognized.load(Ordering::SeqCst)
    }

    pub fn terminations(&self) -> u32 {
        self.counters.terminated.load(Ordering::SeqCst)
    }

    pub fn last_language(&self) -> Option<String> {
        self.counters
            .last_language
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl OcrEngineFactory for CountingEngineFactory {
    fn kind(&self) -> OcrEngineKind {
        OcrEngineKind::Tesseract
    }

    fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        "counting test engine".to_string()
    }

    async fn create(&self, language: &str) -> Result<Box<dyn OcrEngine>, OcrError> {
        let attempt = self.counters.create_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.init_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_first_init && attempt == 0 {
            return Err(OcrError::BackendNotAvailable(
                "scripted init failure".to_string(),
            ));
        }

        *self
            .counters
            .last_language
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(language.to_string());
        self.counters.created.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(CountingEngine {
            text: self.text.clone(),
            fail_recognition: self.fail_recognition,
            fail_termination: self.fail_termination,
            terminated: AtomicBool::new(false),
            counters: self.counters.clone(),
        }))
    }
}

struct CountingEngine {
    text: String,
    fail_recognition: bool,
    fail_termination: bool,
    terminated: AtomicBool,
    counters: Arc<EngineCounters>,
}

#[async_trait]
impl OcrEngine for CountingEngine {
    async fn recognize(&self, _image: &[u8]) -> Result<String, OcrError> {
        self.counters.recognized.fetch_add(1, Ordering::SeqCst);
        if self.terminated.load(Ordering::SeqCst) {
            return Err(OcrError::BackendNotAvailable(
                "engine terminated".to_string(),
            ));
        }
        if self.fail_recognition {
            return Err(OcrError::OcrFailed("scripted recognition failure".to_string()));
        }
        Ok(self.text.clone())
    }

    async fn terminate(&self) -> Result<(), OcrError> {
        self.counters.terminated.fetch_add(1, Ordering::SeqCst);
        self.terminated.store(true, Ordering::SeqCst);
        if self.fail_termination {
            return Err(OcrError::OcrFailed("scripted termination failure".to_string()));
        }
        Ok(())
    }
}
