//! HTTP service for receipt extraction.
//!
//! Exposes the extraction endpoint, serves stored receipt images and a
//! health check. The OCR engine is torn down after graceful shutdown.

mod error;
mod handlers;
mod routes;

pub use error::{ApiError, ErrorBody, ErrorDetail};
pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Settings;
use crate::extraction::ReceiptExtractor;
use crate::ocr::{self, OcrService};
use crate::storage::ReceiptStore;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<ReceiptExtractor>,
}

impl AppState {
    pub fn new(extractor: Arc<ReceiptExtractor>) -> Self {
        Self { extractor }
    }

    /// Build the full pipeline from settings. The OCR service is returned
    /// separately so the caller can shut it down.
    pub async fn from_settings(settings: &Settings) -> anyhow::Result<(Self, Arc<OcrService>)> {
        let ocr = Arc::new(ocr::service_from_settings(&settings.ocr)?);
        let store = Arc::new(ReceiptStore::open(&settings.storage_dir).await?);
        let extractor = ReceiptExtractor::from_settings(settings, ocr.clone(), store)?;
        Ok((Self::new(Arc::new(extractor)), ocr))
    }
}

/// Start the web server and run until Ctrl+C.
pub async fn serve(settings: &Settings) -> anyhow::Result<()> {
    let (state, ocr) = AppState::from_settings(settings).await?;
    let app = create_router(state, settings.max_upload_bytes);

    let addr: SocketAddr = settings.bind.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        storage_dir = %settings.storage_dir.display(),
        "Starting server at http://{}",
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, releasing OCR engine");
    ocr.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
