//! Receipt extractor - structured receipt details from photos.
//!
//! Receipt images are read with OCR, the text is turned into a typed record
//! by a schema-constrained language model (OpenAI or Google), and the image
//! and record are persisted side by side.

#![allow(clippy::should_implement_trait)]

pub mod cli;
pub mod config;
pub mod extraction;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod server;
pub mod storage;
pub mod testing;
