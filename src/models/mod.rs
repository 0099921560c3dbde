//! Data models for receipt extraction.

mod receipt;

pub use receipt::{
    AiProvider, ExtractedReceipt, ExtractionRequest, ReceiptItem, ReceiptRecord, ReceiptUpload,
};
