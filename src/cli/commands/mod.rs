//! Command implementations.

pub mod extract;
pub mod list;
pub mod ocr;
pub mod serve;
