//! Receipt storage on disk.
//!
//! Layout of the storage directory:
//! - `<id>.<ext>`: one file per accepted receipt image
//! - `db.json`: JSON array of every persisted record, rewritten on each append

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::models::ReceiptRecord;

/// Name of the record collection file.
pub const RECORDS_FILE: &str = "db.json";

/// URL prefix under which stored images are served.
pub const IMAGE_URL_PREFIX: &str = "/receipts";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record collection {path} is unreadable: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Image files and the record collection in one directory.
pub struct ReceiptStore {
    dir: PathBuf,
    records_path: PathBuf,
    /// Serializes read-modify-write of `db.json`.
    write_lock: Mutex<()>,
}

impl ReceiptStore {
    /// Open (creating if needed) a storage directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            records_path: dir.join(RECORDS_FILE),
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Write image bytes to `<id>.<ext>`. Never overwrites an existing file.
    pub async fn save_image(
        &self,
        id: &str,
        extension: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let path = self.dir.join(format!("{}.{}", id, extension));
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Saved receipt image");
        Ok(path)
    }

    /// Append a record to the collection.
    ///
    /// Concurrent appends are serialized so none is lost; the rewritten
    /// collection replaces the old one by rename.
    pub async fn append(&self, record: &ReceiptRecord) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.read_records().await?;
        records.push(record.clone());

        let json = serde_json::to_vec_pretty(&records)?;
        let tmp_path = self.records_path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json).await?;
        tokio::fs::rename(&tmp_path, &self.records_path).await?;

        debug!(receipt_id = %record.id, total_records = records.len(), "Appended receipt record");
        Ok(())
    }

    /// All persisted records, oldest first.
    pub async fn records(&self) -> Result<Vec<ReceiptRecord>, StorageError> {
        self.read_records().await
    }

    async fn read_records(&self) -> Result<Vec<ReceiptRecord>, StorageError> {
        let data = match tokio::fs::read(&self.records_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&data).map_err(|e| StorageError::Corrupt {
            path: self.records_path.clone(),
            message: e.to_string(),
        })
    }

    /// Path of a stored image, if `file_name` names one.
    pub fn image_path(&self, file_name: &str) -> Option<PathBuf> {
        is_image_file_name(file_name).then(|| self.dir.join(file_name))
    }
}

/// Public URL of a stored image.
pub fn image_url(id: &str, extension: &str) -> String {
    format!("{}/{}.{}", IMAGE_URL_PREFIX, id, extension)
}

/// Whether `name` has the `<uuid>.<ext>` shape of a stored image.
///
/// Rules out path separators, dot segments and the collection file.
pub fn is_image_file_name(name: &str) -> bool {
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return false;
    };
    Uuid::parse_str(stem).is_ok() && is_safe_extension(ext)
}

fn is_safe_extension(ext: &str) -> bool {
    !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Extension for a stored image: the upload's own extension when it has a
/// usable one, otherwise one derived from the MIME type.
pub fn image_extension(file_name: &str, mime_type: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| is_safe_extension(ext))
        .unwrap_or_else(|| mime_to_extension(mime_type).to_string())
}

/// Map an image MIME type to a file extension.
pub fn mime_to_extension(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        _ => "bin",
    }
}
