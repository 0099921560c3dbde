//! Shared helpers for OCR engines: binary lookup and model directories.

#![cfg_attr(not(feature = "ocr-ocrs"), allow(dead_code))]

use std::path::{Path, PathBuf};

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Where an engine looks for its model files.
pub struct ModelDirConfig {
    /// Subdirectory name under the data dir (e.g. "ocrs").
    pub subdir: &'static str,
    /// Required model files to check for presence.
    pub required_files: &'static [&'static str],
}

impl ModelDirConfig {
    /// Get the default model directory for this engine.
    pub fn default_dir(&self) -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join(self.subdir)
            .join("models")
    }

    /// Standard candidate directories, most specific first.
    pub fn candidate_dirs(&self) -> Vec<PathBuf> {
        [
            dirs::data_dir().map(|d| d.join(self.subdir).join("models")),
            dirs::home_dir().map(|d| d.join(format!(".{}", self.subdir)).join("models")),
            Some(PathBuf::from(format!("/usr/share/{}/models", self.subdir))),
            Some(PathBuf::from(format!("./models/{}", self.subdir))),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Check if a directory contains all required model files.
    pub fn has_required_files(&self, dir: &Path) -> bool {
        self.required_files
            .iter()
            .all(|file| dir.join(file).exists())
    }

    /// Resolve the model directory: an explicit path wins, else the first
    /// candidate that holds every required file.
    pub fn find(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return self.has_required_files(path).then(|| path.to_path_buf());
        }
        self.candidate_dirs()
            .into_iter()
            .find(|dir| self.has_required_files(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CONFIG: ModelDirConfig = ModelDirConfig {
        subdir: "receipt-extractor-test",
        required_files: &["a.rten", "b.rten"],
    };

    #[test]
    fn test_explicit_dir_requires_all_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rten"), b"x").unwrap();
        assert_eq!(CONFIG.find(Some(dir.path())), None);

        std::fs::write(dir.path().join("b.rten"), b"x").unwrap();
        assert_eq!(CONFIG.find(Some(dir.path())), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_default_dir_is_first_candidate() {
        let default = CONFIG.default_dir();
        assert!(default.ends_with("receipt-extractor-test/models"));
        if dirs::data_dir().is_some() {
            assert_eq!(CONFIG.candidate_dirs().first(), Some(&default));
        }
    }
}
