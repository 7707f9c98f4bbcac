use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Embedded model catalog JSON.
const CATALOG_JSON: &str = include_str!("../../resources/model_catalog.json");

/// A downloadable speech-recognition model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Unique human key (e.g., "tiny"), also the download-tracking key.
    pub name: String,
    /// Display size such as "75 MB". Not an authoritative byte count.
    pub size_label: String,
    /// Remote location of the model file.
    pub source_url: String,
    /// Unique storage key (e.g., "ggml-tiny.bin").
    pub filename: String,
    /// Description of the model.
    pub description: String,
    /// SHA-256 checksum of the file, lowercase hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

#[derive(Deserialize)]
struct CatalogFile {
    models: Vec<ModelDescriptor>,
}

/// Catalog of models that can be downloaded, in declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
}

impl ModelCatalog {
    /// Build a catalog, rejecting duplicate names or filenames.
    pub fn new(models: Vec<ModelDescriptor>) -> Result<Self, DomainError> {
        let mut names = HashSet::new();
        let mut filenames = HashSet::new();
        for model in &models {
            if !names.insert(model.name.as_str()) {
                return Err(DomainError::Config(format!(
                    "Duplicate model name in catalog: {}",
                    model.name
                )));
            }
            if !filenames.insert(model.filename.as_str()) {
                return Err(DomainError::Config(format!(
                    "Duplicate model filename in catalog: {}",
                    model.filename
                )));
            }
        }
        Ok(Self { models })
    }

    /// The catalog shipped with the application.
    pub fn builtin() -> Result<Self, DomainError> {
        let file: CatalogFile = serde_json::from_str(CATALOG_JSON)
            .map_err(|e| DomainError::Config(format!("Failed to parse model catalog: {}", e)))?;
        Self::new(file.models)
    }

    /// All known models.
    pub fn list_available(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Find a model by name.
    pub fn get(&self, name: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Find a model by storage filename.
    pub fn by_filename(&self, filename: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.filename == filename)
    }
}

/// A progress notification for a model download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Model name.
    pub model: String,
    /// Bytes downloaded so far.
    pub downloaded: u64,
    /// Total bytes to download (0 if unknown).
    pub total: u64,
    /// Whole percentage, always within 0..=100.
    pub progress: u8,
}

impl DownloadProgress {
    /// Create a progress event, deriving the percentage from the byte counts.
    pub fn new(model: impl Into<String>, downloaded: u64, total: u64) -> Self {
        Self {
            model: model.into(),
            downloaded,
            total,
            progress: percent_complete(downloaded, total),
        }
    }

    /// Whether this event reports the whole artifact.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.downloaded == self.total
    }
}

/// `floor(downloaded / total * 100)`, 0 when the total is unknown.
pub fn percent_complete(downloaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (downloaded as u128 * 100) / total as u128;
    percent.min(100) as u8
}

/// Bookkeeping for one in-flight download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadState {
    pub model: String,
    pub filename: String,
    pub downloaded: u64,
    pub total: u64,
}

impl DownloadState {
    pub fn progress(&self) -> DownloadProgress {
        DownloadProgress::new(self.model.clone(), self.downloaded, self.total)
    }
}

/// Merged view of the model library for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct ModelsState {
    pub available: Vec<ModelDescriptor>,
    pub present: BTreeSet<String>,
    pub active: Option<String>,
    pub downloading: Vec<DownloadProgress>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, filename: &str) -> ModelDescriptor {
        ModelDescriptor {
            name: name.to_string(),
            size_label: "1 MB".to_string(),
            source_url: format!("https://huggingface.co/models/{}", filename),
            filename: filename.to_string(),
            description: String::new(),
            sha256: None,
        }
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = ModelCatalog::builtin().unwrap();
        let names: Vec<&str> = catalog
            .list_available()
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["tiny", "base", "small", "medium", "large-v3"]);

        let tiny = catalog.get("tiny").unwrap();
        assert_eq!(tiny.filename, "ggml-tiny.bin");
        assert_eq!(catalog.by_filename("ggml-tiny.bin").unwrap().name, "tiny");
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let dup_name = ModelCatalog::new(vec![descriptor("a", "a.bin"), descriptor("a", "b.bin")]);
        assert!(matches!(dup_name, Err(DomainError::Config(_))));

        let dup_file = ModelCatalog::new(vec![descriptor("a", "a.bin"), descriptor("b", "a.bin")]);
        assert!(matches!(dup_file, Err(DomainError::Config(_))));
    }

    #[test]
    fn test_percent_complete() {
        assert_eq!(percent_complete(0, 0), 0);
        assert_eq!(percent_complete(500, 0), 0);
        assert_eq!(percent_complete(50, 100), 50);
        assert_eq!(percent_complete(2, 3), 66);
        assert_eq!(percent_complete(100, 100), 100);
        assert_eq!(percent_complete(150, 100), 100);
        assert_eq!(percent_complete(u64::MAX, u64::MAX), 100);
    }

    #[test]
    fn test_download_progress() {
        let progress = DownloadProgress::new("tiny", 50, 100);
        assert_eq!(progress.progress, 50);
        assert!(!progress.is_complete());
        assert!(DownloadProgress::new("tiny", 100, 100).is_complete());
        assert!(!DownloadProgress::new("tiny", 0, 0).is_complete());
    }
}
