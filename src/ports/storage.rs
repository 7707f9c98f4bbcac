use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Port for the local model directory.
///
/// Only complete artifacts are visible through `list`; staged writes live
/// under a separate name until committed.
#[async_trait]
pub trait ModelStorage: Send + Sync {
    /// List the filenames of all complete model artifacts.
    fn list(&self) -> Result<Vec<String>, DomainError>;

    /// Location of a model artifact, whether or not it exists.
    fn path(&self, filename: &str) -> PathBuf;

    /// Begin writing a new artifact for `filename`.
    async fn stage(&self, filename: &str) -> Result<Box<dyn StagedArtifact>, DomainError>;

    /// Remove a complete artifact.
    fn remove(&self, filename: &str) -> Result<(), DomainError>;

    /// SHA-256 of a stored artifact, lowercase hex.
    fn sha256(&self, filename: &str) -> Result<String, DomainError>;
}

/// An artifact being written.
///
/// Dropping it without calling `commit` must remove every partial byte.
#[async_trait]
pub trait StagedArtifact: Send {
    /// Append a chunk.
    async fn write(&mut self, chunk: &[u8]) -> Result<(), DomainError>;

    /// Flush and atomically move the artifact to its final location.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}
