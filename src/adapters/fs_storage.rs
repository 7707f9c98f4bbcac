use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::domain::DomainError;
use crate::ports::{ModelStorage, StagedArtifact};

/// Extension of complete model artifacts.
const MODEL_EXTENSION: &str = "bin";

/// Suffix appended to a filename while its bytes are still arriving.
const STAGING_SUFFIX: &str = ".download";

/// Model storage backed by a local directory.
pub struct FsModelStorage {
    models_dir: PathBuf,
}

impl FsModelStorage {
    /// Open (and create if needed) the model directory.
    ///
    /// Staging files left behind by a crash are removed.
    pub fn new(models_dir: PathBuf) -> Result<Self, DomainError> {
        fs::create_dir_all(&models_dir)?;

        let storage = Self { models_dir };
        let swept = storage.sweep_staging()?;

        info!(
            models_dir = ?storage.models_dir,
            stale_staging_removed = swept,
            "FsModelStorage initialized"
        );

        Ok(storage)
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    fn sweep_staging(&self) -> Result<usize, DomainError> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.models_dir)? {
            let path = entry?.path();
            let is_staging = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(STAGING_SUFFIX));
            if is_staging && path.is_file() {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(path = ?path, error = %e, "Failed to remove stale staging file"),
                }
            }
        }
        Ok(removed)
    }

    fn staging_path(&self, filename: &str) -> PathBuf {
        self.models_dir.join(format!("{}{}", filename, STAGING_SUFFIX))
    }

    /// Reject anything that is not a plain file name inside the directory.
    fn validate(filename: &str) -> Result<(), DomainError> {
        let plain = !filename.is_empty()
            && filename != "."
            && filename != ".."
            && !filename.contains(['/', '\\']);
        if plain {
            Ok(())
        } else {
            Err(DomainError::Io(format!("Invalid model filename: {}", filename)))
        }
    }

    /// Calculate SHA-256 hash of a file.
    fn calculate_sha256(path: &Path) -> Result<String, DomainError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut hasher = Sha256::new();

        let mut buffer = [0u8; 8192];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[async_trait]
impl ModelStorage for FsModelStorage {
    fn list(&self) -> Result<Vec<String>, DomainError> {
        let mut models = Vec::new();

        for entry in fs::read_dir(&self.models_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(MODEL_EXTENSION) {
                continue;
            }
            if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
                models.push(filename.to_string());
            }
        }

        models.sort();
        Ok(models)
    }

    fn path(&self, filename: &str) -> PathBuf {
        self.models_dir.join(filename)
    }

    async fn stage(&self, filename: &str) -> Result<Box<dyn StagedArtifact>, DomainError> {
        Self::validate(filename)?;

        let staging_path = self.staging_path(filename);
        let file = tokio::fs::File::create(&staging_path).await?;
        debug!(path = ?staging_path, "Staging model artifact");

        Ok(Box::new(FsStagedArtifact {
            file: Some(file),
            staging_path,
            final_path: self.path(filename),
            committed: false,
        }))
    }

    fn remove(&self, filename: &str) -> Result<(), DomainError> {
        Self::validate(filename)?;

        match fs::remove_file(self.path(filename)) {
            Ok(()) => {
                info!(filename = filename, "Model file removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(DomainError::NotPresent(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn sha256(&self, filename: &str) -> Result<String, DomainError> {
        Self::validate(filename)?;
        Self::calculate_sha256(&self.path(filename))
    }
}

/// A model file being written under its staging name.
struct FsStagedArtifact {
    file: Option<tokio::fs::File>,
    staging_path: PathBuf,
    final_path: PathBuf,
    committed: bool,
}

#[async_trait]
impl StagedArtifact for FsStagedArtifact {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), DomainError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| DomainError::Io("Staged artifact already closed".to_string()))?;
        file.write_all(chunk).await?;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), DomainError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| DomainError::Io("Staged artifact already closed".to_string()))?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        // Atomic rename from staging to final path
        tokio::fs::rename(&self.staging_path, &self.final_path).await?;
        self.committed = true;

        debug!(path = ?self.final_path, "Model artifact committed");
        Ok(())
    }
}

impl Drop for FsStagedArtifact {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.file.take();
        match fs::remove_file(&self.staging_path) {
            Ok(()) => debug!(path = ?self.staging_path, "Discarded partial model artifact"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?self.staging_path, error = %e, "Failed to discard partial model artifact"),
        }
    }
}
