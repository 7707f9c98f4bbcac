use std::path::PathBuf;

use crate::domain::{AppConfig, DomainError};

/// Persistence for user configuration. Not part of the core's model state.
pub trait ConfigStore: Send + Sync {
    /// Load configuration, writing the defaults first if none exist.
    fn load(&self) -> Result<AppConfig, DomainError>;

    /// Save configuration to persistent storage.
    fn save(&self, config: &AppConfig) -> Result<(), DomainError>;

    fn config_path(&self) -> PathBuf;

    /// Application data directory.
    fn data_dir(&self) -> PathBuf;

    fn logs_dir(&self) -> PathBuf;

    /// Default model directory, used unless the configuration overrides it.
    fn models_dir(&self) -> PathBuf {
        self.data_dir().join("models")
    }
}
