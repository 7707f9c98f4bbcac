use std::path::Path;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Port for the speech-recognition engine that consumes model files.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Load a model from the specified path, replacing any loaded model.
    async fn load_model(&self, path: &Path) -> Result<(), DomainError>;

    /// Unload the current model to free resources.
    fn unload_model(&self);

    /// Check if a model is currently loaded.
    fn is_model_loaded(&self) -> bool;
}
