use async_trait::async_trait;

use crate::domain::{DomainError, FlightContext, Language};

/// Port for the capture and transcription backend.
#[async_trait]
pub trait VoiceBackend: Send + Sync {
    /// Start capturing the pilot's transmission.
    async fn start_recording(&self) -> Result<(), DomainError>;

    /// Stop capturing and return the transcript of what was said.
    async fn stop_recording(&self) -> Result<String, DomainError>;
}

/// Port for generating the controller's reply to a transmission.
#[async_trait]
pub trait AtcResponder: Send + Sync {
    /// Reply to `message`, taking the current flight into account.
    async fn get_atc_response(
        &self,
        message: &str,
        language: Language,
        context: &FlightContext,
    ) -> Result<String, DomainError>;
}
