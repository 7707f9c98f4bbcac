use thiserror::Error;

/// Domain-level errors for the ATC voice core.
///
/// Every variant renders a message that can be shown to the user as is.
#[derive(Error, Debug, Clone)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network request blocked: {reason}")]
    NetworkBlocked { reason: String },

    #[error("HTTP request failed: {0}")]
    HttpRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Operation already in progress for {0}")]
    AlreadyInProgress(String),

    #[error("Download of {model} failed: {reason}")]
    DownloadFailed { model: String, reason: String },

    #[error("Model is not downloaded: {0}")]
    NotPresent(String),

    #[error("Model {0} is loaded and cannot be deleted; unload it first")]
    InUse(String),

    #[error("Failed to load model {filename}: {reason}")]
    LoadFailed { filename: String, reason: String },

    #[error("Not connected to a simulator")]
    NotConnected,

    #[error("Simulator error: {0}")]
    Simulator(String),

    #[error("Failed to start recording: {0}")]
    RecordingFailed(String),

    #[error("Could not understand the transmission: {0}")]
    TranscriptionFailed(String),

    #[error("Heard \"{transcript}\" but no ATC response is available: {reason}")]
    ResponseFailed { transcript: String, reason: String },
}

impl DomainError {
    /// Transcript carried by a failed turn, if the backend got that far.
    pub fn transcript(&self) -> Option<&str> {
        match self {
            DomainError::ResponseFailed { transcript, .. } => Some(transcript),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(err: toml::de::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DomainError {
    fn from(err: toml::ser::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
