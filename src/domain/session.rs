use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Push-to-talk turn state machine.
///
/// State transitions:
/// - Idle -> Starting (press while connected)
/// - Starting -> Recording (backend confirmed capture)
/// - Starting -> Idle (backend rejected capture)
/// - Recording -> Transcribing (release)
/// - Transcribing -> AwaitingResponse (transcript received)
/// - Transcribing -> Idle (transcription failed)
/// - AwaitingResponse -> Delivered (response received)
/// - AwaitingResponse -> Idle (response failed, transcript still reported)
/// - Delivered -> Idle (consumer acknowledged)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PttState {
    /// No turn in progress.
    Idle,
    /// Waiting for the backend to confirm that capture started.
    Starting,
    /// Capturing the pilot's transmission.
    Recording,
    /// Capture stopped, waiting for the transcript.
    Transcribing,
    /// Transcript received, waiting for the controller's reply.
    AwaitingResponse,
    /// Reply available, waiting for the consumer to acknowledge it.
    Delivered,
}

impl PttState {
    /// Check if a press may open a new turn from this state.
    #[must_use]
    pub fn can_press(&self) -> bool {
        matches!(self, PttState::Idle)
    }

    /// Check if a release ends capture from this state.
    #[must_use]
    pub fn can_release(&self) -> bool {
        matches!(self, PttState::Recording)
    }

    /// Check if a backend call is outstanding in this state.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PttState::Starting | PttState::Transcribing | PttState::AwaitingResponse
        )
    }
}

/// Language of a voice turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Zh,
    En,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zh" => Ok(Language::Zh),
            "en" => Ok(Language::En),
            other => Err(DomainError::Config(format!(
                "Unsupported language '{}', expected 'zh' or 'en'",
                other
            ))),
        }
    }
}

/// One push-to-talk voice turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PttSession {
    pub state: PttState,
    pub language: Language,
    pub transcript: Option<String>,
    pub response_text: Option<String>,
}

impl PttSession {
    pub fn new(language: Language) -> Self {
        Self {
            state: PttState::Starting,
            language,
            transcript: None,
            response_text: None,
        }
    }
}

/// Events emitted by the push-to-talk machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionEvent {
    /// Machine state changed.
    StateChanged { from: PttState, to: PttState },
    /// The pilot's transmission was transcribed.
    Transcript { text: String },
    /// The controller replied.
    Response { text: String },
    /// The turn ended with an error.
    Failed { message: String, transcript: Option<String> },
}
