use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::app::FlightTracker;
use crate::domain::{DomainError, Language, PttSession, PttState, SessionEvent};
use crate::ports::{AtcResponder, SimulatorLink, VoiceBackend};

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Result of a PTT press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PressOutcome {
    /// Capture is running.
    Recording,
    /// A turn was already in progress; nothing changed.
    Ignored(PttState),
}

/// Result of a PTT release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The turn completed and is waiting to be acknowledged.
    Delivered(PttSession),
    /// No capture was running; nothing changed.
    Ignored(PttState),
}

struct Inner {
    state: PttState,
    session: Option<PttSession>,
}

/// Single-flight push-to-talk state machine.
///
/// Only one backend call is ever outstanding. Presses and releases that do
/// not fit the current state are ignored, never queued.
pub struct PttSessionMachine {
    inner: Mutex<Inner>,
    voice: Arc<dyn VoiceBackend>,
    responder: Arc<dyn AtcResponder>,
    link: Arc<dyn SimulatorLink>,
    flight: FlightTracker,
    language: RwLock<Language>,
    events: broadcast::Sender<SessionEvent>,
}

impl PttSessionMachine {
    pub fn new(
        voice: Arc<dyn VoiceBackend>,
        responder: Arc<dyn AtcResponder>,
        link: Arc<dyn SimulatorLink>,
        language: Language,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                state: PttState::Idle,
                session: None,
            }),
            voice,
            responder,
            link,
            flight: FlightTracker::new(),
            language: RwLock::new(language),
            events,
        }
    }

    /// Take the flight context for replies from a shared tracker.
    ///
    /// Without one, replies are generated with no flight data.
    pub fn with_flight_tracker(mut self, flight: FlightTracker) -> Self {
        self.flight = flight;
        self
    }

    pub fn state(&self) -> PttState {
        self.inner.lock().state
    }

    /// Snapshot of the turn in progress, if any.
    pub fn current_session(&self) -> Option<PttSession> {
        self.inner.lock().session.clone()
    }

    pub fn language(&self) -> Language {
        *self.language.read()
    }

    /// Select the language for the next turn. A running turn keeps its own.
    pub fn set_language(&self, language: Language) {
        *self.language.write() = language;
        debug!(language = %language, "PTT language selected");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Open a turn and start capture.
    pub async fn press(&self) -> Result<PressOutcome, DomainError> {
        {
            let mut inner = self.inner.lock();
            if !inner.state.can_press() {
                debug!(state = ?inner.state, "PTT press ignored");
                return Ok(PressOutcome::Ignored(inner.state));
            }
            if !self.link.is_connected() {
                info!("PTT press without simulator connection");
                return Err(DomainError::NotConnected);
            }

            let language = *self.language.read();
            inner.session = Some(PttSession::new(language));
            self.move_to(&mut inner, PttState::Starting);
        }

        let guard = ResetOnDrop::new(self);
        let started = self.voice.start_recording().await;
        guard.disarm();

        match started {
            Ok(()) => {
                self.move_to(&mut self.inner.lock(), PttState::Recording);
                info!("Recording started");
                Ok(PressOutcome::Recording)
            }
            Err(e) => {
                let error = match e {
                    DomainError::RecordingFailed(_) => e,
                    other => DomainError::RecordingFailed(other.to_string()),
                };
                Err(self.fail(error))
            }
        }
    }

    /// End capture and run the turn through transcription and response.
    pub async fn release(&self) -> Result<ReleaseOutcome, DomainError> {
        let language = {
            let mut inner = self.inner.lock();
            if !inner.state.can_release() {
                debug!(state = ?inner.state, "PTT release ignored");
                return Ok(ReleaseOutcome::Ignored(inner.state));
            }
            self.move_to(&mut inner, PttState::Transcribing);
            inner
                .session
                .as_ref()
                .map(|s| s.language)
                .unwrap_or_else(|| *self.language.read())
        };

        let guard = ResetOnDrop::new(self);

        let transcript = match self.voice.stop_recording().await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                guard.disarm();
                return Err(self.fail(DomainError::TranscriptionFailed(
                    "no speech recognized".to_string(),
                )));
            }
            Err(e) => {
                guard.disarm();
                let error = match e {
                    DomainError::TranscriptionFailed(_) => e,
                    other => DomainError::TranscriptionFailed(other.to_string()),
                };
                return Err(self.fail(error));
            }
        };

        {
            let mut inner = self.inner.lock();
            if let Some(session) = inner.session.as_mut() {
                session.transcript = Some(transcript.clone());
            }
            let _ = self.events.send(SessionEvent::Transcript {
                text: transcript.clone(),
            });
            self.move_to(&mut inner, PttState::AwaitingResponse);
        }
        info!(language = %language, transcript = %transcript, "Transmission transcribed");

        let context = self.flight.context();
        let reply = self
            .responder
            .get_atc_response(&transcript, language, &context)
            .await;
        guard.disarm();

        let response = match reply {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                return Err(self.fail(DomainError::ResponseFailed {
                    transcript,
                    reason: "empty response".to_string(),
                }))
            }
            Err(DomainError::ResponseFailed { reason, .. }) => {
                return Err(self.fail(DomainError::ResponseFailed { transcript, reason }))
            }
            Err(e) => {
                return Err(self.fail(DomainError::ResponseFailed {
                    transcript,
                    reason: e.to_string(),
                }))
            }
        };

        let mut inner = self.inner.lock();
        if let Some(session) = inner.session.as_mut() {
            session.response_text = Some(response.clone());
        }
        let _ = self.events.send(SessionEvent::Response { text: response });
        self.move_to(&mut inner, PttState::Delivered);
        info!("ATC response delivered");

        match inner.session.clone() {
            Some(session) => Ok(ReleaseOutcome::Delivered(session)),
            None => Err(DomainError::ResponseFailed {
                transcript,
                reason: "session lost".to_string(),
            }),
        }
    }

    /// Close a delivered turn, returning it to the caller.
    pub fn acknowledge(&self) -> Option<PttSession> {
        let mut inner = self.inner.lock();
        if inner.state != PttState::Delivered {
            return None;
        }
        self.move_to(&mut inner, PttState::Idle);
        inner.session.take().map(|mut session| {
            session.state = PttState::Idle;
            session
        })
    }

    fn move_to(&self, inner: &mut Inner, to: PttState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        if let Some(session) = inner.session.as_mut() {
            session.state = to;
        }
        debug!(from = ?from, to = ?to, "PTT state changed");
        let _ = self.events.send(SessionEvent::StateChanged { from, to });
    }

    /// Abort the turn, publish the failure and hand the error back.
    fn fail(&self, error: DomainError) -> DomainError {
        let mut inner = self.inner.lock();
        self.move_to(&mut inner, PttState::Idle);
        inner.session = None;

        warn!(error = %error, "PTT turn failed");
        let _ = self.events.send(SessionEvent::Failed {
            message: error.to_string(),
            transcript: error.transcript().map(str::to_string),
        });
        error
    }

    fn reset(&self) {
        let mut inner = self.inner.lock();
        if inner.state == PttState::Idle {
            return;
        }
        warn!(state = ?inner.state, "PTT turn interrupted, returning to idle");
        self.move_to(&mut inner, PttState::Idle);
        inner.session = None;
    }
}

/// Returns the machine to Idle if a press or release future is dropped mid-step.
struct ResetOnDrop<'a> {
    machine: Option<&'a PttSessionMachine>,
}

impl<'a> ResetOnDrop<'a> {
    fn new(machine: &'a PttSessionMachine) -> Self {
        Self {
            machine: Some(machine),
        }
    }

    fn disarm(mut self) {
        self.machine = None;
    }
}

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(machine) = self.machine {
            machine.reset();
        }
    }
}
