//! In-memory doubles for the ports, shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

use crate::domain::{DomainError, FlightContext, FlightData, Language, SimulatorKind};
use crate::ports::{
    AtcResponder, ByteStream, HttpClient, RecognitionEngine, SimulatorLink, VoiceBackend,
};

enum Download {
    Chunks {
        total: Option<u64>,
        chunks: Vec<Result<Vec<u8>, String>>,
    },
    Live {
        total: Option<u64>,
        rx: mpsc::Receiver<Result<Vec<u8>, DomainError>>,
    },
    Refuse(String),
}

type JsonRequest = (String, Option<String>, serde_json::Value);

/// Scripted HTTP client.
#[derive(Default)]
pub struct FakeHttp {
    downloads: Mutex<HashMap<String, Download>>,
    json_reply: Mutex<Option<Result<serde_json::Value, String>>>,
    json_requests: Mutex<Vec<JsonRequest>>,
    fetches: AtomicUsize,
}

impl FakeHttp {
    /// Serve a fixed body, split into the given chunks, every time `url` is fetched.
    pub fn serve(&self, url: &str, total: Option<u64>, chunks: Vec<Result<Vec<u8>, String>>) {
        self.downloads
            .lock()
            .insert(url.to_string(), Download::Chunks { total, chunks });
    }

    /// Serve `url` once, with chunks pushed by the test through the returned sender.
    pub fn serve_live(
        &self,
        url: &str,
        total: Option<u64>,
    ) -> mpsc::Sender<Result<Vec<u8>, DomainError>> {
        let (tx, rx) = mpsc::channel(16);
        self.downloads
            .lock()
            .insert(url.to_string(), Download::Live { total, rx });
        tx
    }

    /// Fail the request for `url` before any byte arrives.
    pub fn refuse(&self, url: &str, reason: &str) {
        self.downloads
            .lock()
            .insert(url.to_string(), Download::Refuse(reason.to_string()));
    }

    pub fn reply_json(&self, reply: Result<serde_json::Value, String>) {
        *self.json_reply.lock() = Some(reply);
    }

    pub fn json_requests(&self) -> Vec<JsonRequest> {
        self.json_requests.lock().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn fetch(&self, url: &str) -> Result<ByteStream, DomainError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let mut downloads = self.downloads.lock();
        match downloads.remove(url) {
            Some(Download::Chunks { total, chunks }) => {
                downloads.insert(
                    url.to_string(),
                    Download::Chunks {
                        total,
                        chunks: chunks.clone(),
                    },
                );
                let items: Vec<Result<Vec<u8>, DomainError>> = chunks
                    .into_iter()
                    .map(|c| c.map_err(DomainError::HttpRequest))
                    .collect();
                Ok(ByteStream {
                    total,
                    chunks: stream::iter(items).boxed(),
                })
            }
            Some(Download::Live { total, rx }) => {
                let chunks = stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                })
                .boxed();
                Ok(ByteStream { total, chunks })
            }
            Some(Download::Refuse(reason)) => Err(DomainError::HttpRequest(reason)),
            None => Err(DomainError::HttpRequest(format!("HTTP 404 Not Found for {}", url))),
        }
    }

    async fn post_json(
        &self,
        url: &str,
        bearer_token: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        self.json_requests.lock().push((
            url.to_string(),
            bearer_token.map(str::to_string),
            body.clone(),
        ));
        match self.json_reply.lock().clone() {
            Some(Ok(value)) => Ok(value),
            Some(Err(reason)) => Err(DomainError::HttpRequest(reason)),
            None => Err(DomainError::HttpRequest("no scripted reply".to_string())),
        }
    }

    fn is_network_blocked(&self) -> bool {
        false
    }

    fn allowed_domains(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Recognition engine that remembers what it loaded.
#[derive(Default)]
pub struct FakeEngine {
    loaded: Mutex<Option<PathBuf>>,
    reject: Mutex<Option<String>>,
    load_gate: Mutex<Option<Arc<Notify>>>,
    loads: AtomicUsize,
}

impl FakeEngine {
    pub fn reject_loads(&self, reason: &str) {
        *self.reject.lock() = Some(reason.to_string());
    }

    /// Hold `load_model` until the returned notify fires.
    pub fn gate_loads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.load_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn loaded_path(&self) -> Option<PathBuf> {
        self.loaded.lock().clone()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionEngine for FakeEngine {
    async fn load_model(&self, path: &Path) -> Result<(), DomainError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let gate = self.load_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(reason) = self.reject.lock().clone() {
            return Err(DomainError::Io(reason));
        }
        *self.loaded.lock() = Some(path.to_path_buf());
        Ok(())
    }

    fn unload_model(&self) {
        self.loaded.lock().take();
    }

    fn is_model_loaded(&self) -> bool {
        self.loaded.lock().is_some()
    }
}

/// Capture backend with scripted outcomes.
pub struct FakeVoice {
    start_error: Mutex<Option<String>>,
    transcript: Mutex<Result<String, String>>,
    start_gate: Mutex<Option<Arc<Notify>>>,
    stop_gate: Mutex<Option<Arc<Notify>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl Default for FakeVoice {
    fn default() -> Self {
        Self {
            start_error: Mutex::new(None),
            transcript: Mutex::new(Ok("request descend to 3000".to_string())),
            start_gate: Mutex::new(None),
            stop_gate: Mutex::new(None),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }
}

impl FakeVoice {
    pub fn fail_start(&self, reason: &str) {
        *self.start_error.lock() = Some(reason.to_string());
    }

    pub fn set_transcript(&self, transcript: Result<&str, &str>) {
        *self.transcript.lock() = transcript.map(str::to_string).map_err(str::to_string);
    }

    /// Hold `start_recording` until the returned notify fires.
    pub fn gate_start(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.start_gate.lock() = Some(gate.clone());
        gate
    }

    /// Hold `stop_recording` until the returned notify fires.
    pub fn gate_stop(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.stop_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceBackend for FakeVoice {
    async fn start_recording(&self) -> Result<(), DomainError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let gate = self.start_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.start_error.lock().clone() {
            Some(reason) => Err(DomainError::RecordingFailed(reason)),
            None => Ok(()),
        }
    }

    async fn stop_recording(&self) -> Result<String, DomainError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        let gate = self.stop_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.transcript
            .lock()
            .clone()
            .map_err(DomainError::TranscriptionFailed)
    }
}

/// Responder with a scripted reply.
pub struct FakeResponder {
    reply: Mutex<Result<String, DomainError>>,
    calls: Mutex<Vec<(String, Language)>>,
    contexts: Mutex<Vec<FlightContext>>,
}

impl Default for FakeResponder {
    fn default() -> Self {
        Self {
            reply: Mutex::new(Ok("CCA1234, descend and maintain 3000".to_string())),
            calls: Mutex::new(Vec::new()),
            contexts: Mutex::new(Vec::new()),
        }
    }
}

impl FakeResponder {
    /// Script the reply. An error string becomes a transport failure.
    pub fn set_reply(&self, reply: Result<&str, &str>) {
        *self.reply.lock() = reply
            .map(str::to_string)
            .map_err(|reason| DomainError::HttpRequest(reason.to_string()));
    }

    pub fn fail_with(&self, error: DomainError) {
        *self.reply.lock() = Err(error);
    }

    pub fn calls(&self) -> Vec<(String, Language)> {
        self.calls.lock().clone()
    }

    pub fn last_context(&self) -> Option<FlightContext> {
        self.contexts.lock().last().cloned()
    }
}

#[async_trait]
impl AtcResponder for FakeResponder {
    async fn get_atc_response(
        &self,
        message: &str,
        language: Language,
        context: &FlightContext,
    ) -> Result<String, DomainError> {
        self.calls.lock().push((message.to_string(), language));
        self.contexts.lock().push(context.clone());
        self.reply.lock().clone()
    }
}

/// Simulator link with scripted telemetry.
#[derive(Default)]
pub struct FakeSimulator {
    connected: AtomicBool,
    refuse: Mutex<Option<String>>,
    telemetry: Mutex<VecDeque<Result<FlightData, String>>>,
    polls: AtomicUsize,
}

impl FakeSimulator {
    pub fn connected() -> Self {
        let sim = Self::default();
        sim.connected.store(true, Ordering::SeqCst);
        sim
    }

    pub fn refuse_connect(&self, reason: &str) {
        *self.refuse.lock() = Some(reason.to_string());
    }

    pub fn push_telemetry(&self, sample: Result<FlightData, &str>) {
        self.telemetry
            .lock()
            .push_back(sample.map_err(str::to_string));
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SimulatorLink for FakeSimulator {
    async fn connect(&self, kind: SimulatorKind) -> Result<String, DomainError> {
        if let Some(reason) = self.refuse.lock().clone() {
            return Err(DomainError::Simulator(reason));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(format!("Connected to {}", kind.display_name()))
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn flight_data(&self) -> Result<FlightData, DomainError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        match self.telemetry.lock().pop_front() {
            Some(Ok(data)) => Ok(data),
            Some(Err(reason)) => Err(DomainError::Simulator(reason)),
            None => Err(DomainError::Simulator("no telemetry".to_string())),
        }
    }
}

pub fn flight_data(callsign: &str, altitude: f64) -> FlightData {
    FlightData {
        callsign: callsign.to_string(),
        altitude,
        speed: 250.0,
        heading: 90.0,
        vertical_speed: 0.0,
        on_ground: false,
    }
}
