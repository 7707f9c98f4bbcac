use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use crate::adapters::{ChatCompletionResponder, FsModelStorage, HttpTransport, TomlConfigStore};
use crate::app::{
    ModelLifecycleManager, PressOutcome, PttSessionMachine, ReleaseOutcome, TelemetryPoller,
};
use crate::domain::{
    AppConfig, DomainError, DownloadProgress, FlightData, Language, ModelCatalog,
    ModelDescriptor, ModelsState, PhaseInfo, PttSession, PttState, SessionEvent, SimulatorKind,
};
use crate::infrastructure::init_logging;
use crate::ports::{
    AtcResponder, ConfigStore, HttpClient, RecognitionEngine, SimulatorLink, VoiceBackend,
};

/// External services the controller drives.
///
/// When no responder is given, replies come from the configured
/// chat-completions endpoint.
pub struct Backends {
    pub engine: Arc<dyn RecognitionEngine>,
    pub voice: Arc<dyn VoiceBackend>,
    pub simulator: Arc<dyn SimulatorLink>,
    pub responder: Option<Arc<dyn AtcResponder>>,
}

/// Application controller that owns configuration, logging and every component.
pub struct AppController {
    config: RwLock<AppConfig>,
    config_store: Arc<dyn ConfigStore>,
    http: Arc<HttpTransport>,
    models: ModelLifecycleManager,
    ptt: PttSessionMachine,
    simulator: Arc<dyn SimulatorLink>,
    responder: Arc<dyn AtcResponder>,
    telemetry: TelemetryPoller,
    _log_guard: Option<WorkerGuard>,
}

impl AppController {
    /// Initialize from the per-user data directory, including logging.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(backends: Backends) -> Result<Self, DomainError> {
        // Step 1: Initialize config store
        let config_store = Arc::new(TomlConfigStore::new()?);

        // Step 2: Load configuration
        let config = config_store.load()?;

        // Step 3: Initialize logging
        let log_guard = init_logging(
            &config_store.logs_dir(),
            &config.logging.level,
            config.logging.file_logging,
            config.logging.max_files,
        )?;

        info!(version = env!("CARGO_PKG_VERSION"), "Virtual ATC starting up");

        Self::build(config, config_store, backends, log_guard)
    }

    /// Initialize from an explicit config store, leaving logging to the caller.
    pub fn with_config_store(
        config_store: Arc<dyn ConfigStore>,
        backends: Backends,
    ) -> Result<Self, DomainError> {
        let config = config_store.load()?;
        Self::build(config, config_store, backends, None)
    }

    fn build(
        config: AppConfig,
        config_store: Arc<dyn ConfigStore>,
        backends: Backends,
        log_guard: Option<WorkerGuard>,
    ) -> Result<Self, DomainError> {
        let http = Arc::new(HttpTransport::new(&config.network)?);

        let models_dir = config
            .models
            .models_dir
            .clone()
            .unwrap_or_else(|| config_store.models_dir());
        let storage = Arc::new(FsModelStorage::new(models_dir)?);

        let models = ModelLifecycleManager::new(
            ModelCatalog::builtin()?,
            http.clone(),
            storage,
            backends.engine,
        )?;

        let responder: Arc<dyn AtcResponder> = match backends.responder {
            Some(responder) => responder,
            None => Arc::new(ChatCompletionResponder::new(
                http.clone(),
                config.responder.clone(),
            )),
        };

        let telemetry = TelemetryPoller::new(
            Arc::clone(&backends.simulator),
            Duration::from_millis(config.telemetry.poll_interval_ms),
        );

        let ptt = PttSessionMachine::new(
            backends.voice,
            Arc::clone(&responder),
            Arc::clone(&backends.simulator),
            config.session.default_language,
        )
        .with_flight_tracker(telemetry.tracker());

        info!(
            local_only = config.network.local_only,
            language = %config.session.default_language,
            "AppController initialized"
        );

        Ok(Self {
            config: RwLock::new(config),
            config_store,
            http,
            models,
            ptt,
            simulator: backends.simulator,
            responder,
            telemetry,
            _log_guard: log_guard,
        })
    }

    /// Load the model named by `models.auto_load`, if any.
    ///
    /// Failures are logged and otherwise ignored.
    pub async fn auto_load(&self) -> Option<String> {
        let filename = self.config.read().models.auto_load.clone()?;
        match self.models.load(&filename).await {
            Ok(()) => {
                info!(filename = %filename, "Auto-loaded model");
                Some(filename)
            }
            Err(e) => {
                warn!(filename = %filename, error = %e, "Auto-load failed");
                None
            }
        }
    }

    /// Stop background work and release the engine and simulator.
    pub async fn shutdown(&self) {
        self.telemetry.stop();
        if self.simulator.is_connected() {
            self.simulator.disconnect().await;
        }
        self.models.unload();
        info!("AppController shut down");
    }

    // ==================== Models ====================

    pub fn models(&self) -> &ModelLifecycleManager {
        &self.models
    }

    pub fn list_available_models(&self) -> Vec<ModelDescriptor> {
        self.models.list_available().to_vec()
    }

    pub fn list_downloaded_models(&self) -> Result<Vec<String>, DomainError> {
        self.models.list_downloaded()
    }

    pub async fn download_model(&self, name: &str) -> Result<String, DomainError> {
        self.models.download(name).await
    }

    pub fn subscribe_download_progress(&self) -> broadcast::Receiver<DownloadProgress> {
        self.models.subscribe_progress()
    }

    pub fn delete_model(&self, filename: &str) -> Result<(), DomainError> {
        self.models.delete(filename)
    }

    pub async fn load_model(&self, filename: &str) -> Result<(), DomainError> {
        self.models.load(filename).await
    }

    pub fn unload_model(&self) {
        self.models.unload();
    }

    pub async fn verify_model(&self, filename: &str) -> Result<bool, DomainError> {
        self.models.verify(filename).await
    }

    pub fn models_state(&self) -> Result<ModelsState, DomainError> {
        self.models.list_state()
    }

    // ==================== Simulator ====================

    /// Connect to a simulator and start telemetry polling.
    pub async fn connect_simulator(&self, kind: SimulatorKind) -> Result<String, DomainError> {
        let status = self.simulator.connect(kind).await?;
        self.telemetry.start();
        info!(simulator = %kind, "Simulator connected");
        Ok(status)
    }

    pub async fn disconnect_simulator(&self) {
        self.telemetry.stop();
        self.simulator.disconnect().await;
        info!("Simulator disconnected");
    }

    pub fn is_simulator_connected(&self) -> bool {
        self.simulator.is_connected()
    }

    /// Latest telemetry, polling directly if no sample has arrived yet.
    pub async fn get_flight_data(&self) -> Result<FlightData, DomainError> {
        if !self.simulator.is_connected() {
            return Err(DomainError::NotConnected);
        }
        if let Some(data) = self.telemetry.latest() {
            return Ok(data);
        }
        let data = self.simulator.flight_data().await?;
        self.telemetry.tracker().record(data.clone());
        Ok(data)
    }

    /// Phase of flight derived from telemetry, named in the session language.
    pub fn current_phase(&self) -> PhaseInfo {
        self.telemetry.tracker().phase_info(self.ptt.language())
    }

    // ==================== Push-to-talk ====================

    pub async fn ptt_press(&self) -> Result<PressOutcome, DomainError> {
        self.ptt.press().await
    }

    pub async fn ptt_release(&self) -> Result<ReleaseOutcome, DomainError> {
        self.ptt.release().await
    }

    pub fn ptt_acknowledge(&self) -> Option<PttSession> {
        self.ptt.acknowledge()
    }

    pub fn ptt_state(&self) -> PttState {
        self.ptt.state()
    }

    pub fn subscribe_session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.ptt.subscribe()
    }

    pub fn set_language(&self, language: Language) {
        self.ptt.set_language(language);
    }

    pub fn language(&self) -> Language {
        self.ptt.language()
    }

    /// Ask for a controller reply to typed text, outside of a PTT turn.
    ///
    /// Works without a simulator; the reply then has no flight data to go on.
    pub async fn get_atc_response(
        &self,
        message: &str,
        language: Language,
    ) -> Result<String, DomainError> {
        if self.simulator.is_connected() && self.telemetry.latest().is_none() {
            if let Err(e) = self.get_flight_data().await {
                debug!(error = %e, "No flight data for typed request");
            }
        }
        let context = self.telemetry.tracker().context();
        self.responder
            .get_atc_response(message, language, &context)
            .await
    }

    // ==================== Configuration ====================

    /// Get the current configuration.
    pub fn config(&self) -> AppConfig {
        self.config.read().clone()
    }

    /// Persist a new configuration and apply what can change at runtime.
    ///
    /// Model directory, responder and telemetry settings take effect on restart.
    pub fn update_config(&self, config: AppConfig) -> Result<(), DomainError> {
        self.http.set_local_only(config.network.local_only);
        self.http
            .set_allowed_domains(config.network.allowed_domains.clone());

        if self.config.read().session.default_language != config.session.default_language {
            self.ptt.set_language(config.session.default_language);
        }

        // Save to disk
        self.config_store.save(&config)?;

        // Update in-memory config
        *self.config.write() = config;

        info!("Configuration updated");
        Ok(())
    }

    /// Check if network is currently blocked.
    pub fn is_network_blocked(&self) -> bool {
        self.http.is_network_blocked()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.config_store.data_dir()
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.config_store.logs_dir()
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_store.config_path()
    }
}
