//! Command surface for an embedding UI shell.
//!
//! Every command takes the controller and reports failures as the error's
//! display string, ready to show to the user.

use std::path::PathBuf;

use serde::Serialize;

use crate::app::{AppController, PressOutcome, ReleaseOutcome};
use crate::domain::{
    AppConfig, FlightData, Language, ModelDescriptor, ModelsState, PhaseInfo, PttSession,
    PttState, SimulatorKind,
};

// ==================== Config Commands ====================

/// Get the current application configuration.
pub fn get_config(controller: &AppController) -> AppConfig {
    controller.config()
}

/// Update the application configuration.
pub fn update_config(controller: &AppController, config: AppConfig) -> Result<(), String> {
    controller.update_config(config).map_err(|e| e.to_string())
}

/// Check if network requests are currently blocked.
pub fn is_network_blocked(controller: &AppController) -> bool {
    controller.is_network_blocked()
}

/// Get application paths information.
pub fn get_paths(controller: &AppController) -> AppPaths {
    AppPaths {
        data_dir: controller.data_dir(),
        logs_dir: controller.logs_dir(),
        config_path: controller.config_path(),
    }
}

/// Application paths information.
#[derive(Debug, Serialize)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub config_path: PathBuf,
}

// ==================== Model Commands ====================

pub fn list_available_models(controller: &AppController) -> Vec<ModelDescriptor> {
    controller.list_available_models()
}

pub fn list_downloaded_models(controller: &AppController) -> Result<Vec<String>, String> {
    controller
        .list_downloaded_models()
        .map_err(|e| e.to_string())
}

/// Download a model by catalog name. Progress goes to the download-progress stream.
pub async fn download_model(controller: &AppController, name: &str) -> Result<String, String> {
    controller
        .download_model(name)
        .await
        .map_err(|e| e.to_string())
}

pub fn delete_model(controller: &AppController, filename: &str) -> Result<(), String> {
    controller
        .delete_model(filename)
        .map_err(|e| e.to_string())
}

pub async fn load_model(controller: &AppController, filename: &str) -> Result<(), String> {
    controller
        .load_model(filename)
        .await
        .map_err(|e| e.to_string())
}

pub fn unload_model(controller: &AppController) {
    controller.unload_model();
}

pub async fn verify_model(controller: &AppController, filename: &str) -> Result<bool, String> {
    controller
        .verify_model(filename)
        .await
        .map_err(|e| e.to_string())
}

pub fn get_models_state(controller: &AppController) -> Result<ModelsState, String> {
    controller.models_state().map_err(|e| e.to_string())
}

// ==================== Simulator Commands ====================

/// Connect to "xplane" or "msfs", returning a status message.
pub async fn connect_simulator(
    controller: &AppController,
    sim_type: &str,
) -> Result<String, String> {
    let kind = sim_type
        .parse::<SimulatorKind>()
        .map_err(|e| e.to_string())?;
    controller
        .connect_simulator(kind)
        .await
        .map_err(|e| e.to_string())
}

pub async fn disconnect_simulator(controller: &AppController) {
    controller.disconnect_simulator().await;
}

pub async fn get_flight_data(controller: &AppController) -> Result<FlightData, String> {
    controller
        .get_flight_data()
        .await
        .map_err(|e| e.to_string())
}

/// Phase of flight inferred from telemetry, with how long it has lasted.
pub fn get_current_phase(controller: &AppController) -> PhaseInfo {
    controller.current_phase()
}

// ==================== Voice Commands ====================

/// PTT key down. Returns the machine state afterwards.
pub async fn ptt_press(controller: &AppController) -> Result<PttState, String> {
    match controller.ptt_press().await.map_err(|e| e.to_string())? {
        PressOutcome::Recording => Ok(PttState::Recording),
        PressOutcome::Ignored(state) => Ok(state),
    }
}

/// PTT key up. Returns the delivered turn, or `None` if no capture was running.
pub async fn ptt_release(controller: &AppController) -> Result<Option<PttSession>, String> {
    match controller.ptt_release().await.map_err(|e| e.to_string())? {
        ReleaseOutcome::Delivered(session) => Ok(Some(session)),
        ReleaseOutcome::Ignored(_) => Ok(None),
    }
}

/// Mark the delivered reply as shown, freeing the machine for the next turn.
pub fn ptt_acknowledge(controller: &AppController) -> Option<PttSession> {
    controller.ptt_acknowledge()
}

pub fn get_ptt_state(controller: &AppController) -> PttState {
    controller.ptt_state()
}

/// Select "zh" or "en" for the next turn.
pub fn set_language(controller: &AppController, language: &str) -> Result<(), String> {
    let language = language.parse::<Language>().map_err(|e| e.to_string())?;
    controller.set_language(language);
    Ok(())
}

/// Ask for a controller reply to typed text.
pub async fn get_atc_response(
    controller: &AppController,
    message: &str,
    language: &str,
) -> Result<String, String> {
    let language = language.parse::<Language>().map_err(|e| e.to_string())?;
    controller
        .get_atc_response(message, language)
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::adapters::TomlConfigStore;
    use crate::app::Backends;
    use crate::test_support::{FakeEngine, FakeResponder, FakeSimulator, FakeVoice};

    fn controller(dir: &std::path::Path) -> AppController {
        let store = Arc::new(TomlConfigStore::with_data_dir(dir.to_path_buf()).unwrap());
        AppController::with_config_store(
            store,
            Backends {
                engine: Arc::new(FakeEngine::default()),
                voice: Arc::new(FakeVoice::default()),
                simulator: Arc::new(FakeSimulator::default()),
                responder: Some(Arc::new(FakeResponder::default())),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_errors_are_display_strings() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path());

        assert_eq!(
            download_model(&controller, "huge").await.unwrap_err(),
            "Unknown model: huge"
        );
        assert_eq!(
            ptt_press(&controller).await.unwrap_err(),
            "Not connected to a simulator"
        );
        assert!(connect_simulator(&controller, "fsx")
            .await
            .unwrap_err()
            .contains("'fsx'"));
        assert!(set_language(&controller, "fr").is_err());
    }

    #[tokio::test]
    async fn test_voice_turn_through_commands() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path());

        set_language(&controller, "en").unwrap();
        connect_simulator(&controller, "xplane").await.unwrap();

        assert_eq!(ptt_press(&controller).await.unwrap(), PttState::Recording);
        assert_eq!(ptt_press(&controller).await.unwrap(), PttState::Recording);

        let session = ptt_release(&controller).await.unwrap().unwrap();
        assert_eq!(session.language, Language::En);
        assert!(session.response_text.is_some());
        assert_eq!(ptt_release(&controller).await.unwrap(), None);

        assert!(ptt_acknowledge(&controller).is_some());
        assert_eq!(get_ptt_state(&controller), PttState::Idle);
        disconnect_simulator(&controller).await;
    }

    #[tokio::test]
    async fn test_paths_and_models_state() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path());

        let paths = get_paths(&controller);
        assert_eq!(paths.logs_dir, dir.path().join("logs"));

        let state = get_models_state(&controller).unwrap();
        assert_eq!(state.available.len(), 5);
        assert!(state.present.is_empty());
        assert!(state.downloading.is_empty());
    }

    #[tokio::test]
    async fn test_current_phase_before_any_telemetry() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path());
        set_language(&controller, "en").unwrap();

        let phase = get_current_phase(&controller);
        assert_eq!(phase.phase, crate::domain::FlightPhase::PreFlight);
        assert_eq!(phase.display_name, "Pre-flight");
    }
}
