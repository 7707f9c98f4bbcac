pub mod config;
pub mod error;
pub mod flight_phase;
pub mod model;
pub mod session;
pub mod telemetry;

pub use config::AppConfig;
pub use error::DomainError;
pub use flight_phase::{FlightContext, FlightPhase, FlightPhaseDetector, PhaseInfo};
pub use model::{
    DownloadProgress, DownloadState, ModelCatalog, ModelDescriptor, ModelsState,
};
pub use session::{Language, PttSession, PttState, SessionEvent};
pub use telemetry::{FlightData, SimulatorKind};
