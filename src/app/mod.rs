pub mod controller;
pub mod download;
pub mod lifecycle;
pub mod model_store;
pub mod ptt;
pub mod telemetry;

pub use controller::{AppController, Backends};
pub use download::{DownloadCoordinator, DownloadEvent, DownloadHandle};
pub use lifecycle::ModelLifecycleManager;
pub use model_store::ModelStore;
pub use ptt::{PressOutcome, PttSessionMachine, ReleaseOutcome};
pub use telemetry::{FlightTracker, TelemetryPoller};
