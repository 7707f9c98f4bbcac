use async_trait::async_trait;

use crate::domain::{DomainError, FlightData, SimulatorKind};

/// Port for the flight simulator connection.
#[async_trait]
pub trait SimulatorLink: Send + Sync {
    /// Connect to a simulator and return a status message for display.
    async fn connect(&self, kind: SimulatorKind) -> Result<String, DomainError>;

    /// Drop the current connection, if any.
    async fn disconnect(&self);

    /// Check if a simulator connection is established.
    fn is_connected(&self) -> bool;

    /// Read the latest aircraft telemetry.
    async fn flight_data(&self) -> Result<FlightData, DomainError>;
}
