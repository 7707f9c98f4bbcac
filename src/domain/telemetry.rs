use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Supported flight simulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulatorKind {
    /// X-Plane via UDP data output.
    XPlane,
    /// Microsoft Flight Simulator via SimConnect.
    Msfs,
}

impl SimulatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulatorKind::XPlane => "xplane",
            SimulatorKind::Msfs => "msfs",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SimulatorKind::XPlane => "X-Plane",
            SimulatorKind::Msfs => "MSFS",
        }
    }
}

impl fmt::Display for SimulatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimulatorKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "xplane" => Ok(SimulatorKind::XPlane),
            "msfs" => Ok(SimulatorKind::Msfs),
            other => Err(DomainError::Simulator(format!(
                "Invalid simulator type '{}'. Use 'xplane' or 'msfs'",
                other
            ))),
        }
    }
}

/// Aircraft telemetry snapshot. Informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightData {
    pub callsign: String,
    /// Feet.
    pub altitude: f64,
    /// Knots.
    pub speed: f64,
    /// Degrees.
    pub heading: f64,
    /// Feet per minute. Zero when the simulator does not report it.
    #[serde(default)]
    pub vertical_speed: f64,
    /// Ground contact as reported by the simulator.
    #[serde(default)]
    pub on_ground: bool,
}

impl FlightData {
    /// Reported ground contact, or a stationary sample at field level for
    /// simulators that do not report it.
    pub fn is_on_ground(&self) -> bool {
        self.on_ground || (self.altitude < 10.0 && self.vertical_speed.abs() < 100.0)
    }
}
