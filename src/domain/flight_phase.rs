use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{FlightData, Language};

/// Feet. Below this the aircraft counts as low for takeoff and landing checks.
const LOW_ALTITUDE_FT: f64 = 500.0;
/// Feet. At or above this with level flight is cruise.
const CRUISE_ALTITUDE_FT: f64 = 20_000.0;
/// Feet. Ceiling of the approach band.
const APPROACH_CEILING_FT: f64 = 5_000.0;
/// Knots. Ground speed separating taxi from a takeoff or landing roll.
const ROLL_SPEED_KT: f64 = 60.0;

/// Phase of flight, as inferred from telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightPhase {
    PreFlight,
    Taxi,
    Takeoff,
    Climb,
    Cruise,
    Descent,
    Approach,
    Landing,
    GoAround,
}

impl FlightPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightPhase::PreFlight => "pre_flight",
            FlightPhase::Taxi => "taxi",
            FlightPhase::Takeoff => "takeoff",
            FlightPhase::Climb => "climb",
            FlightPhase::Cruise => "cruise",
            FlightPhase::Descent => "descent",
            FlightPhase::Approach => "approach",
            FlightPhase::Landing => "landing",
            FlightPhase::GoAround => "go_around",
        }
    }

    pub fn display_name(&self, language: Language) -> &'static str {
        match (language, self) {
            (Language::Zh, FlightPhase::PreFlight) => "飞行前",
            (Language::Zh, FlightPhase::Taxi) => "滑行",
            (Language::Zh, FlightPhase::Takeoff) => "起飞",
            (Language::Zh, FlightPhase::Climb) => "爬升",
            (Language::Zh, FlightPhase::Cruise) => "巡航",
            (Language::Zh, FlightPhase::Descent) => "下降",
            (Language::Zh, FlightPhase::Approach) => "进近",
            (Language::Zh, FlightPhase::Landing) => "着陆",
            (Language::Zh, FlightPhase::GoAround) => "复飞",
            (Language::En, FlightPhase::PreFlight) => "Pre-flight",
            (Language::En, FlightPhase::Taxi) => "Taxi",
            (Language::En, FlightPhase::Takeoff) => "Takeoff",
            (Language::En, FlightPhase::Climb) => "Climb",
            (Language::En, FlightPhase::Cruise) => "Cruise",
            (Language::En, FlightPhase::Descent) => "Descent",
            (Language::En, FlightPhase::Approach) => "Approach",
            (Language::En, FlightPhase::Landing) => "Landing",
            (Language::En, FlightPhase::GoAround) => "Go-around",
        }
    }

    /// What a controller typically issues in this phase, for the reply prompt.
    pub fn guidance(&self, language: Language) -> &'static str {
        match (language, self) {
            (Language::Zh, FlightPhase::PreFlight) => {
                "飞行员正在准备起飞。你应该提供：天气信息、跑道信息、放行许可、滑行指令。"
            }
            (Language::Zh, FlightPhase::Taxi) => {
                "飞行员正在滑行。你应该提供：滑行路线指引、等待指令、跑道穿越许可。"
            }
            (Language::Zh, FlightPhase::Takeoff) => {
                "飞行员正在起飞。你应该提供：起飞许可、初始爬升指令、离场航向。"
            }
            (Language::Zh, FlightPhase::Climb) => {
                "飞行员正在爬升。你应该提供：爬升高度指令、航向调整、频率切换。"
            }
            (Language::Zh, FlightPhase::Cruise) => {
                "飞行员正在巡航。你应该提供：高度保持确认、航路调整、天气信息。"
            }
            (Language::Zh, FlightPhase::Descent) => {
                "飞行员正在下降。你应该提供：下降许可、目标高度、进近准备。"
            }
            (Language::Zh, FlightPhase::Approach) => {
                "飞行员正在进近。你应该提供：进近许可、最后进近指令、着陆许可。"
            }
            (Language::Zh, FlightPhase::Landing) => {
                "飞行员正在着陆。你应该提供：着陆许可确认、脱离跑道指令、滑行指引。"
            }
            (Language::Zh, FlightPhase::GoAround) => {
                "飞行员正在复飞。你应该提供：复飞指令确认、爬升高度、复飞航向。"
            }
            (Language::En, FlightPhase::PreFlight) => {
                "Pilot is preparing for departure. Provide weather, runway information, \
                 clearance delivery or taxi instructions."
            }
            (Language::En, FlightPhase::Taxi) => {
                "Pilot is taxiing. Provide taxi routing, hold short instructions or \
                 runway crossing clearance."
            }
            (Language::En, FlightPhase::Takeoff) => {
                "Pilot is taking off. Provide takeoff clearance, initial climb or \
                 departure heading."
            }
            (Language::En, FlightPhase::Climb) => {
                "Pilot is climbing. Provide climb altitude, heading adjustments or \
                 frequency changes."
            }
            (Language::En, FlightPhase::Cruise) => {
                "Pilot is cruising. Provide altitude confirmation, route adjustments \
                 or weather."
            }
            (Language::En, FlightPhase::Descent) => {
                "Pilot is descending. Provide descent clearance, target altitude or \
                 approach preparation."
            }
            (Language::En, FlightPhase::Approach) => {
                "Pilot is on approach. Provide approach clearance, final approach \
                 instructions or landing clearance."
            }
            (Language::En, FlightPhase::Landing) => {
                "Pilot is landing. Provide landing clearance confirmation, runway exit \
                 or taxi guidance."
            }
            (Language::En, FlightPhase::GoAround) => {
                "Pilot is going around. Confirm the go-around and provide climb \
                 altitude and heading."
            }
        }
    }
}

impl fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current phase and how long it has lasted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseInfo {
    pub phase: FlightPhase,
    pub display_name: String,
    pub duration_seconds: u64,
}

/// What the reply generator knows about the flight at the time of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightContext {
    /// Latest telemetry, `None` when no simulator sample is available.
    pub flight: Option<FlightData>,
    pub phase: FlightPhase,
}

impl Default for FlightContext {
    fn default() -> Self {
        Self {
            flight: None,
            phase: FlightPhase::PreFlight,
        }
    }
}

/// Tracks the phase of flight across telemetry samples.
///
/// A sample that matches no rule keeps the current phase.
#[derive(Debug)]
pub struct FlightPhaseDetector {
    current: FlightPhase,
    since: Instant,
}

impl Default for FlightPhaseDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FlightPhaseDetector {
    pub fn new() -> Self {
        Self {
            current: FlightPhase::PreFlight,
            since: Instant::now(),
        }
    }

    /// Feed one sample and return the phase it leaves the detector in.
    pub fn update(&mut self, data: &FlightData) -> FlightPhase {
        let detected = self.detect(data);
        if detected != self.current {
            info!(from = %self.current, to = %detected, "Flight phase changed");
            self.current = detected;
            self.since = Instant::now();
        }
        self.current
    }

    pub fn current(&self) -> FlightPhase {
        self.current
    }

    pub fn phase_duration(&self) -> Duration {
        self.since.elapsed()
    }

    pub fn info(&self, language: Language) -> PhaseInfo {
        PhaseInfo {
            phase: self.current,
            display_name: self.current.display_name(language).to_string(),
            duration_seconds: self.phase_duration().as_secs(),
        }
    }

    fn detect(&self, data: &FlightData) -> FlightPhase {
        let alt = data.altitude;
        let speed = data.speed;
        let vs = data.vertical_speed;
        let on_ground = data.is_on_ground();

        if on_ground && speed < 5.0 {
            return FlightPhase::PreFlight;
        }
        if on_ground && speed < ROLL_SPEED_KT {
            return FlightPhase::Taxi;
        }
        if (on_ground || alt < LOW_ALTITUDE_FT) && speed >= ROLL_SPEED_KT && vs > 500.0 {
            return FlightPhase::Takeoff;
        }
        // Checked before climb, which would otherwise swallow it.
        if self.current == FlightPhase::Approach && !on_ground && alt < 3_000.0 && vs > 1_000.0 {
            return FlightPhase::GoAround;
        }
        if !on_ground && alt < CRUISE_ALTITUDE_FT && vs > 300.0 {
            return FlightPhase::Climb;
        }
        if !on_ground && alt >= CRUISE_ALTITUDE_FT && vs.abs() < 500.0 {
            return FlightPhase::Cruise;
        }
        if !on_ground && alt > APPROACH_CEILING_FT && vs < -300.0 {
            return FlightPhase::Descent;
        }
        if !on_ground && (LOW_ALTITUDE_FT..=APPROACH_CEILING_FT).contains(&alt) && vs < -100.0 {
            return FlightPhase::Approach;
        }
        if (on_ground && speed > ROLL_SPEED_KT) || (!on_ground && alt < LOW_ALTITUDE_FT && vs < -100.0)
        {
            return FlightPhase::Landing;
        }

        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(altitude: f64, speed: f64, vertical_speed: f64, on_ground: bool) -> FlightData {
        FlightData {
            callsign: "CCA1234".to_string(),
            altitude,
            speed,
            heading: 90.0,
            vertical_speed,
            on_ground,
        }
    }

    #[test]
    fn test_ground_phases() {
        let mut detector = FlightPhaseDetector::new();
        assert_eq!(detector.update(&sample(0.0, 0.0, 0.0, true)), FlightPhase::PreFlight);
        assert_eq!(detector.update(&sample(0.0, 20.0, 0.0, true)), FlightPhase::Taxi);
        assert_eq!(
            detector.update(&sample(0.0, 140.0, 0.0, true)),
            FlightPhase::Landing
        );
    }

    #[test]
    fn test_departure_to_cruise() {
        let mut detector = FlightPhaseDetector::new();
        assert_eq!(
            detector.update(&sample(100.0, 120.0, 1500.0, false)),
            FlightPhase::Takeoff
        );
        assert_eq!(
            detector.update(&sample(8000.0, 250.0, 2000.0, false)),
            FlightPhase::Climb
        );
        assert_eq!(
            detector.update(&sample(35000.0, 450.0, 0.0, false)),
            FlightPhase::Cruise
        );
    }

    #[test]
    fn test_arrival_and_go_around() {
        let mut detector = FlightPhaseDetector::new();
        assert_eq!(
            detector.update(&sample(12000.0, 280.0, -1500.0, false)),
            FlightPhase::Descent
        );
        assert_eq!(
            detector.update(&sample(2500.0, 160.0, -700.0, false)),
            FlightPhase::Approach
        );
        assert_eq!(
            detector.update(&sample(800.0, 150.0, 1800.0, false)),
            FlightPhase::GoAround
        );
    }

    #[test]
    fn test_level_flight_below_cruise_keeps_phase() {
        let mut detector = FlightPhaseDetector::new();
        detector.update(&sample(8000.0, 250.0, 2000.0, false));
        assert_eq!(
            detector.update(&sample(9000.0, 250.0, 0.0, false)),
            FlightPhase::Climb
        );
    }

    #[test]
    fn test_x_plane_style_sample_counts_as_on_ground() {
        let mut detector = FlightPhaseDetector::new();
        detector.update(&sample(35000.0, 450.0, 0.0, false));

        // No explicit ground flag, but parked at field elevation.
        assert_eq!(detector.update(&sample(0.0, 0.0, 0.0, false)), FlightPhase::PreFlight);
    }

    #[test]
    fn test_info_names_phase_in_language() {
        let detector = FlightPhaseDetector::new();
        let info = detector.info(Language::Zh);
        assert_eq!(info.phase, FlightPhase::PreFlight);
        assert_eq!(info.display_name, "飞行前");
        assert_eq!(
            serde_json::to_value(&info).unwrap()["phase"],
            "pre_flight"
        );
        assert_eq!(FlightPhase::GoAround.display_name(Language::En), "Go-around");
    }
}
