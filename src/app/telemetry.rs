use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::{
    FlightContext, FlightData, FlightPhase, FlightPhaseDetector, Language, PhaseInfo,
};
use crate::ports::SimulatorLink;

/// Latest telemetry sample and the flight phase derived from the samples so far.
///
/// Cloning shares the same state.
#[derive(Clone)]
pub struct FlightTracker {
    latest: Arc<watch::Sender<Option<FlightData>>>,
    detector: Arc<Mutex<FlightPhaseDetector>>,
}

impl Default for FlightTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FlightTracker {
    pub fn new() -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            latest: Arc::new(latest),
            detector: Arc::new(Mutex::new(FlightPhaseDetector::new())),
        }
    }

    /// Publish a sample and advance the phase detector with it.
    pub fn record(&self, data: FlightData) -> FlightPhase {
        let phase = self.detector.lock().update(&data);
        self.latest.send_replace(Some(data));
        phase
    }

    /// Forget the last sample and start phase detection over.
    pub fn reset(&self) {
        self.latest.send_replace(None);
        *self.detector.lock() = FlightPhaseDetector::new();
    }

    pub fn latest(&self) -> Option<FlightData> {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<FlightData>> {
        self.latest.subscribe()
    }

    pub fn phase(&self) -> FlightPhase {
        self.detector.lock().current()
    }

    pub fn phase_info(&self, language: Language) -> PhaseInfo {
        self.detector.lock().info(language)
    }

    pub fn context(&self) -> FlightContext {
        FlightContext {
            flight: self.latest(),
            phase: self.phase(),
        }
    }
}

/// Polls simulator telemetry in the background while a connection is up.
///
/// Poll failures are transient: they are logged and the last good sample
/// stays visible until the next successful poll.
pub struct TelemetryPoller {
    link: Arc<dyn SimulatorLink>,
    interval: Duration,
    tracker: FlightTracker,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryPoller {
    pub fn new(link: Arc<dyn SimulatorLink>, interval: Duration) -> Self {
        Self {
            link,
            interval: interval.max(Duration::from_millis(1)),
            tracker: FlightTracker::new(),
            task: Mutex::new(None),
        }
    }

    /// Start polling, restarting if already running.
    pub fn start(&self) {
        let link = Arc::clone(&self.link);
        let tracker = self.tracker.clone();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                match link.flight_data().await {
                    Ok(data) => {
                        tracker.record(data);
                    }
                    Err(e) => warn!(error = %e, "Telemetry poll failed, skipping"),
                }
            }
        });

        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
        info!(interval_ms = period.as_millis() as u64, "Telemetry polling started");
    }

    /// Stop polling and forget the last sample and the detected phase.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            info!("Telemetry polling stopped");
        }
        self.tracker.reset();
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Most recent sample, if one arrived since polling started.
    pub fn latest(&self) -> Option<FlightData> {
        self.tracker.latest()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<FlightData>> {
        self.tracker.subscribe()
    }

    /// Shared view of the samples, for components that need flight context.
    pub fn tracker(&self) -> FlightTracker {
        self.tracker.clone()
    }
}

impl Drop for TelemetryPoller {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
            debug!("Telemetry task aborted on drop");
        }
    }
}
