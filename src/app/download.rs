use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::ModelStore;
use crate::domain::model::percent_complete;
use crate::domain::{DomainError, DownloadProgress, DownloadState, ModelDescriptor};
use crate::ports::{HttpClient, ModelStorage, StagedArtifact};

/// Buffered events per download before the transfer waits for the consumer.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Minimum bytes between progress events when the total size is unknown.
const UNKNOWN_TOTAL_STEP: u64 = 256 * 1024;

type InFlightMap = Arc<Mutex<HashMap<String, DownloadState>>>;

/// Events produced by one download, ending with exactly one terminal event.
#[derive(Debug)]
pub enum DownloadEvent {
    Progress(DownloadProgress),
    Completed { model: String, filename: String },
    Failed { model: String, error: DomainError },
}

/// Drives model transfers, at most one per model name at a time.
pub struct DownloadCoordinator {
    http: Arc<dyn HttpClient>,
    storage: Arc<dyn ModelStorage>,
    store: Arc<ModelStore>,
    in_flight: InFlightMap,
}

impl DownloadCoordinator {
    pub fn new(
        http: Arc<dyn HttpClient>,
        storage: Arc<dyn ModelStorage>,
        store: Arc<ModelStore>,
    ) -> Self {
        Self {
            http,
            storage,
            store,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start downloading a model in a background task.
    ///
    /// Fails with `AlreadyInProgress` before any I/O if the model is already
    /// downloading. Must be called from within a tokio runtime.
    pub fn start(&self, descriptor: ModelDescriptor) -> Result<DownloadHandle, DomainError> {
        let slot = InFlightSlot::claim(&self.in_flight, &descriptor)?;
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let model = descriptor.name.clone();

        info!(
            model = %model,
            filename = %descriptor.filename,
            url = %descriptor.source_url,
            "Starting model download"
        );

        let job = DownloadJob {
            descriptor,
            http: Arc::clone(&self.http),
            storage: Arc::clone(&self.storage),
            store: Arc::clone(&self.store),
            slot,
            tx,
        };
        let task = tokio::spawn(job.run());

        Ok(DownloadHandle {
            model,
            events: rx,
            task,
        })
    }

    pub fn is_downloading(&self, model: &str) -> bool {
        self.in_flight.lock().contains_key(model)
    }

    /// State of every in-flight download, ordered by model name.
    pub fn snapshot(&self) -> Vec<DownloadState> {
        let mut states: Vec<DownloadState> = self.in_flight.lock().values().cloned().collect();
        states.sort_by(|a, b| a.model.cmp(&b.model));
        states
    }

    /// Run `f` while no download of `filename` can start, failing with
    /// `AlreadyInProgress` if one is already running.
    pub fn with_file_idle<T>(
        &self,
        filename: &str,
        f: impl FnOnce() -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        let in_flight = self.in_flight.lock();
        if let Some(state) = in_flight.values().find(|s| s.filename == filename) {
            return Err(DomainError::AlreadyInProgress(format!(
                "{} (downloading {})",
                filename, state.model
            )));
        }
        f()
    }
}

/// Consumer side of a running download.
///
/// Dropping the handle cancels the transfer; cleanup then happens in the
/// background.
pub struct DownloadHandle {
    model: String,
    events: mpsc::Receiver<DownloadEvent>,
    task: JoinHandle<()>,
}

impl DownloadHandle {
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Next event, or `None` once the stream has ended.
    pub async fn next_event(&mut self) -> Option<DownloadEvent> {
        self.events.recv().await
    }

    /// Stop the transfer and wait until partial data and bookkeeping are gone.
    pub async fn cancel(mut self) {
        info!(model = %self.model, "Cancelling download");
        self.events.close();
        join_download_task(&self.model, self.task).await;
    }

    /// Drive the download to its terminal event, reporting progress along the way.
    ///
    /// Returns the stored filename on success.
    pub async fn finish<F>(mut self, mut on_progress: F) -> Result<String, DomainError>
    where
        F: FnMut(&DownloadProgress),
    {
        while let Some(event) = self.events.recv().await {
            match event {
                DownloadEvent::Progress(progress) => on_progress(&progress),
                DownloadEvent::Completed { filename, .. } => {
                    join_download_task(&self.model, self.task).await;
                    return Ok(filename);
                }
                DownloadEvent::Failed { error, .. } => {
                    join_download_task(&self.model, self.task).await;
                    return Err(error);
                }
            }
        }

        Err(DomainError::DownloadFailed {
            model: self.model,
            reason: "download task ended unexpectedly".to_string(),
        })
    }
}

async fn join_download_task(model: &str, task: JoinHandle<()>) {
    if let Err(e) = task.await {
        warn!(model = %model, error = %e, "Download task ended abnormally");
    }
}

/// Membership in the in-flight set, released on drop.
struct InFlightSlot {
    map: InFlightMap,
    model: String,
}

impl InFlightSlot {
    fn claim(map: &InFlightMap, descriptor: &ModelDescriptor) -> Result<Self, DomainError> {
        let mut in_flight = map.lock();
        let busy = in_flight.contains_key(&descriptor.name)
            || in_flight.values().any(|s| s.filename == descriptor.filename);
        if busy {
            return Err(DomainError::AlreadyInProgress(descriptor.name.clone()));
        }

        in_flight.insert(
            descriptor.name.clone(),
            DownloadState {
                model: descriptor.name.clone(),
                filename: descriptor.filename.clone(),
                downloaded: 0,
                total: 0,
            },
        );

        Ok(Self {
            map: Arc::clone(map),
            model: descriptor.name.clone(),
        })
    }

    fn update(&self, downloaded: u64, total: u64) {
        if let Some(state) = self.map.lock().get_mut(&self.model) {
            state.downloaded = downloaded;
            state.total = total;
        }
    }
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.map.lock().remove(&self.model);
        debug!(model = %self.model, "Released in-flight slot");
    }
}

/// Decides which byte counts are worth an event.
#[derive(Default)]
struct ProgressReporter {
    last: Option<(u64, u64)>,
}

impl ProgressReporter {
    fn due(&self, downloaded: u64, total: u64) -> bool {
        let Some((last_downloaded, last_total)) = self.last else {
            return true;
        };
        if downloaded <= last_downloaded {
            return false;
        }
        if total > 0 {
            downloaded == total
                || percent_complete(downloaded, total) != percent_complete(last_downloaded, last_total)
        } else {
            downloaded - last_downloaded >= UNKNOWN_TOTAL_STEP
        }
    }

    fn already_reported(&self, downloaded: u64, total: u64) -> bool {
        self.last == Some((downloaded, total))
    }
}

struct DownloadJob {
    descriptor: ModelDescriptor,
    http: Arc<dyn HttpClient>,
    storage: Arc<dyn ModelStorage>,
    store: Arc<ModelStore>,
    slot: InFlightSlot,
    tx: mpsc::Sender<DownloadEvent>,
}

impl DownloadJob {
    async fn run(self) {
        let model = self.descriptor.name.clone();
        let filename = self.descriptor.filename.clone();

        // Abandoning the event stream interrupts the transfer at its next await.
        // The staged artifact is dropped with the transfer future, which
        // removes the partial file.
        let received = tokio::select! {
            biased;
            _ = self.tx.closed() => {
                info!(model = %model, "Download abandoned by consumer, cleaned up");
                return;
            }
            result = self.receive() => result,
        };

        let outcome = match received {
            Ok(staged) => staged.commit().await.map_err(|e| self.failed(e)),
            Err(e) => Err(e),
        };

        let DownloadJob { store, slot, tx, .. } = self;
        match outcome {
            Ok(()) => {
                store.mark_present(&filename);
                drop(slot);
                info!(model = %model, filename = %filename, "Model downloaded");
                let _ = tx.send(DownloadEvent::Completed { model, filename }).await;
            }
            Err(error) => {
                drop(slot);
                warn!(model = %model, error = %error, "Model download failed");
                let _ = tx.send(DownloadEvent::Failed { model, error }).await;
            }
        }
    }

    /// Stream the body into a staged artifact, verified but not yet committed.
    async fn receive(&self) -> Result<Box<dyn StagedArtifact>, DomainError> {
        let descriptor = &self.descriptor;

        let source = self
            .http
            .fetch(&descriptor.source_url)
            .await
            .map_err(|e| self.failed(e))?;
        let mut staged = self
            .storage
            .stage(&descriptor.filename)
            .await
            .map_err(|e| self.failed(e))?;

        let mut total = source.total.unwrap_or(0);
        let mut hasher = descriptor.sha256.as_ref().map(|_| Sha256::new());
        let mut reporter = ProgressReporter::default();
        let mut downloaded: u64 = 0;

        self.emit(&mut reporter, downloaded, total).await?;

        let mut chunks = source.chunks;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| self.failed(e))?;
            if chunk.is_empty() {
                continue;
            }

            staged.write(&chunk).await.map_err(|e| self.failed(e))?;
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(&chunk);
            }
            downloaded += chunk.len() as u64;

            if total > 0 && downloaded > total {
                return Err(self.failed_with(format!(
                    "server sent more data than advertised ({} > {} bytes)",
                    downloaded, total
                )));
            }
            if reporter.due(downloaded, total) {
                self.emit(&mut reporter, downloaded, total).await?;
            }
        }

        if downloaded == 0 {
            return Err(self.failed_with("server returned an empty file".to_string()));
        }
        if total == 0 {
            total = downloaded;
        } else if downloaded < total {
            return Err(self.failed_with(format!(
                "connection closed after {} of {} bytes",
                downloaded, total
            )));
        }

        if let (Some(expected), Some(hasher)) = (descriptor.sha256.as_deref(), hasher) {
            let actual = format!("{:x}", hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(self.failed_with(format!(
                    "checksum mismatch: expected {}, got {}",
                    expected, actual
                )));
            }
            debug!(model = %descriptor.name, "Checksum verified");
        }

        if !reporter.already_reported(downloaded, total) {
            self.emit(&mut reporter, downloaded, total).await?;
        }

        Ok(staged)
    }

    async fn emit(
        &self,
        reporter: &mut ProgressReporter,
        downloaded: u64,
        total: u64,
    ) -> Result<(), DomainError> {
        self.slot.update(downloaded, total);
        reporter.last = Some((downloaded, total));

        let progress = DownloadProgress::new(self.descriptor.name.clone(), downloaded, total);
        self.tx
            .send(DownloadEvent::Progress(progress))
            .await
            .map_err(|_| self.failed_with("cancelled".to_string()))
    }

    fn failed(&self, error: DomainError) -> DomainError {
        self.failed_with(error.to_string())
    }

    fn failed_with(&self, reason: String) -> DomainError {
        DomainError::DownloadFailed {
            model: self.descriptor.name.clone(),
            reason,
        }
    }
}
