use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::app::{DownloadCoordinator, DownloadHandle, ModelStore};
use crate::domain::{
    DomainError, DownloadProgress, ModelCatalog, ModelDescriptor, ModelsState,
};
use crate::ports::{HttpClient, ModelStorage, RecognitionEngine};

/// Capacity of the republished progress channel. Slow subscribers skip ahead.
const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Facade over the catalog, the local store and the download coordinator.
///
/// This is the entry point for every model operation the UI performs.
pub struct ModelLifecycleManager {
    catalog: ModelCatalog,
    store: Arc<ModelStore>,
    storage: Arc<dyn ModelStorage>,
    downloads: DownloadCoordinator,
    engine: Arc<dyn RecognitionEngine>,
    progress_tx: broadcast::Sender<DownloadProgress>,
}

impl ModelLifecycleManager {
    pub fn new(
        catalog: ModelCatalog,
        http: Arc<dyn HttpClient>,
        storage: Arc<dyn ModelStorage>,
        engine: Arc<dyn RecognitionEngine>,
    ) -> Result<Self, DomainError> {
        let store = Arc::new(ModelStore::new(Arc::clone(&storage))?);
        let downloads =
            DownloadCoordinator::new(http, Arc::clone(&storage), Arc::clone(&store));
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);

        info!(
            catalog_size = catalog.list_available().len(),
            present = store.present().len(),
            "ModelLifecycleManager initialized"
        );

        Ok(Self {
            catalog,
            store,
            storage,
            downloads,
            engine,
            progress_tx,
        })
    }

    pub fn list_available(&self) -> &[ModelDescriptor] {
        self.catalog.list_available()
    }

    /// Filenames of the models on disk, freshly read from storage.
    pub fn list_downloaded(&self) -> Result<Vec<String>, DomainError> {
        Ok(self.store.list_present()?.into_iter().collect())
    }

    /// Begin a download and hand back its event stream.
    pub fn start_download(&self, name: &str) -> Result<DownloadHandle, DomainError> {
        let descriptor = self
            .catalog
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::UnknownModel(name.to_string()))?;
        self.downloads.start(descriptor)
    }

    /// Download a model to completion, republishing its progress to subscribers.
    ///
    /// Returns the filename of the stored artifact.
    pub async fn download(&self, name: &str) -> Result<String, DomainError> {
        let handle = self.start_download(name)?;
        handle
            .finish(|progress| {
                // No subscriber is fine; the caller still gets the outcome.
                let _ = self.progress_tx.send(progress.clone());
            })
            .await
    }

    /// Progress of every download driven through `download`.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<DownloadProgress> {
        self.progress_tx.subscribe()
    }

    pub fn is_downloading(&self, name: &str) -> bool {
        self.downloads.is_downloading(name)
    }

    /// Remove a downloaded model.
    ///
    /// A model that is active and loaded in the engine must be unloaded first.
    pub fn delete(&self, filename: &str) -> Result<(), DomainError> {
        self.downloads.with_file_idle(filename, || {
            if !self.store.is_present(filename) {
                return Err(DomainError::NotPresent(filename.to_string()));
            }

            let active = self.store.get_active().as_deref() == Some(filename);
            if active && self.engine.is_model_loaded() {
                return Err(DomainError::InUse(filename.to_string()));
            }

            match self.storage.remove(filename) {
                Ok(()) => {}
                Err(DomainError::NotPresent(name)) => {
                    // Removed behind our back; bring the view in line.
                    self.store.mark_absent(filename);
                    return Err(DomainError::NotPresent(name));
                }
                Err(e) => return Err(e),
            }
            self.store.mark_absent(filename);

            info!(filename = filename, was_active = active, "Model deleted");
            Ok(())
        })
    }

    /// Load a downloaded model into the engine and make it the active one.
    pub async fn load(&self, filename: &str) -> Result<(), DomainError> {
        if !self.store.is_present(filename) {
            return Err(DomainError::NotPresent(filename.to_string()));
        }

        let path = self.storage.path(filename);
        info!(filename = filename, path = ?path, "Loading model");

        self.engine
            .load_model(&path)
            .await
            .map_err(|e| DomainError::LoadFailed {
                filename: filename.to_string(),
                reason: e.to_string(),
            })?;

        if let Err(e) = self.store.set_active(filename) {
            // Deleted while the engine was loading it. The engine no longer
            // holds the previous model either, so nothing is active.
            warn!(filename = filename, "Model vanished during load, unloading");
            self.engine.unload_model();
            self.store.clear_active();
            return Err(e);
        }

        info!(filename = filename, "Model active");
        Ok(())
    }

    /// Unload the engine's model and clear the active selection.
    pub fn unload(&self) {
        self.engine.unload_model();
        if let Some(previous) = self.store.get_active() {
            info!(filename = %previous, "Model unloaded");
        }
        self.store.clear_active();
    }

    pub fn active(&self) -> Option<String> {
        self.store.get_active()
    }

    /// Check a stored model against the catalog checksum.
    ///
    /// Models without a published checksum are accepted as is.
    pub async fn verify(&self, filename: &str) -> Result<bool, DomainError> {
        if !self.store.is_present(filename) {
            return Err(DomainError::NotPresent(filename.to_string()));
        }

        let Some(expected) = self
            .catalog
            .by_filename(filename)
            .and_then(|m| m.sha256.clone())
        else {
            return Ok(true);
        };

        let storage = Arc::clone(&self.storage);
        let name = filename.to_string();
        let actual = tokio::task::spawn_blocking(move || storage.sha256(&name))
            .await
            .map_err(|e| DomainError::Io(format!("Checksum task failed: {}", e)))??;

        let valid = actual.eq_ignore_ascii_case(&expected);
        if !valid {
            warn!(filename = filename, expected = %expected, actual = %actual, "Checksum mismatch");
        }
        Ok(valid)
    }

    /// Merged view of the library for presentation.
    pub fn list_state(&self) -> Result<ModelsState, DomainError> {
        let present = self.store.list_present()?;
        Ok(ModelsState {
            available: self.catalog.list_available().to_vec(),
            present,
            active: self.store.get_active(),
            downloading: self
                .downloads
                .snapshot()
                .iter()
                .map(|state| state.progress())
                .collect(),
        })
    }
}
