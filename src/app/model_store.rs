use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::domain::DomainError;
use crate::ports::ModelStorage;

#[derive(Debug, Default)]
struct StoreState {
    present: BTreeSet<String>,
    active: Option<String>,
}

/// In-memory view of which models are on disk and which one is active.
///
/// Invariant: `active`, if set, is a member of `present`.
pub struct ModelStore {
    storage: Arc<dyn ModelStorage>,
    state: RwLock<StoreState>,
}

impl ModelStore {
    /// Create a store and populate it from storage.
    pub fn new(storage: Arc<dyn ModelStorage>) -> Result<Self, DomainError> {
        let store = Self {
            storage,
            state: RwLock::new(StoreState::default()),
        };
        let present = store.list_present()?;
        info!(present_count = present.len(), "ModelStore initialized");
        Ok(store)
    }

    /// Query storage and resynchronize the in-memory view.
    ///
    /// An active model that vanished from storage is deactivated.
    ///
    /// The write lock is held across the storage read. Every mark follows
    /// its storage change, so a mark racing this call either lands before
    /// the read (and the listing already reflects it) or waits and is
    /// applied on top of the listing.
    pub fn list_present(&self) -> Result<BTreeSet<String>, DomainError> {
        let mut state = self.state.write();
        let listed: BTreeSet<String> = self.storage.list()?.into_iter().collect();

        let vanished = state
            .active
            .as_ref()
            .is_some_and(|active| !listed.contains(active));
        if vanished {
            if let Some(active) = state.active.take() {
                info!(filename = %active, "Active model no longer on disk, clearing");
            }
        }
        state.present = listed.clone();
        Ok(listed)
    }

    /// Last known present set, without touching storage.
    pub fn present(&self) -> BTreeSet<String> {
        self.state.read().present.clone()
    }

    pub fn is_present(&self, filename: &str) -> bool {
        self.state.read().present.contains(filename)
    }

    /// Record a completed artifact. The storage write must already have succeeded.
    pub fn mark_present(&self, filename: &str) {
        if self.state.write().present.insert(filename.to_string()) {
            debug!(filename = filename, "Model marked present");
        }
    }

    /// Record a removed artifact, deactivating it if it was active.
    pub fn mark_absent(&self, filename: &str) {
        let mut state = self.state.write();
        if state.present.remove(filename) {
            debug!(filename = filename, "Model marked absent");
        }
        if state.active.as_deref() == Some(filename) {
            state.active = None;
            info!(filename = filename, "Active model removed");
        }
    }

    pub fn set_active(&self, filename: &str) -> Result<(), DomainError> {
        let mut state = self.state.write();
        if !state.present.contains(filename) {
            return Err(DomainError::NotPresent(filename.to_string()));
        }
        state.active = Some(filename.to_string());
        Ok(())
    }

    pub fn get_active(&self) -> Option<String> {
        self.state.read().active.clone()
    }

    pub fn clear_active(&self) {
        self.state.write().active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FsModelStorage;
    use std::fs;

    fn store_in(dir: &std::path::Path) -> ModelStore {
        let storage = Arc::new(FsModelStorage::new(dir.to_path_buf()).unwrap());
        ModelStore::new(storage).unwrap()
    }

    #[test]
    fn test_initial_scan() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ggml-tiny.bin"), b"x").unwrap();

        let store = store_in(dir.path());
        assert!(store.is_present("ggml-tiny.bin"));
        assert_eq!(store.get_active(), None);
    }

    #[test]
    fn test_set_active_requires_presence() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        assert!(matches!(
            store.set_active("ggml-tiny.bin"),
            Err(DomainError::NotPresent(_))
        ));

        store.mark_present("ggml-tiny.bin");
        store.set_active("ggml-tiny.bin").unwrap();
        assert_eq!(store.get_active().as_deref(), Some("ggml-tiny.bin"));
    }

    #[test]
    fn test_mark_absent_clears_active() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        store.mark_present("ggml-tiny.bin");
        store.set_active("ggml-tiny.bin").unwrap();
        store.mark_absent("ggml-tiny.bin");

        assert_eq!(store.get_active(), None);
        assert!(!store.is_present("ggml-tiny.bin"));
    }

    #[test]
    fn test_marks_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        for _ in 0..3 {
            store.mark_present("ggml-base.bin");
            store.mark_absent("ggml-base.bin");
            store.mark_present("ggml-base.bin");
        }
        store.mark_absent("ggml-other.bin");
        assert_eq!(store.present().len(), 1);
    }

    #[test]
    fn test_list_present_resyncs_and_drops_vanished_active() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ggml-tiny.bin"), b"x").unwrap();
        let store = store_in(dir.path());
        store.set_active("ggml-tiny.bin").unwrap();

        fs::remove_file(dir.path().join("ggml-tiny.bin")).unwrap();
        fs::write(dir.path().join("ggml-base.bin"), b"x").unwrap();

        let present = store.list_present().unwrap();
        assert_eq!(present.into_iter().collect::<Vec<_>>(), vec!["ggml-base.bin"]);
        assert_eq!(store.get_active(), None);
    }

    #[test]
    fn test_list_present_surfaces_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let models_dir = dir.path().join("models");
        let store = store_in(&models_dir);
        fs::remove_dir_all(&models_dir).unwrap();

        assert!(matches!(store.list_present(), Err(DomainError::Io(_))));
    }
}
