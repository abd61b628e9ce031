//! Explicit state for one batch of photos.
//!
//! A [`Session`] owns the registry, the rename-in-progress state and the
//! export coordinator. Every mutating call returns a [`SessionState`]
//! snapshot so callers render from values rather than shared mutable state.

use crate::export::{
    DynExportSink, ExportCoordinator, ExportError, ExportOptions, ExportOutcome, ExportTarget,
    SingleExports,
};
use crate::registry::{
    Confirm, EntryId, NameSanitizer, REMOVE_ALL_PROMPT, RawFile, Registry, RegistryError,
    SharedRegistry,
};
use crate::{ConfigError, WatermarkSettings};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryView {
    pub id: EntryId,
    pub position: usize,
    pub display_name: String,
    pub media_type: String,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameDraft {
    pub id: EntryId,
    pub draft: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub entries: Vec<EntryView>,
    pub exporting: Vec<ExportTarget>,
    pub editing: Option<RenameDraft>,
    pub is_empty: bool,
}

impl SessionState {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, id: EntryId) -> Option<&EntryView> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn is_exporting(&self, target: ExportTarget) -> bool {
        self.exporting.contains(&target)
    }
}

pub struct Session {
    registry: SharedRegistry,
    editing: Mutex<Option<RenameDraft>>,
    exports: ExportCoordinator,
}

impl Session {
    pub fn new(
        sanitizer: NameSanitizer,
        settings: WatermarkSettings,
        sink: DynExportSink,
        options: ExportOptions,
    ) -> Self {
        let registry = Registry::new(sanitizer).shared();
        let exports = ExportCoordinator::new(registry.clone(), settings, sink, options);

        Self {
            registry,
            editing: Mutex::new(None),
            exports,
        }
    }

    pub fn from_config(
        config: &crate::Config,
        settings: WatermarkSettings,
        sink: DynExportSink,
    ) -> Result<Self, ConfigError> {
        let sanitizer = NameSanitizer::from_config(&config.naming)?;
        Ok(Self::new(
            sanitizer,
            settings,
            sink,
            ExportOptions::from(&config.export),
        ))
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn exports(&self) -> &ExportCoordinator {
        &self.exports
    }

    /// Replace the global watermark selection for later exports.
    pub fn set_watermark(&mut self, settings: WatermarkSettings) {
        self.exports.set_settings(settings);
    }

    pub async fn state(&self) -> SessionState {
        // Lock order is editing before registry, as in submit_rename
        let editing = self.editing.lock().await.clone();
        let registry = self.registry.read().await;
        let entries = registry
            .entries()
            .iter()
            .enumerate()
            .map(|(index, entry)| EntryView {
                id: entry.id,
                position: index + 1,
                display_name: entry.display_name.clone(),
                media_type: entry.media_type.clone(),
                size_bytes: entry.size_bytes,
            })
            .collect();

        SessionState {
            entries,
            exporting: self.exports.running_targets(),
            editing,
            is_empty: registry.is_empty(),
        }
    }

    pub async fn add_images<I>(&self, files: I) -> SessionState
    where
        I: IntoIterator<Item = RawFile>,
    {
        self.registry.write().await.add_images(files);
        self.state().await
    }

    pub async fn rename(&self, id: EntryId, new_name: &str) -> Result<SessionState, RegistryError> {
        self.registry.write().await.rename(id, new_name)?;
        Ok(self.state().await)
    }

    /// Enter editing mode for `id`, seeding the draft with its current name.
    pub async fn begin_rename(&self, id: EntryId) -> Result<SessionState, RegistryError> {
        let current = {
            let registry = self.registry.read().await;
            registry
                .get(id)
                .map(|entry| entry.display_name.clone())
                .ok_or(RegistryError::NotFound(id))?
        };

        *self.editing.lock().await = Some(RenameDraft { id, draft: current });
        Ok(self.state().await)
    }

    pub async fn update_rename_draft(&self, text: &str) -> Result<SessionState, RegistryError> {
        {
            let mut editing = self.editing.lock().await;
            let draft = editing.as_mut().ok_or(RegistryError::NotEditing)?;
            draft.draft = text.to_string();
        }
        Ok(self.state().await)
    }

    /// Apply the draft. A blank draft changes nothing and keeps editing open.
    pub async fn submit_rename(&self) -> Result<SessionState, RegistryError> {
        {
            let mut editing = self.editing.lock().await;
            let draft = editing.as_ref().ok_or(RegistryError::NotEditing)?;

            let applied = self
                .registry
                .write()
                .await
                .rename(draft.id, &draft.draft)?;
            if applied {
                *editing = None;
            }
        }
        Ok(self.state().await)
    }

    pub async fn cancel_rename(&self) -> SessionState {
        *self.editing.lock().await = None;
        self.state().await
    }

    pub async fn remove(&self, id: EntryId) -> Result<SessionState, RegistryError> {
        self.registry.write().await.remove(id)?;

        let mut editing = self.editing.lock().await;
        if editing.as_ref().is_some_and(|draft| draft.id == id) {
            debug!("Cancelled rename of removed image {}", id);
            *editing = None;
        }
        drop(editing);

        Ok(self.state().await)
    }

    /// Remove everything once `confirm` agrees; a declined prompt changes
    /// nothing.
    pub async fn remove_all(&self, confirm: &dyn Confirm) -> SessionState {
        // The prompt may block on a human, so no lock is held while asking
        if !confirm.confirm(REMOVE_ALL_PROMPT) {
            debug!("Remove-all declined");
            return self.state().await;
        }

        self.registry.write().await.clear_all();
        *self.editing.lock().await = None;
        self.state().await
    }

    pub async fn export_one(&self, id: EntryId) -> Result<ExportOutcome, ExportError> {
        self.exports.export_one(id).await
    }

    pub async fn export_all(&self) -> Result<ExportOutcome, ExportError> {
        self.exports.export_all().await
    }

    /// Export every current image to its own file.
    pub async fn export_each(&self) -> Result<SingleExports, ExportError> {
        let ids: Vec<EntryId> = self
            .registry
            .read()
            .await
            .entries()
            .iter()
            .map(|entry| entry.id)
            .collect();
        self.exports.export_each(ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::{WatermarkAsset, WatermarkMode};
    use crate::export::sinks::MemorySink;
    use std::sync::Arc;

    fn session() -> Session {
        let settings = WatermarkSettings::new(
            WatermarkMode::Tiled,
            WatermarkAsset::from_bytes("logo.png", Vec::<u8>::new()),
        );
        Session::from_config(
            &crate::Config::default(),
            settings,
            Arc::new(MemorySink::new()),
        )
        .unwrap()
    }

    fn photo(name: &str) -> RawFile {
        RawFile::new(name, vec![0u8; 8]).with_media_type("image/jpeg")
    }

    #[tokio::test]
    async fn test_state_reflects_registry() {
        let session = session();
        let state = session.state().await;
        assert!(state.is_empty);
        assert_eq!(state.len(), 0);

        let state = session
            .add_images(vec![photo("IMG_vite-001.jpg"), photo("salon.jpg")])
            .await;
        assert!(!state.is_empty);
        assert_eq!(state.len(), 2);
        assert_eq!(state.entries[0].display_name, "001");
        assert_eq!(state.entries[1].position, 2);
        assert!(state.exporting.is_empty());
    }

    #[tokio::test]
    async fn test_rename_workflow() {
        let session = session();
        let state = session.add_images(vec![photo("salon.jpg")]).await;
        let id = state.entries[0].id;

        let state = session.begin_rename(id).await.unwrap();
        assert_eq!(
            state.editing,
            Some(RenameDraft {
                id,
                draft: "salon".to_string()
            })
        );

        // Blank draft keeps editing open and the name unchanged
        session.update_rename_draft("   ").await.unwrap();
        let state = session.submit_rename().await.unwrap();
        assert!(state.editing.is_some());
        assert_eq!(state.entries[0].display_name, "salon");

        session.update_rename_draft(" Salon double ").await.unwrap();
        let state = session.submit_rename().await.unwrap();
        assert!(state.editing.is_none());
        assert_eq!(state.entries[0].display_name, "Salon double");
    }

    #[tokio::test]
    async fn test_cancel_rename_discards_draft() {
        let session = session();
        let id = session.add_images(vec![photo("salon.jpg")]).await.entries[0].id;

        session.begin_rename(id).await.unwrap();
        session.update_rename_draft("Autre").await.unwrap();
        let state = session.cancel_rename().await;

        assert!(state.editing.is_none());
        assert_eq!(state.entries[0].display_name, "salon");
        assert!(matches!(
            session.submit_rename().await,
            Err(RegistryError::NotEditing)
        ));
    }

    #[tokio::test]
    async fn test_remove_cancels_matching_edit() {
        let session = session();
        let state = session
            .add_images(vec![photo("a.jpg"), photo("b.jpg")])
            .await;
        let (a, b) = (state.entries[0].id, state.entries[1].id);

        session.begin_rename(a).await.unwrap();
        let state = session.remove(b).await.unwrap();
        assert!(state.editing.is_some());

        let state = session.remove(a).await.unwrap();
        assert!(state.editing.is_none());
        assert!(state.is_empty);
    }

    #[tokio::test]
    async fn test_remove_all_declined_and_confirmed() {
        let session = session();
        session
            .add_images(vec![photo("a.jpg"), photo("b.jpg")])
            .await;

        let state = session.remove_all(&|_: &str| false).await;
        assert_eq!(state.len(), 2);

        let state = session.remove_all(&|_: &str| true).await;
        assert!(state.is_empty);
        assert_eq!(session.registry().read().await.live_handles(), 0);
    }

    #[tokio::test]
    async fn test_remove_all_prompts_without_holding_registry_lock() {
        let session = session();
        session
            .add_images(vec![photo("a.jpg"), photo("b.jpg")])
            .await;

        // Agrees only if readers and writers can still get in while it asks
        let registry = session.registry().clone();
        let confirm = move |prompt: &str| {
            assert_eq!(prompt, REMOVE_ALL_PROMPT);
            registry.try_write().is_ok()
        };

        let state = session.remove_all(&confirm).await;
        assert!(state.is_empty);
        assert_eq!(session.registry().read().await.live_handles(), 0);
    }
}
