// Registry module - ordered list of uploaded images and the resource table
// that owns their bytes
mod error;
mod naming;
mod types;

pub use error::RegistryError;
pub use naming::NameSanitizer;
pub use types::{EntryId, EntrySnapshot, ImageEntry, RawFile, SourceImage};

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use types::HandleId;

pub type SharedRegistry = Arc<RwLock<Registry>>;

pub const REMOVE_ALL_PROMPT: &str =
    "Are you sure you want to remove all images? This cannot be undone.";

/// Yes/no collaborator asked before destructive operations.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Uploaded images in upload order.
///
/// The registry is the only owner of the resource table: removing an entry
/// (or dropping the registry) releases its handle.
pub struct Registry {
    entries: Vec<ImageEntry>,
    resources: HashMap<HandleId, Arc<SourceImage>>,
    sanitizer: NameSanitizer,
    next_id: u64,
    next_handle: u64,
}

impl Registry {
    pub fn new(sanitizer: NameSanitizer) -> Self {
        Self {
            entries: Vec::new(),
            resources: HashMap::new(),
            sanitizer,
            next_id: 1,
            next_handle: 1,
        }
    }

    pub fn shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    /// Append one entry per image file, in input order. Non-image files are
    /// dropped. Returns the ids of the new entries.
    pub fn add_images<I>(&mut self, files: I) -> Vec<EntryId>
    where
        I: IntoIterator<Item = RawFile>,
    {
        let mut added = Vec::new();

        for file in files {
            let media_type = file.resolved_media_type();
            if !media_type.starts_with("image/") {
                debug!("Skipping non-image file {:?} ({})", file.name, media_type);
                continue;
            }

            let display_name = self.sanitizer.sanitize(&file.name);
            let size_bytes = file.bytes.len();
            let handle = self.mint_handle(SourceImage {
                file_name: file.name,
                media_type: media_type.clone(),
                bytes: Arc::from(file.bytes),
            });

            let id = EntryId(self.next_id);
            self.next_id += 1;

            debug!("Added image {} as {:?}", id, display_name);
            self.entries.push(ImageEntry {
                id,
                display_name,
                media_type,
                size_bytes,
                handle,
            });
            added.push(id);
        }

        if !added.is_empty() {
            info!(
                "Added {} image(s), registry now holds {}",
                added.len(),
                self.entries.len()
            );
        }

        added
    }

    /// Overwrite an entry's display name with the trimmed `new_name`.
    ///
    /// Blank names are ignored; returns whether the name changed.
    pub fn rename(&mut self, id: EntryId, new_name: &str) -> Result<bool, RegistryError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(RegistryError::NotFound(id))?;

        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            debug!("Ignoring blank rename for image {}", id);
            return Ok(false);
        }

        entry.display_name = trimmed.to_string();
        Ok(true)
    }

    /// Remove one entry and release its resource handle.
    pub fn remove(&mut self, id: EntryId) -> Result<ImageEntry, RegistryError> {
        let index = self
            .position_index(id)
            .ok_or(RegistryError::NotFound(id))?;

        let entry = self.entries.remove(index);
        self.release(entry.handle);

        if self.entries.is_empty() {
            info!("Registry is now empty");
        }

        Ok(entry)
    }

    /// Remove every entry after `confirm` agrees. Returns the number removed,
    /// or `None` when the confirmation was declined.
    pub fn remove_all(&mut self, confirm: &dyn Confirm) -> Option<usize> {
        if !confirm.confirm(REMOVE_ALL_PROMPT) {
            debug!("Remove-all declined");
            return None;
        }

        Some(self.clear_all())
    }

    /// Remove every entry without asking. Callers that prompt the user do so
    /// before taking the registry lock.
    pub fn clear_all(&mut self) -> usize {
        let removed = self.clear();
        info!("Removed all {} image(s)", removed);
        removed
    }

    fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        for entry in std::mem::take(&mut self.entries) {
            self.release(entry.handle);
        }
        removed
    }

    pub fn get(&self, id: EntryId) -> Option<&ImageEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// 1-based position of an entry.
    pub fn position(&self, id: EntryId) -> Option<usize> {
        self.position_index(id).map(|index| index + 1)
    }

    pub fn entries(&self) -> &[ImageEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of resource handles still held.
    pub fn live_handles(&self) -> usize {
        self.resources.len()
    }

    pub fn snapshot_entry(&self, id: EntryId) -> Result<EntrySnapshot, RegistryError> {
        let index = self
            .position_index(id)
            .ok_or(RegistryError::NotFound(id))?;
        self.snapshot_at(index).ok_or(RegistryError::NotFound(id))
    }

    /// Capture every entry in registry order.
    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        (0..self.entries.len())
            .filter_map(|index| self.snapshot_at(index))
            .collect()
    }

    fn snapshot_at(&self, index: usize) -> Option<EntrySnapshot> {
        let entry = self.entries.get(index)?;
        let source = self.resources.get(&entry.handle)?.clone();
        Some(EntrySnapshot {
            id: entry.id,
            position: index + 1,
            display_name: entry.display_name.clone(),
            source,
        })
    }

    fn position_index(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    fn mint_handle(&mut self, source: SourceImage) -> HandleId {
        let handle = HandleId(self.next_handle);
        self.next_handle += 1;
        self.resources.insert(handle, Arc::new(source));
        handle
    }

    fn release(&mut self, handle: HandleId) {
        if self.resources.remove(&handle).is_some() {
            debug!("Released resource handle {}", handle.0);
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        let remaining = self.clear();
        if remaining > 0 {
            debug!("Registry dropped, released {} handle(s)", remaining);
        }
    }
}
