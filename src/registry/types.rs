use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Stable key of a registry entry. Never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque key into the registry's resource table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct HandleId(pub(crate) u64);

/// An uploaded file as handed over by the host: name, declared media type,
/// raw bytes.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: None,
            bytes,
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Read a file from disk; the media type is guessed later from its name.
    pub async fn read(path: &Path) -> Result<Self, std::io::Error> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, bytes))
    }

    /// Declared media type, or one guessed from the file name.
    pub fn resolved_media_type(&self) -> String {
        match &self.media_type {
            Some(media_type) if !media_type.trim().is_empty() => media_type.trim().to_lowercase(),
            _ => mime_guess::from_path(&self.name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.resolved_media_type().starts_with("image/")
    }
}

/// The resource a handle points at. Shared read-only so export snapshots can
/// outlive removal of the entry.
#[derive(Debug)]
pub struct SourceImage {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

#[derive(Debug, Clone)]
pub struct ImageEntry {
    pub id: EntryId,
    pub display_name: String,
    pub media_type: String,
    pub size_bytes: usize,
    pub(crate) handle: HandleId,
}

/// Everything an export job needs about one entry, captured at job start.
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    pub id: EntryId,
    /// 1-based position in the registry when the snapshot was taken
    pub position: usize,
    pub display_name: String,
    pub source: Arc<SourceImage>,
}
