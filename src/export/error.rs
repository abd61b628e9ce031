use crate::compositor::CompositeError;
use crate::registry::{EntryId, RegistryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Compositing failed: {0}")]
    CompositeError(#[from] CompositeError),

    #[error(transparent)]
    RegistryError(#[from] RegistryError),

    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Export task failed: {0}")]
    TaskError(String),

    #[error("Bulk export aborted at image {id}: {source}")]
    Aborted {
        id: EntryId,
        #[source]
        source: CompositeError,
    },
}
