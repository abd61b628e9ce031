use super::EntryId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Image {0} not found")]
    NotFound(EntryId),

    #[error("No rename in progress")]
    NotEditing,
}
