use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("Failed to decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode JPEG: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Compositing task failed: {0}")]
    Task(String),
}

impl CompositeError {
    pub fn is_decode(&self) -> bool {
        matches!(self, CompositeError::Decode { .. })
    }
}
