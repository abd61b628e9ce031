use crate::export::{ExportError, ExportSink, ExportedFile};
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::debug;

/// Keeps every exported file in memory.
#[derive(Default)]
pub struct MemorySink {
    files: Mutex<Vec<ExportedFile>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> Vec<ExportedFile> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ExportSink for MemorySink {
    async fn save(&self, file: ExportedFile) -> Result<(), ExportError> {
        debug!(
            "MEMORY SINK - keeping {} ({} bytes)",
            file.file_name,
            file.bytes.len()
        );
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(file);
        Ok(())
    }

    fn name(&self) -> &str {
        "Memory"
    }
}
