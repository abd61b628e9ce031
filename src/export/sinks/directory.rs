use crate::export::{ExportError, ExportSink, ExportedFile};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes exported files into a directory, replacing same-named files.
pub struct DirectorySink {
    directory: PathBuf,
}

impl DirectorySink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Target path for `file_name`, keeping only its final component.
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        let name = Path::new(file_name)
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "export.jpg".into());
        self.directory.join(name)
    }
}

#[async_trait]
impl ExportSink for DirectorySink {
    async fn save(&self, file: ExportedFile) -> Result<(), ExportError> {
        tokio::fs::create_dir_all(&self.directory).await?;

        let path = self.path_for(&file.file_name);
        tokio::fs::write(&path, &file.bytes).await?;

        info!(
            "Saved {} ({}, {} bytes) to {:?}",
            file.file_name,
            file.content_type,
            file.bytes.len(),
            path
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "Directory"
    }
}
