use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::debug;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use super::ExportError;

/// Collects named JPEG entries and serializes them into one zip archive.
pub struct ArchiveBuilder {
    folder: Option<String>,
    entries: Vec<(String, Vec<u8>)>,
    used_names: HashSet<String>,
}

impl ArchiveBuilder {
    pub fn new(folder: Option<&str>) -> Self {
        let folder = folder
            .map(|folder| folder.trim_matches('/').to_string())
            .filter(|folder| !folder.is_empty());

        Self {
            folder,
            entries: Vec::new(),
            used_names: HashSet::new(),
        }
    }

    /// Add an entry, returning the path it will have inside the archive.
    ///
    /// A name already taken gets a ` (2)`, ` (3)`, ... suffix before its
    /// extension.
    pub fn add(&mut self, file_name: &str, bytes: Vec<u8>) -> String {
        let unique = self.unique_name(file_name);
        let path = match &self.folder {
            Some(folder) => format!("{}/{}", folder, unique),
            None => unique,
        };

        self.entries.push((path.clone(), bytes));
        path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the archive. Blocking; run it off the async runtime.
    pub fn finish(self) -> Result<Vec<u8>, ExportError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        // JPEG data is already compressed
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for (path, bytes) in &self.entries {
            writer.start_file(path.clone(), options)?;
            writer.write_all(bytes)?;
        }

        let bytes = writer.finish()?.into_inner();
        debug!(
            "Archive written: {} entries, {} bytes",
            self.entries.len(),
            bytes.len()
        );

        Ok(bytes)
    }

    fn unique_name(&mut self, file_name: &str) -> String {
        if self.used_names.insert(file_name.to_string()) {
            return file_name.to_string();
        }

        let path = Path::new(file_name);
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let mut counter = 2;
        loop {
            let candidate = format!("{} ({}){}", stem, counter, extension);
            if self.used_names.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }
}
