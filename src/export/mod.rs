// Export module - drives the compositor for one image or the whole registry
// and hands the result to a sink
mod archive;
mod coordinator;
mod error;
mod naming;
pub mod sinks;

pub use archive::ArchiveBuilder;
pub use coordinator::{ExportCoordinator, ExportOptions};
pub use error::ExportError;
pub use naming::export_file_name;

use crate::registry::EntryId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Where a finished export goes.
#[async_trait]
pub trait ExportSink: Send + Sync {
    async fn save(&self, file: ExportedFile) -> Result<(), ExportError>;
    fn name(&self) -> &str;
}

pub type DynExportSink = Arc<dyn ExportSink>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportedFile {
    pub fn jpeg(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: JPEG_CONTENT_TYPE,
            bytes,
        }
    }

    pub fn zip(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: ZIP_CONTENT_TYPE,
            bytes,
        }
    }
}

/// Busy-flag key: the bulk archive or one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportTarget {
    All,
    Entry(EntryId),
}

impl std::fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportTarget::All => f.write_str("all"),
            ExportTarget::Entry(id) => write!(f, "image {}", id),
        }
    }
}

/// What to do when one image of a bulk export fails to composite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Leave the image out of the archive, log it and list it in the report
    #[default]
    Skip,
    /// Stop the batch; no archive is produced
    Abort,
}

/// How export jobs for different targets interact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockingPolicy {
    /// One job per target; "all" and a single image may overlap
    #[default]
    PerTarget,
    /// Every job waits for a registry-wide lock
    Exclusive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub id: EntryId,
    pub display_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub target: ExportTarget,
    pub file_name: String,
    pub exported: Vec<EntryId>,
    pub skipped: Vec<SkippedEntry>,
}

/// Result of exporting images one file at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SingleExports {
    pub outcomes: Vec<ExportOutcome>,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ExportOutcome {
    Completed(ExportReport),
    /// A job for the same target was already running; nothing was done
    AlreadyRunning,
}

impl ExportOutcome {
    pub fn report(&self) -> Option<&ExportReport> {
        match self {
            ExportOutcome::Completed(report) => Some(report),
            ExportOutcome::AlreadyRunning => None,
        }
    }

    pub fn is_already_running(&self) -> bool {
        matches!(self, ExportOutcome::AlreadyRunning)
    }
}
