use super::{
    ArchiveBuilder, DynExportSink, ExportError, ExportOutcome, ExportReport, ExportTarget,
    ExportedFile, FailurePolicy, LockingPolicy, SingleExports, SkippedEntry, export_file_name,
};
use crate::compositor::{WatermarkSettings, composite};
use crate::registry::{EntryId, SharedRegistry};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub archive_name: String,
    pub archive_folder: Option<String>,
    pub single_fallback_prefix: String,
    pub archive_fallback_prefix: String,
    pub failure_policy: FailurePolicy,
    pub locking: LockingPolicy,
    /// How long a finished job keeps its busy flag
    pub idle_delay: Duration,
}

impl From<&crate::ExportConfig> for ExportOptions {
    fn from(config: &crate::ExportConfig) -> Self {
        Self {
            archive_name: config.archive_name.clone(),
            archive_folder: config.archive_folder.clone(),
            single_fallback_prefix: config.single_fallback_prefix.clone(),
            archive_fallback_prefix: config.archive_fallback_prefix.clone(),
            failure_policy: config.failure_policy,
            locking: config.locking,
            idle_delay: Duration::from_millis(config.idle_delay_ms),
        }
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from(&crate::ExportConfig::default())
    }
}

type RunningSet = Arc<Mutex<HashSet<ExportTarget>>>;

/// Clears a target's busy flag when dropped, whatever way the job ended.
struct JobGuard {
    running: RunningSet,
    target: ExportTarget,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        lock_running(&self.running).remove(&self.target);
        debug!("Export job for {} is idle", self.target);
    }
}

fn lock_running(running: &RunningSet) -> std::sync::MutexGuard<'_, HashSet<ExportTarget>> {
    running
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs single and bulk exports with at most one in-flight job per target.
#[derive(Clone)]
pub struct ExportCoordinator {
    registry: SharedRegistry,
    settings: Arc<WatermarkSettings>,
    sink: DynExportSink,
    options: ExportOptions,
    running: RunningSet,
    exclusive: Arc<tokio::sync::Mutex<()>>,
}

impl ExportCoordinator {
    pub fn new(
        registry: SharedRegistry,
        settings: WatermarkSettings,
        sink: DynExportSink,
        options: ExportOptions,
    ) -> Self {
        Self {
            registry,
            settings: Arc::new(settings),
            sink,
            options,
            running: Arc::new(Mutex::new(HashSet::new())),
            exclusive: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn settings(&self) -> &WatermarkSettings {
        &self.settings
    }

    /// Swap the global watermark selection used by later jobs.
    pub fn set_settings(&mut self, settings: WatermarkSettings) {
        self.settings = Arc::new(settings);
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    pub fn is_running(&self, target: ExportTarget) -> bool {
        lock_running(&self.running).contains(&target)
    }

    /// Targets with a job in flight, sorted.
    pub fn running_targets(&self) -> Vec<ExportTarget> {
        let mut targets: Vec<ExportTarget> =
            lock_running(&self.running).iter().copied().collect();
        targets.sort();
        targets
    }

    /// Watermark one image and save it as a JPEG.
    ///
    /// Returns [`ExportOutcome::AlreadyRunning`] without doing anything if
    /// the same image is already being exported.
    pub async fn export_one(&self, id: EntryId) -> Result<ExportOutcome, ExportError> {
        let target = ExportTarget::Entry(id);
        let Some(guard) = self.try_begin(target) else {
            info!("Export of {} already running, ignoring request", target);
            return Ok(ExportOutcome::AlreadyRunning);
        };

        let result = self.run_single(id).await;
        if let Err(e) = &result {
            error!("Export of {} failed: {}", target, e);
        }

        self.settle(guard).await;
        result.map(ExportOutcome::Completed)
    }

    /// Watermark every image and save them as one zip archive.
    pub async fn export_all(&self) -> Result<ExportOutcome, ExportError> {
        let Some(guard) = self.try_begin(ExportTarget::All) else {
            info!("Bulk export already running, ignoring request");
            return Ok(ExportOutcome::AlreadyRunning);
        };

        let result = self.run_all().await;
        if let Err(e) = &result {
            error!("Bulk export failed: {}", e);
        }

        self.settle(guard).await;
        result.map(ExportOutcome::Completed)
    }

    /// Export each image to its own JPEG, one after another.
    ///
    /// A failing image follows the failure policy: with `Skip` it is logged
    /// and listed in [`SingleExports::skipped`] while the rest carry on; with
    /// `Abort` the first error is returned.
    pub async fn export_each<I>(&self, ids: I) -> Result<SingleExports, ExportError>
    where
        I: IntoIterator<Item = EntryId>,
    {
        let mut exports = SingleExports::default();

        for id in ids {
            match self.export_one(id).await {
                Ok(outcome) => exports.outcomes.push(outcome),
                Err(e) => match self.options.failure_policy {
                    FailurePolicy::Skip => {
                        let display_name = self
                            .registry
                            .read()
                            .await
                            .get(id)
                            .map(|entry| entry.display_name.clone())
                            .unwrap_or_default();
                        warn!("Skipping image {} ({}): {}", id, display_name, e);
                        exports.skipped.push(SkippedEntry {
                            id,
                            display_name,
                            reason: e.to_string(),
                        });
                    }
                    FailurePolicy::Abort => return Err(e),
                },
            }
        }

        Ok(exports)
    }

    fn try_begin(&self, target: ExportTarget) -> Option<JobGuard> {
        let mut running = lock_running(&self.running);
        if !running.insert(target) {
            return None;
        }
        debug!("Export job for {} is running", target);

        Some(JobGuard {
            running: self.running.clone(),
            target,
        })
    }

    async fn settle(&self, guard: JobGuard) {
        if !self.options.idle_delay.is_zero() {
            tokio::time::sleep(self.options.idle_delay).await;
        }
        drop(guard);
    }

    async fn serialize(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        match self.options.locking {
            LockingPolicy::PerTarget => None,
            LockingPolicy::Exclusive => Some(self.exclusive.lock().await),
        }
    }

    async fn run_single(&self, id: EntryId) -> Result<ExportReport, ExportError> {
        let _exclusive = self.serialize().await;

        let entry = self.registry.read().await.snapshot_entry(id)?;
        let file_name = export_file_name(
            &entry.display_name,
            &self.options.single_fallback_prefix,
            entry.position,
        );

        debug!(
            "Compositing {} ({}) in {} mode",
            id, entry.source.file_name, self.settings.mode
        );
        let jpeg = composite(entry.source.bytes.clone(), &self.settings).await?;

        self.sink
            .save(ExportedFile::jpeg(file_name.clone(), jpeg))
            .await?;
        info!("Exported image {} as {}", id, file_name);

        Ok(ExportReport {
            target: ExportTarget::Entry(id),
            file_name,
            exported: vec![id],
            skipped: Vec::new(),
        })
    }

    async fn run_all(&self) -> Result<ExportReport, ExportError> {
        let _exclusive = self.serialize().await;

        // Snapshot up front so concurrent removals cannot tear the batch
        let entries = self.registry.read().await.snapshot();
        info!(
            "Exporting {} image(s) to {} in {} mode",
            entries.len(),
            self.options.archive_name,
            self.settings.mode
        );

        let mut archive = ArchiveBuilder::new(self.options.archive_folder.as_deref());
        let mut exported = Vec::new();
        let mut skipped = Vec::new();

        for entry in entries {
            match composite(entry.source.bytes.clone(), &self.settings).await {
                Ok(jpeg) => {
                    let file_name = export_file_name(
                        &entry.display_name,
                        &self.options.archive_fallback_prefix,
                        entry.position,
                    );
                    let path = archive.add(&file_name, jpeg);
                    debug!("Added image {} to archive as {}", entry.id, path);
                    exported.push(entry.id);
                }
                Err(e) => match self.options.failure_policy {
                    FailurePolicy::Skip => {
                        warn!(
                            "Skipping image {} ({}) in bulk export: {}",
                            entry.id, entry.display_name, e
                        );
                        skipped.push(SkippedEntry {
                            id: entry.id,
                            display_name: entry.display_name,
                            reason: e.to_string(),
                        });
                    }
                    FailurePolicy::Abort => {
                        return Err(ExportError::Aborted {
                            id: entry.id,
                            source: e,
                        });
                    }
                },
            }
        }

        let bytes = tokio::task::spawn_blocking(move || archive.finish())
            .await
            .map_err(|e| ExportError::TaskError(e.to_string()))??;

        let file_name = self.options.archive_name.clone();
        self.sink
            .save(ExportedFile::zip(file_name.clone(), bytes))
            .await?;

        info!(
            "Bulk export finished: {} exported, {} skipped",
            exported.len(),
            skipped.len()
        );

        Ok(ExportReport {
            target: ExportTarget::All,
            file_name,
            exported,
            skipped,
        })
    }
}
