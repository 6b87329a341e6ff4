//! The single-pass harvesting loop.
//!
//! Each pending row goes through status check, download, upload and record
//! update in order. A step that cannot proceed skips the rest of that row
//! and the loop moves on; only a failed status check aborts the pass.

use chrono::NaiveDate;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{error, info, warn};

use crate::client::TripoClient;
use crate::config::Config;
use crate::error::HarvestError;
use crate::records::{D1Client, RecordStore};
use crate::storage::{self, ObjectStore};
use crate::types::{TaskState, WorkItem};

/// What happened to a single work item during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Uploaded, recorded and cleaned up.
    Completed,
    /// The task is queued or running.
    InProgress,
    /// Tripo reported the task as failed.
    TaskFailed,
    /// Tripo reported a state the harvester does not act on.
    UnknownStatus,
    /// The task succeeded but exposed no model URL.
    NoModelUrl,
    /// The model could not be fetched. A partially written staged file may remain.
    DownloadFailed,
    /// The staged file is left in place.
    UploadFailed,
    /// The model was uploaded but the row still points at the old state.
    RecordUpdateFailed,
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemOutcome::Completed => "completed",
            ItemOutcome::InProgress => "in progress",
            ItemOutcome::TaskFailed => "task failed",
            ItemOutcome::UnknownStatus => "unknown status",
            ItemOutcome::NoModelUrl => "no model url",
            ItemOutcome::DownloadFailed => "download failed",
            ItemOutcome::UploadFailed => "upload failed",
            ItemOutcome::RecordUpdateFailed => "record update failed",
        };
        f.write_str(name)
    }
}

/// The outcomes of one pass, in processing order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcomes: Vec<(NaiveDate, ItemOutcome)>,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.count(ItemOutcome::Completed)
    }

    pub fn count(&self, outcome: ItemOutcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == outcome).count()
    }

    pub fn outcome_for(&self, date: NaiveDate) -> Option<ItemOutcome> {
        self.outcomes
            .iter()
            .find(|(d, _)| *d == date)
            .map(|(_, o)| *o)
    }
}

/// Moves finished Tripo models into object storage and marks their rows completed.
pub struct Harvester {
    tripo: TripoClient,
    records: Arc<dyn RecordStore>,
    storage: Arc<dyn ObjectStore>,
    staging_dir: PathBuf,
}

impl Harvester {
    pub fn new(
        tripo: TripoClient,
        records: Arc<dyn RecordStore>,
        storage: Arc<dyn ObjectStore>,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tripo,
            records,
            storage,
            staging_dir: staging_dir.into(),
        }
    }

    /// Builds a harvester wired to the Tripo API, D1 and the configured object store.
    pub async fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let tripo = TripoClient::from_config(config)?;
        let records: Arc<dyn RecordStore> = Arc::new(D1Client::from_config(config)?);
        let storage: Arc<dyn ObjectStore> = Arc::from(storage::connect(&config.storage).await);
        Ok(Self::new(tripo, records, storage, config.staging_dir.clone()))
    }

    /// Runs one pass over the pending rows.
    ///
    /// # Errors
    ///
    /// Per-item failures are reported in the [`RunSummary`]. An error is
    /// returned only when the staging directory cannot be created or a task
    /// status cannot be fetched, which ends the pass.
    pub async fn run(&self) -> Result<RunSummary, HarvestError> {
        let items = self.list_work_items().await;
        info!("found {} pending tasks", items.len());
        for item in &items {
            info!(date = %item.date, task_id = %item.external_task_id, "pending");
        }

        let mut summary = RunSummary::default();
        if items.is_empty() {
            return Ok(summary);
        }

        fs::create_dir_all(&self.staging_dir).await?;

        for item in &items {
            let outcome = self.process_item(item).await?;
            summary.outcomes.push((item.date, outcome));
        }

        info!(
            total = summary.outcomes.len(),
            completed = summary.completed(),
            "harvest pass finished"
        );
        Ok(summary)
    }

    /// Lists the pending rows as work items.
    ///
    /// A failed or undecodable listing yields no items; rows that cannot be
    /// keyed safely are dropped.
    pub async fn list_work_items(&self) -> Vec<WorkItem> {
        let rows = match self.records.pending_rows().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "could not list pending tasks");
                return Vec::new();
            }
        };

        rows.into_iter()
            .filter_map(|row| match WorkItem::try_from(row) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(error = %e, "dropping pending row");
                    None
                }
            })
            .collect()
    }

    /// Takes one work item as far through the pipeline as it can go.
    #[tracing::instrument(skip_all, fields(date = %item.date, task_id = %item.short_task_id()))]
    pub async fn process_item(&self, item: &WorkItem) -> Result<ItemOutcome, HarvestError> {
        let status = self.tripo.get_task(&item.external_task_id).await?;
        info!(status = %status.status, progress = ?status.progress, "tripo status");

        match status.status {
            TaskState::Queued | TaskState::Running => {
                info!("skip: task still in progress");
                return Ok(ItemOutcome::InProgress);
            }
            TaskState::Failed => {
                warn!("skip: tripo task failed");
                return Ok(ItemOutcome::TaskFailed);
            }
            TaskState::Unknown => {
                warn!("skip: unknown task status");
                return Ok(ItemOutcome::UnknownStatus);
            }
            TaskState::Success => {}
        }

        let Some(model_url) = status.model_url() else {
            warn!("skip: task has no model url");
            return Ok(ItemOutcome::NoModelUrl);
        };

        let path = self.staging_dir.join(item.staging_file_name());
        info!(path = %path.display(), "downloading model");
        match self.tripo.download_model(model_url, &path).await {
            Ok(bytes) => info!(
                bytes,
                "downloaded {:.1} MB",
                bytes as f64 / 1024.0 / 1024.0
            ),
            Err(e) => {
                warn!(error = %e, "skip: download failed");
                return Ok(ItemOutcome::DownloadFailed);
            }
        }

        let key = item.storage_key();
        info!(key = %key, backend = self.storage.name(), "uploading model");
        if let Err(e) = self.storage.put_model(&path, &key).await {
            error!(error = %e, path = %path.display(), "skip: upload failed");
            return Ok(ItemOutcome::UploadFailed);
        }

        let updated = self.records.mark_completed(item.date, &key).await;

        // The row stays pending if the update failed, so the next pass downloads a fresh copy.
        if let Err(e) = fs::remove_file(&path).await {
            warn!(error = %e, path = %path.display(), "could not remove staged model");
        }

        match updated {
            Ok(()) => {
                info!(key = %key, "completed");
                Ok(ItemOutcome::Completed)
            }
            Err(e) => {
                error!(error = %e, key = %key, "record update failed");
                Ok(ItemOutcome::RecordUpdateFailed)
            }
        }
    }
}
