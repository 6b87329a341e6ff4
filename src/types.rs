use std::fmt;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::HarvestError;

static TASK_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// A pending row as stored in the `daily_models` table.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PendingRow {
    /// The calendar day the model belongs to, formatted `YYYY-MM-DD`.
    pub date: String,
    /// The Tripo task that is generating the model, if one was started.
    pub tripo_task_id: Option<String>,
}

/// A unit of work for a single harvesting pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// The calendar day that keys the remote record.
    pub date: NaiveDate,
    /// The identifier of the Tripo task producing the model.
    pub external_task_id: String,
}

impl WorkItem {
    /// The file name used for the staged download, e.g. `model_2024-05-01.glb`.
    pub fn staging_file_name(&self) -> String {
        format!("model_{}.glb", self.date)
    }

    /// The object key the model is uploaded under, e.g. `models/2024-05-01.glb`.
    pub fn storage_key(&self) -> String {
        format!("models/{}.glb", self.date)
    }

    /// A shortened task id for log lines.
    pub fn short_task_id(&self) -> &str {
        let end = self
            .external_task_id
            .char_indices()
            .nth(8)
            .map(|(idx, _)| idx)
            .unwrap_or(self.external_task_id.len());
        &self.external_task_id[..end]
    }
}

impl TryFrom<PendingRow> for WorkItem {
    type Error = HarvestError;

    fn try_from(row: PendingRow) -> Result<Self, Self::Error> {
        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
            HarvestError::InvalidWorkItem {
                message: format!("date {:?} is not a calendar day: {}", row.date, e),
            }
        })?;

        let Some(task_id) = row.tripo_task_id.filter(|id| !id.is_empty()) else {
            return Err(HarvestError::InvalidWorkItem {
                message: format!("row {} has no task id", row.date),
            });
        };

        if !TASK_ID_RE.is_match(&task_id) {
            return Err(HarvestError::InvalidWorkItem {
                message: format!("row {} has a malformed task id {:?}", row.date, task_id),
            });
        }

        Ok(Self {
            date,
            external_task_id: task_id,
        })
    }
}

/// Represents the lifecycle state of a generation task.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// The task has been accepted but has not yet started processing.
    Queued,
    /// The task is actively being processed.
    Running,
    /// The task completed successfully.
    Success,
    /// The task failed to complete.
    Failed,
    /// Any state this crate does not act on (cancelled, banned, expired, ...).
    #[serde(other)]
    Unknown,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Success => "success",
            TaskState::Failed => "failed",
            TaskState::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// The artifacts produced by a task, keyed by kind.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct TaskOutput {
    /// The base GLB model.
    #[serde(default)]
    pub model: Option<String>,
    /// The untextured base model, when requested.
    #[serde(default)]
    pub base_model: Option<String>,
    /// The PBR textured GLB model, present when PBR was enabled.
    #[serde(default)]
    pub pbr_model: Option<String>,
    /// The image produced by image generation tasks.
    #[serde(default)]
    pub generated_image: Option<String>,
    /// A rendered preview of the model.
    #[serde(default)]
    pub rendered_image: Option<String>,
}

impl TaskOutput {
    /// Returns the URL of the model to harvest, preferring the PBR model.
    pub fn model_url(&self) -> Option<&str> {
        [&self.pbr_model, &self.model]
            .into_iter()
            .filter_map(|url| url.as_deref())
            .find(|url| !url.trim().is_empty())
    }
}

/// The status of a generation task as reported by the Tripo API.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TaskStatus {
    /// The unique identifier of the task.
    #[serde(default)]
    pub task_id: Option<String>,
    /// The current lifecycle state of the task.
    pub status: TaskState,
    /// The completion progress of the task as a percentage. Not always a whole number.
    #[serde(default)]
    pub progress: Option<f64>,
    /// The produced artifacts, once available.
    #[serde(default)]
    pub output: Option<TaskOutput>,
}

impl TaskStatus {
    pub fn model_url(&self) -> Option<&str> {
        self.output.as_ref().and_then(TaskOutput::model_url)
    }
}

/// (Internal) A generic wrapper for API responses where the content is nested under a "data" field.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub(crate) data: T,
}
