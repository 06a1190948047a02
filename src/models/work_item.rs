use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Unique identifier of a work item, assigned from a monotonic counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WorkItemId(u64);

impl WorkItemId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a work item.
///
/// `Waiting -> Processing -> Completed | Failed`, plus `Waiting -> Failed`
/// when the source vanished before processing began. `Completed` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WorkStatus {
    Waiting,
    Processing,
    Completed,
    Failed,
}

impl WorkStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkStatus::Completed | WorkStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: WorkStatus) -> bool {
        matches!(
            (self, next),
            (WorkStatus::Waiting, WorkStatus::Processing)
                | (WorkStatus::Waiting, WorkStatus::Failed)
                | (WorkStatus::Processing, WorkStatus::Completed)
                | (WorkStatus::Processing, WorkStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkStatus::Waiting => "Waiting",
            WorkStatus::Processing => "Processing",
            WorkStatus::Completed => "Completed",
            WorkStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an item entered the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkOrigin {
    /// Picked up by the directory watcher
    Detected,
    /// Part of a user-submitted batch
    Manual,
}

/// One image flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    /// Display name (file name of the source)
    pub file_name: String,
    pub source_path: PathBuf,
    pub dest_path: PathBuf,
    pub status: WorkStatus,
    /// 0.0 to 1.0. Only meaningful for manual batches; detection items jump
    /// from 0 to 1.
    pub progress: f32,
    /// Failure reason, set iff `status == Failed`
    pub error: Option<String>,
    pub origin: WorkOrigin,
    pub created_at: DateTime<Utc>,
}

impl WorkItem {
    pub fn new(
        id: WorkItemId,
        source_path: PathBuf,
        dest_path: PathBuf,
        origin: WorkOrigin,
    ) -> Self {
        let file_name = source_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_path.display().to_string());
        Self {
            id,
            file_name,
            source_path,
            dest_path,
            status: WorkStatus::Waiting,
            progress: 0.0,
            error: None,
            origin,
            created_at: Utc::now(),
        }
    }
}
