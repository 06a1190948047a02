//! Broadcast of pipeline state changes to any number of observers.
//!
//! Publishing never blocks and never fails: with no subscribers the event is
//! dropped, and a subscriber that falls behind skips the oldest events.

use futures_util::{Stream, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::models::{WorkItem, WorkItemId, WorkOrigin, WorkStatus};

/// Notification emitted by the orchestrator.
///
/// Serialized as a JSON object tagged by `event` (kebab-case) with
/// camelCase payload keys, e.g.
/// `{"event":"item-status","id":3,"status":"Failed","progress":0.0,"errorReason":"source missing"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum PipelineEvent {
    /// A new item entered the queue in `Waiting`
    ItemQueued {
        id: WorkItemId,
        file_name: String,
        source_path: PathBuf,
        dest_path: PathBuf,
        origin: WorkOrigin,
    },

    /// An item changed status or progress
    ItemStatus {
        id: WorkItemId,
        status: WorkStatus,
        progress: f32,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_reason: Option<String>,
    },

    /// A completed item left the queue after its grace window
    ItemPruned { id: WorkItemId },

    /// The queue was emptied on request
    QueueCleared { removed: usize },
}

impl PipelineEvent {
    pub fn queued(item: &WorkItem) -> Self {
        PipelineEvent::ItemQueued {
            id: item.id,
            file_name: item.file_name.clone(),
            source_path: item.source_path.clone(),
            dest_path: item.dest_path.clone(),
            origin: item.origin,
        }
    }

    pub fn status_of(item: &WorkItem) -> Self {
        PipelineEvent::ItemStatus {
            id: item.id,
            status: item.status,
            progress: item.progress,
            error_reason: item.error.clone(),
        }
    }
}

#[derive(Clone)]
pub struct EventChannel {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: PipelineEvent) {
        // Err only means nobody is listening
        if self.sender.send(event).is_err() {
            tracing::trace!("Event dropped, no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Subscribe as a stream. Lagged gaps are logged and skipped.
    pub fn stream(&self) -> impl Stream<Item = PipelineEvent> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|result| async move {
            match result {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(error = %e, "Event subscriber lagged");
                    None
                }
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
