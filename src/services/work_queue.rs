//! Ordered collection of work items plus the bounded history of finished
//! images.
//!
//! Both structures are plain data. The orchestrator wraps them in locks and
//! is responsible for publishing events after each mutation.

use std::collections::VecDeque;
use thiserror::Error;

use crate::models::{ProcessedRecord, WorkItem, WorkItemId, WorkStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Unknown work item {0}")]
    UnknownItem(WorkItemId),

    #[error("Illegal transition for item {id}: {from} -> {to}")]
    IllegalTransition {
        id: WorkItemId,
        from: WorkStatus,
        to: WorkStatus,
    },
}

/// Items in insertion order.
#[derive(Debug, Default)]
pub struct WorkQueue {
    items: Vec<WorkItem>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: WorkItem) {
        self.items.push(item);
    }

    pub fn get(&self, id: WorkItemId) -> Option<&WorkItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Move an item to `status`, rejecting transitions out of terminal
    /// states. Progress becomes 1.0 on completion. `error` is stored only
    /// for `Failed`.
    pub fn transition(
        &mut self,
        id: WorkItemId,
        status: WorkStatus,
        error: Option<String>,
    ) -> Result<WorkItem, QueueError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(QueueError::UnknownItem(id))?;

        if !item.status.can_transition_to(status) {
            return Err(QueueError::IllegalTransition {
                id,
                from: item.status,
                to: status,
            });
        }

        item.status = status;
        match status {
            WorkStatus::Completed => item.progress = 1.0,
            WorkStatus::Failed => item.error = error,
            _ => {}
        }
        Ok(item.clone())
    }

    /// Update progress of a non-terminal item. Values are clamped to 0..=1.
    pub fn set_progress(&mut self, id: WorkItemId, progress: f32) -> Result<(), QueueError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(QueueError::UnknownItem(id))?;
        if !item.status.is_terminal() {
            item.progress = progress.clamp(0.0, 1.0);
        }
        Ok(())
    }

    /// Remove an item only if it is still `Completed`.
    pub fn remove_completed(&mut self, id: WorkItemId) -> Option<WorkItem> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == id && item.status == WorkStatus::Completed)?;
        Some(self.items.remove(index))
    }

    /// Drop every item and return how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        removed
    }

    pub fn snapshot(&self) -> Vec<WorkItem> {
        self.items.clone()
    }
}

/// Most-recent-first record of successful items with a fixed capacity.
#[derive(Debug)]
pub struct ProcessedLog {
    records: VecDeque<ProcessedRecord>,
    capacity: usize,
}

impl ProcessedLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Prepend a record, evicting the oldest once over capacity.
    pub fn record(&mut self, record: ProcessedRecord) {
        if self.capacity == 0 {
            return;
        }
        self.records.push_front(record);
        self.records.truncate(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn snapshot(&self) -> Vec<ProcessedRecord> {
        self.records.iter().cloned().collect()
    }
}
