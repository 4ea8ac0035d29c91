//! Downstream task queue contract
//!
//! The pipeline hands a task over and forgets it; delivery and ordering belong
//! to the queue implementation.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use uuid::Uuid;

/// Task name for downstream file processing
pub const PROCESS_FILE: &str = "PROCESS_FILE";

/// Unique identifier for an enqueued task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Work item handed to the external queue when new content is accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTask {
    pub task_name: String,
    pub file_source_id: String,
    pub file_name: String,
    pub enqueued_at: DateTime<Utc>,
}

impl ProcessingTask {
    pub fn process_file(file_source_id: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            task_name: PROCESS_FILE.to_string(),
            file_source_id: file_source_id.into(),
            file_name: file_name.into(),
            enqueued_at: Utc::now(),
        }
    }
}

/// External queue collaborator, fire-and-forget from the pipeline's perspective
#[async_trait::async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: ProcessingTask) -> Result<TaskId>;
}

/// In-process queue adapter, used for embedding and in tests
#[derive(Default)]
pub struct MemoryTaskQueue {
    tasks: Mutex<Vec<(TaskId, ProcessingTask)>>,
}

impl MemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything enqueued so far
    pub fn tasks(&self) -> Vec<ProcessingTask> {
        self.tasks
            .lock()
            .expect("task queue lock poisoned")
            .iter()
            .map(|(_, task)| task.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().expect("task queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn enqueue(&self, task: ProcessingTask) -> Result<TaskId> {
        let id = TaskId::new();
        self.tasks
            .lock()
            .expect("task queue lock poisoned")
            .push((id, task));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_queue_records_tasks_in_order() {
        let queue = MemoryTaskQueue::new();

        let first = queue
            .enqueue(ProcessingTask::process_file("remote-1", "a.pdf"))
            .await
            .unwrap();
        let second = queue
            .enqueue(ProcessingTask::process_file("remote-2", "b.pdf"))
            .await
            .unwrap();

        assert_ne!(first, second);
        let tasks = queue.tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].file_name, "a.pdf");
        assert_eq!(tasks[1].file_name, "b.pdf");
        assert!(tasks.iter().all(|t| t.task_name == PROCESS_FILE));
    }
}
