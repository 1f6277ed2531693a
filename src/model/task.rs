//! Task entity and per-task status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::project::ProjectId;

/// Opaque unique identifier for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh random id.
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

/// Status of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for its dependency level to be reached
    Pending,
    /// Dependencies satisfied, queued for dispatch
    Ready,
    /// Currently executing on the agent backend
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Not run; either skipped by the user or unreachable after a failure
    Skipped,
}

impl TaskStatus {
    /// Check if the task has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Check if the task counts as satisfied for dependency resolution.
    ///
    /// Skipped tasks unblock their dependents the same way completed
    /// tasks do.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{}", name)
    }
}

/// One unit of executable work within a project.
///
/// Tasks are created in bulk by the planning pipeline at decomposition
/// time; only the execution scheduler mutates their runtime fields
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique id
    pub id: TaskId,

    /// Owning project
    pub project_id: ProjectId,

    /// Short task title
    pub title: String,

    /// What the agent backend is asked to do
    pub description: String,

    /// Tasks that must complete before this one may start
    pub dependencies: Vec<TaskId>,

    /// Current status
    pub status: TaskStatus,

    /// Position in dependency-resolved execution order
    pub level: Option<usize>,

    /// Recommended agent role for this task
    pub assignee: Option<String>,

    /// Rough effort estimate from the decomposer
    pub estimated_minutes: u32,

    /// Output summary, populated on completion
    pub result: Option<String>,

    /// Error message, populated on failure
    pub error: Option<String>,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a pending task for a project.
    pub fn new(
        project_id: ProjectId,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            project_id,
            title: title.into(),
            description: description.into(),
            dependencies: Vec::new(),
            status: TaskStatus::Pending,
            level: None,
            assignee: None,
            estimated_minutes: 0,
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Add dependencies to this task.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<TaskId>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_terminal() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Skipped.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Ready.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn test_skipped_satisfies_dependents() {
        assert!(TaskStatus::Skipped.is_satisfied());
        assert!(TaskStatus::Completed.is_satisfied());
        assert!(!TaskStatus::Failed.is_satisfied());
    }

    #[test]
    fn test_new_task_is_pending() {
        let task = Task::new(ProjectId::new(), "Set up repo", "Initialize the repository");
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.dependencies.is_empty());
        assert!(task.level.is_none());
    }
}
