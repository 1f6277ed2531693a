//! Project store abstraction.
//!
//! The store is the durable holder of projects and tasks, keyed by opaque
//! id. The per-project record is the unit of mutual exclusion: updates
//! apply a mutation atomically against the current record. Any durable
//! keyed store satisfying that contract can back the engine; the crate
//! ships an in-memory implementation.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::EngineResult;
use crate::model::{Project, ProjectId, Task, TaskId};

/// Atomic mutation applied to a project record.
pub type ProjectMutation = Box<dyn FnOnce(&mut Project) + Send>;

/// Atomic mutation applied to a task record.
pub type TaskMutation = Box<dyn FnOnce(&mut Task) + Send>;

/// Durable holder of Project and Task entities.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Persist a new project.
    async fn insert_project(&self, project: Project) -> EngineResult<()>;

    /// Fetch a project by id.
    async fn project(&self, id: ProjectId) -> EngineResult<Project>;

    /// List all projects in creation order.
    async fn projects(&self) -> EngineResult<Vec<Project>>;

    /// Atomically mutate a project record, returning the updated record.
    async fn update_project(
        &self,
        id: ProjectId,
        mutation: ProjectMutation,
    ) -> EngineResult<Project>;

    /// Persist a batch of tasks (decomposition output).
    async fn insert_tasks(&self, tasks: Vec<Task>) -> EngineResult<()>;

    /// Fetch a task by id.
    async fn task(&self, id: TaskId) -> EngineResult<Task>;

    /// All tasks belonging to a project, in creation order.
    async fn project_tasks(&self, project_id: ProjectId) -> EngineResult<Vec<Task>>;

    /// Atomically mutate a task record, returning the updated record.
    async fn update_task(&self, id: TaskId, mutation: TaskMutation) -> EngineResult<Task>;

    /// Remove a project and all of its tasks.
    async fn delete_project(&self, id: ProjectId) -> EngineResult<()>;
}
