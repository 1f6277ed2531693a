//! Engine error types.

use thiserror::Error;

use crate::engine::PlanPhase;
use crate::model::{ProjectId, ProjectStatus};

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the orchestration engine.
///
/// Synchronous operations return these directly. Asynchronous planning
/// and execution failures are instead recorded on the project
/// (`status = failed` with the error captured) and surfaced through the
/// event channel and subsequent reads.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad caller input, rejected synchronously.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown project id.
    #[error("Project not found: {0}")]
    NotFound(ProjectId),

    /// Unknown task id.
    #[error("Task not found in project")]
    TaskNotFound,

    /// Operation not valid for the project's current status.
    #[error("Cannot {action} a project in status '{from}'")]
    IllegalTransition {
        /// Status the project was in
        from: ProjectStatus,
        /// Operation that was attempted
        action: &'static str,
    },

    /// The task graph contains a cycle; always fails the project.
    #[error("Dependency cycle detected involving: {0}")]
    DependencyCycle(String),

    /// A planning phase failed.
    #[error("Planning phase '{phase}' failed: {message}")]
    Phase {
        /// Phase that failed
        phase: PlanPhase,
        /// Underlying failure
        message: String,
    },

    /// The agent backend failed to execute a task.
    #[error("Agent backend error: {0}")]
    Agent(String),

    /// A planning or execution run is already active for the project.
    #[error("A {kind} run is already active for project {project_id}")]
    RunActive {
        /// Kind of run holding the single-flight slot
        kind: &'static str,
        /// Project contended for
        project_id: ProjectId,
    },

    /// The backing store failed.
    #[error("Store error: {0}")]
    Store(String),
}
