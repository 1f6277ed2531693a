//! Event channel between the engine and its observers.
//!
//! Events are immutable facts broadcast once per occurrence,
//! fire-and-forget: a slow or absent observer never blocks engine
//! progress, and nothing is replayed after a disconnect. Observers
//! recover missed state by reconnecting and performing a full resync
//! (see [`ObserverSession`]).

mod channel;
mod observer;

pub use channel::EventChannel;
pub use observer::{ObserverConnection, ObserverSession, ObserverTransport, ReconnectConfig};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::PlanPhase;
use crate::model::{Project, ProjectId, ProjectStatus, Task, TaskId, TaskStatus};

/// One engine state change, as seen by observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Project the event belongs to
    pub project_id: ProjectId,

    /// What happened
    #[serde(flatten)]
    pub kind: EventKind,

    /// When the triggering state change occurred
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event stamped with the current time.
    pub fn new(project_id: ProjectId, kind: EventKind) -> Self {
        Self { project_id, kind, timestamp: Utc::now() }
    }
}

/// Typed event payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// The project moved along a state-machine edge
    StatusChanged {
        /// Status before the transition
        from: ProjectStatus,
        /// Status after the transition
        to: ProjectStatus,
    },

    /// A planning phase started
    PhaseStarted {
        /// The phase
        phase: PlanPhase,
    },

    /// A planning phase finished
    PhaseCompleted {
        /// The phase
        phase: PlanPhase,
        /// Short human-readable outcome
        detail: String,
    },

    /// A task changed status
    TaskStatusChanged {
        /// The task
        task_id: TaskId,
        /// New status
        status: TaskStatus,
    },

    /// Every task in a dependency level reached a terminal status
    LevelCompleted {
        /// Zero-based level index
        level: usize,
    },

    /// The project and its tasks were removed
    ProjectDeleted,
}

/// Authoritative state of one project, sent to observers on attach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    /// The project record
    pub project: Project,

    /// All of its tasks
    pub tasks: Vec<Task>,
}

/// Control command from an observer, mapping 1:1 onto engine operations.
///
/// The channel is a thin transport: no business validation happens here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EngineCommand {
    /// Create a project from a goal description
    Start {
        /// Natural-language goal
        goal: String,
        /// Optional research depth override
        #[serde(default)]
        research_depth: Option<String>,
    },

    /// Approve a plan and start execution
    Approve {
        /// Target project
        project_id: ProjectId,
    },

    /// Pause execution at the next level boundary
    Pause {
        /// Target project
        project_id: ProjectId,
    },

    /// Resume a paused project
    Resume {
        /// Target project
        project_id: ProjectId,
    },

    /// Delete a project and its tasks
    Delete {
        /// Target project
        project_id: ProjectId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_serializes_tagged() {
        let event = Event::new(
            ProjectId::new(),
            EventKind::StatusChanged { from: ProjectStatus::Draft, to: ProjectStatus::Planning },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status_changed");
        assert_eq!(json["from"], "draft");
        assert_eq!(json["to"], "planning");
    }

    #[test]
    fn test_command_round_trip() {
        let cmd = EngineCommand::Approve { project_id: ProjectId::new() };
        let json = serde_json::to_string(&cmd).unwrap();
        let parsed: EngineCommand = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, EngineCommand::Approve { .. }));
    }
}
