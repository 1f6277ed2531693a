//! Lifecycle state machine and run tracking.
//!
//! Status writes go exclusively through [`EngineInner::transition`] and
//! [`EngineInner::fail`], which enforce the legal edges and emit a
//! status-change event per transition. The run registry enforces
//! single-flight per project: at most one planning or execution run may
//! be active for a given id at a time.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::EngineInner;
use crate::error::{EngineError, EngineResult};
use crate::events::{Event, EventKind};
use crate::model::{Project, ProjectId, ProjectStatus};

/// Check whether `from -> to` is an edge of the lifecycle state machine.
///
/// All transitions are one-directional except the pause/resume cycle.
pub(crate) fn is_legal(from: ProjectStatus, to: ProjectStatus) -> bool {
    use ProjectStatus::{
        Approved, AwaitingApproval, Completed, Draft, Executing, Failed, Paused, Planning,
    };
    matches!(
        (from, to),
        (Draft, Planning)
            | (Planning, AwaitingApproval | Failed)
            | (AwaitingApproval, Approved)
            | (Approved, Executing)
            | (Executing, Paused | Completed | Failed)
            | (Paused, Executing)
    )
}

/// Kind of single-flight run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunKind {
    Planning,
    Execution,
}

impl RunKind {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Execution => "execution",
        }
    }
}

/// Advisory control signal for an active run.
///
/// Checked at phase boundaries (pipeline) and level boundaries
/// (scheduler); never preemptive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunSignal {
    /// Keep going
    Run,
    /// Stop dispatching new levels; park until resumed or cancelled
    Pause,
    /// Stop at the next boundary and exit
    Cancel,
}

/// An active planning or execution run for one project.
pub(crate) struct ActiveRun {
    pub(crate) kind: RunKind,
    pub(crate) signal: watch::Sender<RunSignal>,
    pub(crate) join: Option<JoinHandle<()>>,
}

/// Single-flight registry of active runs, keyed by project id.
///
/// Runs for different projects never contend.
#[derive(Default)]
pub(crate) struct RunRegistry {
    runs: Mutex<HashMap<ProjectId, ActiveRun>>,
}

impl RunRegistry {
    /// Register a run, handing back its signal receiver.
    ///
    /// Fails if any run is already active for the project.
    pub(crate) fn begin(
        &self,
        project_id: ProjectId,
        kind: RunKind,
    ) -> EngineResult<watch::Receiver<RunSignal>> {
        let mut runs = self.runs.lock();
        if let Some(active) = runs.get(&project_id) {
            return Err(EngineError::RunActive { kind: active.kind.name(), project_id });
        }
        let (tx, rx) = watch::channel(RunSignal::Run);
        runs.insert(project_id, ActiveRun { kind, signal: tx, join: None });
        Ok(rx)
    }

    /// Attach the spawned task handle so delete can await acknowledgment.
    pub(crate) fn attach(&self, project_id: ProjectId, handle: JoinHandle<()>) {
        if let Some(run) = self.runs.lock().get_mut(&project_id) {
            run.join = Some(handle);
        }
    }

    /// Send a signal to the project's active run, if any.
    pub(crate) fn signal(&self, project_id: ProjectId, signal: RunSignal) -> bool {
        self.runs
            .lock()
            .get(&project_id)
            .map(|run| run.signal.send(signal).is_ok())
            .unwrap_or(false)
    }

    /// Remove and return the active run (for cancel-and-wait).
    pub(crate) fn take(&self, project_id: ProjectId) -> Option<ActiveRun> {
        self.runs.lock().remove(&project_id)
    }

    /// Deregister a run; called by the run itself when it exits.
    pub(crate) fn finish(&self, project_id: ProjectId) {
        self.runs.lock().remove(&project_id);
    }

    /// Whether any run is active for the project.
    pub(crate) fn is_active(&self, project_id: ProjectId) -> bool {
        self.runs.lock().contains_key(&project_id)
    }
}

impl EngineInner {
    /// Publish an event for a project.
    pub(crate) fn emit(&self, project_id: ProjectId, kind: EventKind) {
        self.channel.publish(Event::new(project_id, kind));
    }

    /// Move a project along a state-machine edge, emitting a
    /// status-change event.
    ///
    /// The write is compare-and-set against the status observed here, so
    /// a concurrent transition loses cleanly with `IllegalTransition`
    /// instead of clobbering.
    pub(crate) async fn transition(
        &self,
        id: ProjectId,
        to: ProjectStatus,
        action: &'static str,
    ) -> EngineResult<Project> {
        let current = self.store.project(id).await?;
        let from = current.status;
        if !is_legal(from, to) {
            return Err(EngineError::IllegalTransition { from, action });
        }

        let updated = self
            .store
            .update_project(
                id,
                Box::new(move |p| {
                    if p.status == from {
                        p.status = to;
                        if to.is_terminal() {
                            p.completed_at = Some(Utc::now());
                        }
                    }
                }),
            )
            .await?;

        if updated.status != to {
            return Err(EngineError::IllegalTransition { from: updated.status, action });
        }

        tracing::info!(project_id = %id, %from, %to, "project transition");
        self.emit(id, EventKind::StatusChanged { from, to });
        Ok(updated)
    }

    /// Transition a project to `Failed`, recording the triggering error.
    ///
    /// Asynchronous pipeline/scheduler failures land here; they are never
    /// returned to a caller. The failed project remains inspectable.
    pub(crate) async fn fail(
        &self,
        id: ProjectId,
        action: &'static str,
        message: String,
    ) -> EngineResult<Project> {
        let current = self.store.project(id).await?;
        let from = current.status;
        if !is_legal(from, ProjectStatus::Failed) {
            return Err(EngineError::IllegalTransition { from, action });
        }

        let recorded = message.clone();
        let updated = self
            .store
            .update_project(
                id,
                Box::new(move |p| {
                    if p.status == from {
                        p.status = ProjectStatus::Failed;
                        p.error = Some(recorded);
                        p.completed_at = Some(Utc::now());
                    }
                }),
            )
            .await?;

        if updated.status != ProjectStatus::Failed {
            return Err(EngineError::IllegalTransition { from: updated.status, action });
        }

        tracing::warn!(project_id = %id, %from, error = %message, "project failed");
        self.emit(id, EventKind::StatusChanged { from, to: ProjectStatus::Failed });
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_edges_are_legal() {
        use ProjectStatus::*;
        let path = [Draft, Planning, AwaitingApproval, Approved, Executing, Completed];
        for pair in path.windows(2) {
            assert!(is_legal(pair[0], pair[1]), "{} -> {} should be legal", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_pause_resume_cycle() {
        use ProjectStatus::*;
        assert!(is_legal(Executing, Paused));
        assert!(is_legal(Paused, Executing));
    }

    #[test]
    fn test_failure_edges() {
        use ProjectStatus::*;
        assert!(is_legal(Planning, Failed));
        assert!(is_legal(Executing, Failed));
        assert!(!is_legal(Draft, Failed));
        assert!(!is_legal(AwaitingApproval, Failed));
        assert!(!is_legal(Paused, Failed));
    }

    #[test]
    fn test_no_status_jumps() {
        use ProjectStatus::*;
        assert!(!is_legal(Draft, Executing));
        assert!(!is_legal(Planning, Approved));
        assert!(!is_legal(Completed, Executing));
        assert!(!is_legal(Failed, Planning));
        assert!(!is_legal(Executing, AwaitingApproval));
    }

    #[test]
    fn test_run_registry_single_flight() {
        let registry = RunRegistry::default();
        let id = ProjectId::new();

        let _rx = registry.begin(id, RunKind::Planning).unwrap();
        let second = registry.begin(id, RunKind::Execution);
        assert!(matches!(second, Err(EngineError::RunActive { kind: "planning", .. })));

        registry.finish(id);
        assert!(registry.begin(id, RunKind::Execution).is_ok());
    }

    #[test]
    fn test_run_registry_isolated_per_project() {
        let registry = RunRegistry::default();
        let _a = registry.begin(ProjectId::new(), RunKind::Planning).unwrap();
        let _b = registry.begin(ProjectId::new(), RunKind::Planning).unwrap();
    }

    #[test]
    fn test_signal_without_run_is_false() {
        let registry = RunRegistry::default();
        assert!(!registry.signal(ProjectId::new(), RunSignal::Pause));
    }
}
