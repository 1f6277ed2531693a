//! Mission Control orchestration engine.
//!
//! [`MissionEngine`] is an explicit instance owning its project store,
//! event channel, and capability set — no global state, so tests (and
//! deployments) can run any number of isolated engines side by side.
//!
//! Public operations drive the project lifecycle:
//! create -> plan -> approve -> execute, with pause/resume/delete as
//! control actions. Planning and execution happen on spawned runs; the
//! synchronous operations return immediately.

mod lifecycle;
mod pipeline;
mod scheduler;

pub use pipeline::PlanPhase;
pub use scheduler::compute_levels;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::capability::CapabilitySet;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::{
    EngineCommand, EventChannel, EventKind, ObserverConnection, ProjectSnapshot,
};
use crate::model::{
    GoalAnalysis, PlanDocument, Project, ProjectId, ProjectProgress, ProjectStatus, ResearchDepth,
    Task, TaskId, TaskStatus,
};
use crate::store::{MemoryStore, ProjectStore};

use lifecycle::{RunKind, RunRegistry, RunSignal};
use pipeline::PlanningPipeline;
use scheduler::ExecutionScheduler;

/// Everything an engine instance owns, shared by its spawned runs.
pub(crate) struct EngineInner {
    pub(crate) store: Arc<dyn ProjectStore>,
    pub(crate) channel: EventChannel,
    pub(crate) caps: CapabilitySet,
    pub(crate) config: EngineConfig,
    pub(crate) runs: RunRegistry,
}

/// The orchestration engine.
///
/// Cheap to clone; clones share the same store, channel, and runs.
#[derive(Clone)]
pub struct MissionEngine {
    inner: Arc<EngineInner>,
}

impl MissionEngine {
    /// Create an engine with an in-memory store.
    pub fn new(config: EngineConfig, caps: CapabilitySet) -> Self {
        Self::with_store(config, caps, Arc::new(MemoryStore::new()))
    }

    /// Create an engine over an explicit store.
    pub fn with_store(
        config: EngineConfig,
        caps: CapabilitySet,
        store: Arc<dyn ProjectStore>,
    ) -> Self {
        let channel = EventChannel::with_capacity(config.events.channel_capacity);
        Self {
            inner: Arc::new(EngineInner {
                store,
                channel,
                caps,
                config,
                runs: RunRegistry::default(),
            }),
        }
    }

    /// The engine's event channel.
    pub fn channel(&self) -> &EventChannel {
        &self.inner.channel
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Create a project from a natural-language goal and start planning.
    ///
    /// Validates the goal, persists a draft, and hands off to the
    /// planning pipeline without blocking: the returned project is still
    /// in `Draft`; it moves to `Planning` asynchronously.
    ///
    /// A pre-parsed analysis skips the goal-analysis phase. The research
    /// depth resolution order is: explicit `depth` here, then the
    /// analysis suggestion, then the configured default.
    pub async fn create_project(
        &self,
        goal: &str,
        depth: Option<ResearchDepth>,
        analysis: Option<GoalAnalysis>,
    ) -> EngineResult<Project> {
        let goal = goal.trim();
        let len = goal.chars().count();
        let general = &self.inner.config.general;
        if len < general.min_goal_length {
            return Err(EngineError::InvalidInput(format!(
                "goal must be at least {} characters",
                general.min_goal_length
            )));
        }
        if len > general.max_goal_length {
            return Err(EngineError::InvalidInput(format!(
                "goal must be at most {} characters",
                general.max_goal_length
            )));
        }

        let mut project = Project::draft(goal, PathBuf::new());
        project.goal_analysis = analysis;
        project.research_depth = depth.unwrap_or(general.default_research_depth);
        project.output_directory = self
            .inner
            .caps
            .jail
            .provision(project.id)
            .map_err(|e| EngineError::Store(e.to_string()))?;

        self.inner.store.insert_project(project.clone()).await?;
        tracing::info!(project_id = %project.id, title = %project.title, "project created");

        let id = project.id;
        let signal = self.inner.runs.begin(id, RunKind::Planning)?;
        let inner = Arc::clone(&self.inner);
        // The pipeline deregisters its own run slot on every exit path.
        let handle = tokio::spawn(async move {
            PlanningPipeline::new(Arc::clone(&inner)).run(id, depth, signal).await;
        });
        self.inner.runs.attach(id, handle);

        Ok(project)
    }

    /// Approve a plan and start execution.
    ///
    /// Legal only from `AwaitingApproval`; moves through `Approved`
    /// directly into `Executing` and spawns the scheduler run.
    pub async fn approve(&self, id: ProjectId) -> EngineResult<Project> {
        self.inner.transition(id, ProjectStatus::Approved, "approve").await?;
        let project = self.inner.transition(id, ProjectStatus::Executing, "approve").await?;

        let signal = self.inner.runs.begin(id, RunKind::Execution)?;
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            ExecutionScheduler::new(Arc::clone(&inner)).run(id, signal).await;
            inner.runs.finish(id);
        });
        self.inner.runs.attach(id, handle);

        Ok(project)
    }

    /// Pause execution.
    ///
    /// Legal only from `Executing`. The currently dispatched level drains
    /// to completion; no new level starts.
    pub async fn pause(&self, id: ProjectId) -> EngineResult<Project> {
        let project = self.inner.transition(id, ProjectStatus::Paused, "pause").await?;
        self.inner.runs.signal(id, RunSignal::Pause);
        Ok(project)
    }

    /// Resume a paused project from the first incomplete level.
    pub async fn resume(&self, id: ProjectId) -> EngineResult<Project> {
        let project = self.inner.transition(id, ProjectStatus::Executing, "resume").await?;

        // The paused run is normally still parked at its level boundary;
        // wake it. Spawn a fresh run only if none is active.
        if !self.inner.runs.signal(id, RunSignal::Run) {
            let signal = self.inner.runs.begin(id, RunKind::Execution)?;
            let inner = Arc::clone(&self.inner);
            let handle = tokio::spawn(async move {
                ExecutionScheduler::new(Arc::clone(&inner)).run(id, signal).await;
                inner.runs.finish(id);
            });
            self.inner.runs.attach(id, handle);
        }
        Ok(project)
    }

    /// Delete a project and all of its tasks.
    ///
    /// Any in-flight planning or execution run is cooperatively
    /// cancelled first, and removal waits for its acknowledgment so no
    /// orphaned writes land in the output directory.
    pub async fn delete(&self, id: ProjectId) -> EngineResult<()> {
        // NotFound surfaces before any cancellation side effects.
        let project = self.inner.store.project(id).await?;

        if let Some(run) = self.inner.runs.take(id) {
            tracing::info!(project_id = %id, kind = run.kind.name(),
                "cancelling active run before delete");
            let _ = run.signal.send(RunSignal::Cancel);
            if let Some(join) = run.join {
                // Acknowledgment: the run exits at its next boundary.
                let _ = join.await;
            }
        }

        self.inner.store.delete_project(id).await?;
        tracing::info!(project_id = %id, title = %project.title, "project deleted");
        self.inner.emit(id, EventKind::ProjectDeleted);
        Ok(())
    }

    /// Skip a task without running it, unblocking its dependents.
    ///
    /// Rejected for running or already-terminal tasks.
    pub async fn skip_task(&self, project_id: ProjectId, task_id: TaskId) -> EngineResult<Task> {
        // Validate the project exists first so unknown ids report NotFound.
        self.inner.store.project(project_id).await?;

        let task = self.inner.store.task(task_id).await?;
        if task.project_id != project_id {
            return Err(EngineError::InvalidInput(
                "task does not belong to this project".to_string(),
            ));
        }
        if task.status == TaskStatus::Running || task.status.is_terminal() {
            return Err(EngineError::InvalidInput(format!(
                "cannot skip task with status '{}'",
                task.status
            )));
        }

        let updated = self
            .inner
            .store
            .update_task(
                task_id,
                Box::new(|t| {
                    t.status = TaskStatus::Skipped;
                    t.completed_at = Some(chrono::Utc::now());
                }),
            )
            .await?;
        self.inner.emit(
            project_id,
            EventKind::TaskStatusChanged { task_id, status: TaskStatus::Skipped },
        );
        Ok(updated)
    }

    /// Fetch a project by id.
    pub async fn project(&self, id: ProjectId) -> EngineResult<Project> {
        self.inner.store.project(id).await
    }

    /// List all projects in creation order.
    pub async fn projects(&self) -> EngineResult<Vec<Project>> {
        self.inner.store.projects().await
    }

    /// All tasks of a project, in creation order.
    pub async fn tasks(&self, id: ProjectId) -> EngineResult<Vec<Task>> {
        self.inner.store.project_tasks(id).await
    }

    /// Read endpoint: the project with its tasks, progress, document,
    /// and execution levels.
    pub async fn plan_view(&self, id: ProjectId) -> EngineResult<PlanView> {
        let project = self.inner.store.project(id).await?;
        let tasks = self.inner.store.project_tasks(id).await?;

        let completed = tasks.iter().filter(|t| t.status.is_satisfied()).count();
        let progress = ProjectProgress::new(completed, tasks.len());

        // Levels are derived from the graph on every read; a defective
        // graph simply yields no levels here (the scheduler is the one
        // that fails the project over it).
        let execution_levels = compute_levels(&tasks).unwrap_or_default();
        let task_level_map = execution_levels
            .iter()
            .enumerate()
            .flat_map(|(level, ids)| ids.iter().map(move |id| (*id, level)))
            .collect();

        Ok(PlanView {
            prd: project.plan_document.clone(),
            output_directory: project.output_directory.clone(),
            project,
            tasks,
            progress,
            execution_levels,
            task_level_map,
        })
    }

    /// Attach an observer: a full resync of current authoritative state,
    /// plus the live event stream from this moment on.
    pub async fn attach_observer(&self) -> EngineResult<ObserverConnection> {
        // Subscribe before snapshotting so nothing between the two is
        // lost; observers tolerate duplicates.
        let events = self.inner.channel.subscribe();
        let mut resync = Vec::new();
        for project in self.inner.store.projects().await? {
            let tasks = self.inner.store.project_tasks(project.id).await?;
            resync.push(ProjectSnapshot { project, tasks });
        }
        Ok(ObserverConnection { resync, events })
    }

    /// Dispatch an observer command onto the matching engine operation.
    ///
    /// The channel performs no business validation: whatever the
    /// operation rejects comes back as the operation's error.
    pub async fn dispatch(&self, command: EngineCommand) -> EngineResult<Option<Project>> {
        match command {
            EngineCommand::Start { goal, research_depth } => {
                let depth = research_depth.as_deref().map(ResearchDepth::parse_or_default);
                self.create_project(&goal, depth, None).await.map(Some)
            }
            EngineCommand::Approve { project_id } => self.approve(project_id).await.map(Some),
            EngineCommand::Pause { project_id } => self.pause(project_id).await.map(Some),
            EngineCommand::Resume { project_id } => self.resume(project_id).await.map(Some),
            EngineCommand::Delete { project_id } => self.delete(project_id).await.map(|()| None),
        }
    }

    /// Whether a planning or execution run is active for the project.
    pub fn is_run_active(&self, id: ProjectId) -> bool {
        self.inner.runs.is_active(id)
    }
}

impl std::fmt::Debug for MissionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MissionEngine")
            .field("observers", &self.inner.channel.observer_count())
            .finish()
    }
}

/// Full plan representation returned by the read endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanView {
    /// The project record
    pub project: Project,

    /// All of its tasks
    pub tasks: Vec<Task>,

    /// Completion counters
    pub progress: ProjectProgress,

    /// The synthesized requirements document, if planning got that far
    pub prd: Option<PlanDocument>,

    /// Where the project's artifacts land
    pub output_directory: PathBuf,

    /// Task ids grouped by dependency level
    pub execution_levels: Vec<Vec<TaskId>>,

    /// Level index per task id
    pub task_level_map: HashMap<TaskId, usize>,
}
