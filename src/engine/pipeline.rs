//! Planning pipeline.
//!
//! Drives a project through the ordered phases
//! `goal_analysis -> research -> prd -> tasks -> team`. Each phase
//! invokes exactly one external capability and persists its output before
//! the next phase starts, emitting a phase-start and a phase-result
//! event. A failure in any phase other than goal analysis is fatal to the
//! run; goal analysis degrades to a default analysis instead.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::lifecycle::RunSignal;
use super::EngineInner;
use crate::capability::TaskSpec;
use crate::error::{EngineError, EngineResult};
use crate::events::EventKind;
use crate::model::{
    GoalAnalysis, Project, ProjectId, ProjectStatus, ResearchDepth, Task, TaskId,
};

/// One stage of the planning pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanPhase {
    /// Structured goal analysis
    GoalAnalysis,
    /// Domain research
    Research,
    /// Requirements document synthesis
    Prd,
    /// Task decomposition
    Tasks,
    /// Team assembly
    Team,
}

impl PlanPhase {
    /// Wire name of the phase.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GoalAnalysis => "goal_analysis",
            Self::Research => "research",
            Self::Prd => "prd",
            Self::Tasks => "tasks",
            Self::Team => "team",
        }
    }
}

impl fmt::Display for PlanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Runs the planning phases for one project.
pub(crate) struct PlanningPipeline {
    engine: Arc<EngineInner>,
}

impl PlanningPipeline {
    pub(crate) fn new(engine: Arc<EngineInner>) -> Self {
        Self { engine }
    }

    /// Run the full pipeline.
    ///
    /// Errors are not returned to any caller: fatal phase failures are
    /// recorded on the project and surfaced via events.
    pub(crate) async fn run(
        &self,
        id: ProjectId,
        depth_override: Option<ResearchDepth>,
        signal: watch::Receiver<RunSignal>,
    ) {
        if self.engine.transition(id, ProjectStatus::Planning, "plan").await.is_ok() {
            match self.run_phases(id, depth_override, &signal).await {
                // The success path freed the single-flight slot itself,
                // before flipping to awaiting_approval; a cancelled run's
                // slot was already taken by delete.
                Ok(()) => return,
                Err(e) => {
                    if cancelled(&signal) {
                        tracing::debug!(project_id = %id, "planning run cancelled");
                    } else {
                        let _ = self.engine.fail(id, "plan", e.to_string()).await;
                    }
                }
            }
        }
        self.engine.runs.finish(id);
    }

    async fn run_phases(
        &self,
        id: ProjectId,
        depth_override: Option<ResearchDepth>,
        signal: &watch::Receiver<RunSignal>,
    ) -> EngineResult<()> {
        let engine = &self.engine;
        let project = engine.store.project(id).await?;
        let goal = project.goal_description.clone();

        // Phase 1: goal analysis. Skipped when a pre-parsed analysis was
        // supplied at creation; degrades to defaults on failure.
        let analysis = match project.goal_analysis.clone() {
            Some(analysis) => analysis,
            None => {
                engine.emit(id, EventKind::PhaseStarted { phase: PlanPhase::GoalAnalysis });
                let (analysis, detail) = match engine.caps.goal_parser.analyze(&goal).await {
                    Ok(analysis) => {
                        let detail = analysis.domain.label().to_string();
                        (analysis, detail)
                    }
                    Err(e) => {
                        tracing::warn!(project_id = %id, error = %e,
                            "goal analysis failed, degrading to defaults");
                        let mut fallback = GoalAnalysis::fallback(&goal);
                        fallback.suggested_research_depth =
                            engine.config.general.default_research_depth;
                        (fallback, "degraded to defaults".to_string())
                    }
                };
                let persisted = analysis.clone();
                engine
                    .store
                    .update_project(id, Box::new(move |p| p.goal_analysis = Some(persisted)))
                    .await?;
                engine.emit(
                    id,
                    EventKind::PhaseCompleted { phase: PlanPhase::GoalAnalysis, detail },
                );
                analysis
            }
        };

        // Resolution order: explicit override > analysis suggestion > default.
        let depth = depth_override.unwrap_or(analysis.suggested_research_depth);
        engine.store.update_project(id, Box::new(move |p| p.research_depth = depth)).await?;

        if cancelled(signal) {
            return Ok(());
        }

        // Phase 2: research. Depth `none` skips the phase entirely.
        let research = if depth == ResearchDepth::None {
            None
        } else {
            engine.emit(id, EventKind::PhaseStarted { phase: PlanPhase::Research });
            let notes = engine
                .caps
                .researcher
                .research(&goal, &analysis, depth)
                .await
                .map_err(|e| phase_error(PlanPhase::Research, &e))?;
            let persisted = notes.clone();
            engine
                .store
                .update_project(id, Box::new(move |p| p.research_notes = Some(persisted)))
                .await?;
            engine.emit(
                id,
                EventKind::PhaseCompleted {
                    phase: PlanPhase::Research,
                    detail: format!("{depth} research complete"),
                },
            );
            Some(notes)
        };

        if cancelled(signal) {
            return Ok(());
        }

        // Phase 3: requirements document.
        engine.emit(id, EventKind::PhaseStarted { phase: PlanPhase::Prd });
        let plan = engine
            .caps
            .synthesizer
            .synthesize(&goal, &analysis, research.as_deref())
            .await
            .map_err(|e| phase_error(PlanPhase::Prd, &e))?;
        let persisted = plan.clone();
        engine
            .store
            .update_project(id, Box::new(move |p| p.plan_document = Some(persisted)))
            .await?;
        engine.emit(
            id,
            EventKind::PhaseCompleted { phase: PlanPhase::Prd, detail: plan.title.clone() },
        );

        if cancelled(signal) {
            return Ok(());
        }

        // Phase 4: task decomposition.
        engine.emit(id, EventKind::PhaseStarted { phase: PlanPhase::Tasks });
        let specs = engine
            .caps
            .decomposer
            .decompose(&goal, &plan, research.as_deref())
            .await
            .map_err(|e| phase_error(PlanPhase::Tasks, &e))?;
        let tasks = materialize_tasks(&project, &specs)?;
        let task_count = tasks.len();
        engine.store.insert_tasks(tasks).await?;
        engine.emit(
            id,
            EventKind::PhaseCompleted {
                phase: PlanPhase::Tasks,
                detail: format!("{task_count} tasks"),
            },
        );

        if cancelled(signal) {
            return Ok(());
        }

        // Phase 5: team assembly. Agents are matched to tasks by role.
        engine.emit(id, EventKind::PhaseStarted { phase: PlanPhase::Team });
        let team = engine
            .caps
            .assembler
            .assemble(&specs)
            .await
            .map_err(|e| phase_error(PlanPhase::Team, &e))?;
        let by_role: HashMap<String, String> =
            team.iter().map(|a| (a.role.clone(), a.name.clone())).collect();
        for task in engine.store.project_tasks(id).await? {
            if let Some(name) = task.assignee.as_ref().and_then(|role| by_role.get(role)) {
                let name = name.clone();
                engine
                    .store
                    .update_task(task.id, Box::new(move |t| t.assignee = Some(name)))
                    .await?;
            }
        }
        let team_size = team.len();
        engine.store.update_project(id, Box::new(move |p| p.team = team)).await?;
        engine.emit(
            id,
            EventKind::PhaseCompleted {
                phase: PlanPhase::Team,
                detail: format!("{team_size} agents"),
            },
        );

        if cancelled(signal) {
            return Ok(());
        }

        // Free the single-flight slot before the status flips, so an
        // approve that lands immediately can register its execution run.
        self.engine.runs.finish(id);
        self.engine.transition(id, ProjectStatus::AwaitingApproval, "plan").await?;
        Ok(())
    }
}

/// Resolve spec keys into persisted tasks with real ids.
///
/// A spec referencing an unknown key is a fatal planning defect.
fn materialize_tasks(project: &Project, specs: &[TaskSpec]) -> EngineResult<Vec<Task>> {
    if specs.is_empty() {
        return Err(phase_error_msg(PlanPhase::Tasks, "decomposer produced no tasks"));
    }

    let ids: HashMap<&str, TaskId> =
        specs.iter().map(|s| (s.key.as_str(), TaskId::new())).collect();
    if ids.len() != specs.len() {
        return Err(phase_error_msg(PlanPhase::Tasks, "duplicate task keys in decomposition"));
    }

    let mut tasks = Vec::with_capacity(specs.len());
    for spec in specs {
        let mut dependencies = Vec::with_capacity(spec.depends_on.len());
        for dep in &spec.depends_on {
            let dep_id = ids.get(dep.as_str()).ok_or_else(|| {
                phase_error_msg(
                    PlanPhase::Tasks,
                    &format!("task '{}' depends on unknown task '{dep}'", spec.key),
                )
            })?;
            dependencies.push(*dep_id);
        }

        tasks.push(Task {
            id: ids[spec.key.as_str()],
            project_id: project.id,
            title: spec.title.clone(),
            description: spec.description.clone(),
            dependencies,
            status: crate::model::TaskStatus::Pending,
            level: None,
            // Holds the role until team assembly swaps in the agent name.
            assignee: spec.role.clone(),
            estimated_minutes: spec.estimated_minutes,
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        });
    }
    Ok(tasks)
}

fn phase_error(phase: PlanPhase, source: &anyhow::Error) -> EngineError {
    EngineError::Phase { phase, message: source.to_string() }
}

fn phase_error_msg(phase: PlanPhase, message: &str) -> EngineError {
    EngineError::Phase { phase, message: message.to_string() }
}

fn cancelled(signal: &watch::Receiver<RunSignal>) -> bool {
    *signal.borrow() == RunSignal::Cancel
}
