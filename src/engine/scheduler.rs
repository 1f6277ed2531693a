//! Execution scheduler.
//!
//! Converts a task dependency graph into ordered concurrency levels and
//! drives execution: levels run strictly in order, tasks within a level
//! run concurrently against the agent backend. Pause and cancel are
//! advisory signals honored at level boundaries; a dispatched level
//! always drains before the run yields to either.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};

use super::lifecycle::RunSignal;
use super::EngineInner;
use crate::capability::TaskContext;
use crate::error::{EngineError, EngineResult};
use crate::events::EventKind;
use crate::model::{ProjectId, ProjectStatus, Task, TaskId, TaskStatus};

/// Characters of the plan document handed to the agent as context.
const PLAN_EXCERPT_CHARS: usize = 2000;

/// Group tasks into dependency levels by repeated topological peeling.
///
/// Level 0 is every task with no unmet dependencies; level k+1 is every
/// remaining task whose dependencies are all satisfied by levels <= k.
/// Dependencies on ids outside the task set are ignored. Levels are
/// sorted by task id, so the computation is deterministic for a given
/// graph. A cycle leaves tasks unplaced and yields `DependencyCycle`.
pub fn compute_levels(tasks: &[Task]) -> EngineResult<Vec<Vec<TaskId>>> {
    if tasks.is_empty() {
        return Ok(Vec::new());
    }

    let known: HashSet<TaskId> = tasks.iter().map(|t| t.id).collect();
    let mut in_degree: HashMap<TaskId, usize> = HashMap::new();
    let mut dependents: HashMap<TaskId, Vec<TaskId>> = HashMap::new();

    for task in tasks {
        let deps: Vec<TaskId> =
            task.dependencies.iter().copied().filter(|d| known.contains(d)).collect();
        in_degree.insert(task.id, deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(task.id);
        }
    }

    let mut current: Vec<TaskId> =
        in_degree.iter().filter(|(_, deg)| **deg == 0).map(|(id, _)| *id).collect();
    current.sort();

    let mut levels: Vec<Vec<TaskId>> = Vec::new();
    let mut placed = 0;

    while !current.is_empty() {
        placed += current.len();
        let mut next: Vec<TaskId> = Vec::new();
        for id in &current {
            for dep in dependents.get(id).cloned().unwrap_or_default() {
                if let Some(deg) = in_degree.get_mut(&dep) {
                    *deg -= 1;
                    if *deg == 0 {
                        next.push(dep);
                    }
                }
            }
        }
        next.sort();
        levels.push(current);
        current = next;
    }

    if placed < tasks.len() {
        let mut remaining: Vec<String> = in_degree
            .iter()
            .filter(|(_, deg)| **deg > 0)
            .map(|(id, _)| id.to_string())
            .collect();
        remaining.sort();
        return Err(EngineError::DependencyCycle(remaining.join(", ")));
    }

    Ok(levels)
}

/// Drives execution for one approved project.
pub(crate) struct ExecutionScheduler {
    engine: Arc<EngineInner>,
}

impl ExecutionScheduler {
    pub(crate) fn new(engine: Arc<EngineInner>) -> Self {
        Self { engine }
    }

    /// Run the project to a terminal status (or until cancelled).
    ///
    /// Errors are recorded on the project rather than returned.
    pub(crate) async fn run(&self, id: ProjectId, mut signal: watch::Receiver<RunSignal>) {
        loop {
            match self.run_levels(id, &mut signal).await {
                Ok(()) => return,
                Err(e @ EngineError::DependencyCycle(_)) => {
                    let _ = self.engine.fail(id, "execute", e.to_string()).await;
                    return;
                }
                Err(EngineError::IllegalTransition { .. }) => {
                    // A pause won a race at a terminal boundary; park until
                    // resumed, then pick the project up again.
                    tracing::debug!(project_id = %id, "execution boundary raced, re-entering");
                    if gate(&mut signal).await == RunSignal::Cancel {
                        return;
                    }
                }
                Err(e) => {
                    tracing::error!(project_id = %id, error = %e, "execution run aborted");
                    let _ = self.engine.fail(id, "execute", e.to_string()).await;
                    return;
                }
            }
        }
    }

    async fn run_levels(
        &self,
        id: ProjectId,
        signal: &mut watch::Receiver<RunSignal>,
    ) -> EngineResult<()> {
        let engine = &self.engine;
        let project = engine.store.project(id).await?;
        let tasks = engine.store.project_tasks(id).await?;
        let levels = compute_levels(&tasks)?;

        // Record each task's position in execution order.
        for (level_idx, level) in levels.iter().enumerate() {
            for task_id in level {
                engine
                    .store
                    .update_task(*task_id, Box::new(move |t| t.level = Some(level_idx)))
                    .await?;
            }
        }

        let ctx = TaskContext {
            project_id: id,
            goal: project.goal_description.clone(),
            output_directory: project.output_directory.clone(),
            plan_excerpt: project
                .plan_document
                .as_ref()
                .map(|d| d.excerpt(PLAN_EXCERPT_CHARS).to_string()),
        };
        let semaphore =
            Arc::new(Semaphore::new(engine.config.scheduler.max_concurrent_tasks.max(1)));

        for (level_idx, level_ids) in levels.iter().enumerate() {
            // Level boundary: pause parks here, cancel exits.
            if gate(signal).await == RunSignal::Cancel {
                return Ok(());
            }

            let mut level_tasks = Vec::with_capacity(level_ids.len());
            for task_id in level_ids {
                level_tasks.push(engine.store.task(*task_id).await?);
            }

            // Resumed runs skip levels that already drained.
            let pending: Vec<Task> =
                level_tasks.into_iter().filter(|t| !t.status.is_terminal()).collect();

            if !pending.is_empty() {
                for task in &pending {
                    engine
                        .store
                        .update_task(
                            task.id,
                            Box::new(|t| {
                                if t.status == TaskStatus::Pending {
                                    t.status = TaskStatus::Ready;
                                }
                            }),
                        )
                        .await?;
                    engine.emit(
                        id,
                        EventKind::TaskStatusChanged { task_id: task.id, status: TaskStatus::Ready },
                    );
                }

                let dispatches = pending.into_iter().map(|task| {
                    let engine = Arc::clone(engine);
                    let ctx = ctx.clone();
                    let semaphore = Arc::clone(&semaphore);
                    async move { execute_one(engine, task.id, ctx, semaphore).await }
                });
                futures::future::join_all(dispatches).await;

                engine.emit(id, EventKind::LevelCompleted { level: level_idx });
            }

            // A failure in this level blocks progression past it: skip
            // everything downstream, then fail the project.
            let mut failed: Vec<Task> = Vec::new();
            for task_id in level_ids {
                let task = engine.store.task(*task_id).await?;
                if task.status == TaskStatus::Failed {
                    failed.push(task);
                }
            }
            if !failed.is_empty() {
                self.skip_dependents(id, &failed).await?;
                // Honor a pause that landed during the drain; the failure
                // is finalized once the project is executing again.
                if gate(signal).await == RunSignal::Cancel {
                    return Ok(());
                }
                let titles: Vec<&str> = failed.iter().map(|t| t.title.as_str()).collect();
                let _ = engine
                    .fail(id, "execute", format!("task failed: {}", titles.join(", ")))
                    .await;
                return Ok(());
            }
        }

        if gate(signal).await == RunSignal::Cancel {
            return Ok(());
        }
        engine.transition(id, ProjectStatus::Completed, "execute").await?;
        tracing::info!(project_id = %id, "project completed");
        Ok(())
    }

    /// Mark every non-terminal task transitively depending on a failed
    /// task as skipped.
    async fn skip_dependents(&self, id: ProjectId, failed: &[Task]) -> EngineResult<()> {
        let engine = &self.engine;
        let tasks = engine.store.project_tasks(id).await?;

        let mut dependents: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        for task in &tasks {
            for dep in &task.dependencies {
                dependents.entry(*dep).or_default().push(task.id);
            }
        }
        let status_by_id: HashMap<TaskId, TaskStatus> =
            tasks.iter().map(|t| (t.id, t.status)).collect();

        let mut queue: VecDeque<TaskId> = failed.iter().map(|t| t.id).collect();
        let mut seen: HashSet<TaskId> = queue.iter().copied().collect();

        while let Some(task_id) = queue.pop_front() {
            for dependent in dependents.get(&task_id).cloned().unwrap_or_default() {
                if !seen.insert(dependent) {
                    continue;
                }
                if !status_by_id[&dependent].is_terminal() {
                    engine
                        .store
                        .update_task(
                            dependent,
                            Box::new(|t| {
                                t.status = TaskStatus::Skipped;
                                t.completed_at = Some(Utc::now());
                            }),
                        )
                        .await?;
                    engine.emit(
                        id,
                        EventKind::TaskStatusChanged {
                            task_id: dependent,
                            status: TaskStatus::Skipped,
                        },
                    );
                }
                queue.push_back(dependent);
            }
        }
        Ok(())
    }
}

/// Execute a single ready task against the agent backend.
async fn execute_one(
    engine: Arc<EngineInner>,
    task_id: TaskId,
    ctx: TaskContext,
    semaphore: Arc<Semaphore>,
) {
    let Ok(_permit) = semaphore.acquire_owned().await else { return };

    // Guard: the task may have been skipped between readiness and now.
    let task = match engine.store.task(task_id).await {
        Ok(task) => task,
        Err(_) => return,
    };
    if task.status != TaskStatus::Ready {
        tracing::debug!(task_id = %task_id, status = %task.status, "skipping dispatch");
        return;
    }

    let project_id = task.project_id;
    // Compare-and-set so a concurrent skip between the fetch and here is
    // not clobbered.
    let claimed = engine
        .store
        .update_task(
            task_id,
            Box::new(|t| {
                if t.status == TaskStatus::Ready {
                    t.status = TaskStatus::Running;
                }
            }),
        )
        .await;
    match claimed {
        Ok(t) if t.status == TaskStatus::Running => {}
        _ => return,
    }
    engine.emit(
        project_id,
        EventKind::TaskStatusChanged { task_id, status: TaskStatus::Running },
    );

    match engine.caps.agent.execute_task(&task, &ctx).await {
        Ok(output) => {
            let summary = output.summary;
            let _ = engine
                .store
                .update_task(
                    task_id,
                    Box::new(move |t| {
                        t.status = TaskStatus::Completed;
                        t.result = Some(summary);
                        t.completed_at = Some(Utc::now());
                    }),
                )
                .await;
            engine.emit(
                project_id,
                EventKind::TaskStatusChanged { task_id, status: TaskStatus::Completed },
            );
        }
        Err(e) => {
            tracing::warn!(task_id = %task_id, error = %e, "task execution failed");
            let message = e.to_string();
            let _ = engine
                .store
                .update_task(
                    task_id,
                    Box::new(move |t| {
                        t.status = TaskStatus::Failed;
                        t.error = Some(message);
                        t.completed_at = Some(Utc::now());
                    }),
                )
                .await;
            engine.emit(
                project_id,
                EventKind::TaskStatusChanged { task_id, status: TaskStatus::Failed },
            );
        }
    }
}

/// Wait at a boundary until the run may proceed or must exit.
async fn gate(signal: &mut watch::Receiver<RunSignal>) -> RunSignal {
    loop {
        let current = *signal.borrow();
        match current {
            RunSignal::Run => return RunSignal::Run,
            RunSignal::Cancel => return RunSignal::Cancel,
            RunSignal::Pause => {
                // Park until resumed or cancelled; a dropped sender means
                // the run was torn down.
                if signal.changed().await.is_err() {
                    return RunSignal::Cancel;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_id(mut task: Task, id: TaskId) -> Task {
        task.id = id;
        task
    }

    fn graph(edges: &[(usize, Vec<usize>)]) -> Vec<Task> {
        let project_id = ProjectId::new();
        let ids: Vec<TaskId> = edges.iter().map(|_| TaskId::new()).collect();
        edges
            .iter()
            .enumerate()
            .map(|(i, (_, deps))| {
                let task = Task::new(project_id, format!("t{i}"), format!("t{i}"))
                    .with_dependencies(deps.iter().map(|d| ids[*d]).collect());
                with_id(task, ids[i])
            })
            .collect()
    }

    #[test]
    fn test_empty_graph_has_no_levels() {
        assert!(compute_levels(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_chain_produces_one_task_per_level() {
        let tasks = graph(&[(0, vec![]), (1, vec![0]), (2, vec![1])]);
        let levels = compute_levels(&tasks).unwrap();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0], vec![tasks[0].id]);
        assert_eq!(levels[1], vec![tasks[1].id]);
        assert_eq!(levels[2], vec![tasks[2].id]);
    }

    #[test]
    fn test_diamond_groups_parallel_tasks() {
        // 0 -> {1, 2} -> 3
        let tasks = graph(&[(0, vec![]), (1, vec![0]), (2, vec![0]), (3, vec![1, 2])]);
        let levels = compute_levels(&tasks).unwrap();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0], vec![tasks[0].id]);
        assert_eq!(levels[1].len(), 2);
        assert_eq!(levels[2], vec![tasks[3].id]);
    }

    #[test]
    fn test_every_task_appears_in_exactly_one_level() {
        let tasks =
            graph(&[(0, vec![]), (1, vec![]), (2, vec![0, 1]), (3, vec![2]), (4, vec![0])]);
        let levels = compute_levels(&tasks).unwrap();
        let placed: Vec<TaskId> = levels.into_iter().flatten().collect();
        assert_eq!(placed.len(), tasks.len());
        let unique: HashSet<TaskId> = placed.into_iter().collect();
        assert_eq!(unique.len(), tasks.len());
    }

    #[test]
    fn test_cycle_is_detected() {
        let project_id = ProjectId::new();
        let a = TaskId::new();
        let b = TaskId::new();
        let tasks = vec![
            with_id(Task::new(project_id, "a", "a").with_dependencies(vec![b]), a),
            with_id(Task::new(project_id, "b", "b").with_dependencies(vec![a]), b),
        ];
        let err = compute_levels(&tasks).unwrap_err();
        assert!(matches!(err, EngineError::DependencyCycle(_)));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let project_id = ProjectId::new();
        let a = TaskId::new();
        let tasks =
            vec![with_id(Task::new(project_id, "a", "a").with_dependencies(vec![a]), a)];
        assert!(matches!(
            compute_levels(&tasks),
            Err(EngineError::DependencyCycle(_))
        ));
    }

    #[test]
    fn test_unknown_dependency_ids_are_ignored() {
        let project_id = ProjectId::new();
        let tasks = vec![Task::new(project_id, "a", "a")
            .with_dependencies(vec![TaskId::new()])];
        let levels = compute_levels(&tasks).unwrap();
        assert_eq!(levels.len(), 1);
    }

    #[test]
    fn test_level_computation_is_deterministic() {
        let tasks = graph(&[(0, vec![]), (1, vec![]), (2, vec![0]), (3, vec![1]), (4, vec![2, 3])]);
        let first = compute_levels(&tasks).unwrap();
        for _ in 0..10 {
            assert_eq!(compute_levels(&tasks).unwrap(), first);
        }
    }

    #[test]
    fn test_partial_cycle_reports_only_cycle_members() {
        let project_id = ProjectId::new();
        let root = TaskId::new();
        let a = TaskId::new();
        let b = TaskId::new();
        let tasks = vec![
            with_id(Task::new(project_id, "root", "root"), root),
            with_id(Task::new(project_id, "a", "a").with_dependencies(vec![b, root]), a),
            with_id(Task::new(project_id, "b", "b").with_dependencies(vec![a]), b),
        ];
        let err = compute_levels(&tasks).unwrap_err();
        let EngineError::DependencyCycle(nodes) = err else { panic!("expected cycle") };
        assert!(!nodes.contains(&root.to_string()));
    }
}
