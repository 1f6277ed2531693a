//! Shared fixtures for integration tests: scripted capabilities and
//! engine polling helpers.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};

use missionctl::{
    AgentBackend, AgentSpec, CapabilitySet, Complexity, DocumentSynthesizer, Domain, EngineConfig,
    GoalAnalysis, GoalParser, LocalOutputJail, MissionEngine, PlanDocument, Project, ProjectId,
    ProjectStatus, Researcher, ResearchDepth, Task, TaskContext, TaskDecomposer, TaskOutput,
    TaskSpec, TaskStatus, TeamAssembler,
};

/// Scripted behavior for a full capability set.
#[derive(Clone, Default)]
pub struct Script {
    /// Goal parser returns an error (pipeline should degrade)
    pub fail_goal_analysis: bool,
    /// Researcher returns an error (fatal)
    pub fail_research: bool,
    /// Synthesizer returns an error (fatal)
    pub fail_prd: bool,
    /// Decomposer returns an error (fatal)
    pub fail_tasks: bool,
    /// Assembler returns an error (fatal)
    pub fail_team: bool,
    /// Task specs the decomposer returns
    pub specs: Vec<TaskSpec>,
    /// Titles whose agent execution fails
    pub failing_titles: HashSet<String>,
    /// When set, the agent waits for one permit per task before finishing
    pub gate: Option<Arc<Semaphore>>,
    /// When set, the agent reports each started task title
    pub started: Option<mpsc::UnboundedSender<String>>,
}

impl Script {
    /// A three-task chain: design -> implement -> verify.
    pub fn chain() -> Vec<TaskSpec> {
        vec![
            TaskSpec::new("design", "Design"),
            TaskSpec::new("implement", "Implement").depends_on(&["design"]),
            TaskSpec::new("verify", "Verify").depends_on(&["implement"]),
        ]
    }

    /// Two parallel roots plus a dependent: {a, b} -> c (c depends on a).
    pub fn fan() -> Vec<TaskSpec> {
        vec![
            TaskSpec::new("a", "Task A"),
            TaskSpec::new("b", "Task B"),
            TaskSpec::new("c", "Task C").depends_on(&["a"]),
        ]
    }
}

struct ScriptedParser(Script);

#[async_trait]
impl GoalParser for ScriptedParser {
    async fn analyze(&self, goal: &str) -> anyhow::Result<GoalAnalysis> {
        if self.0.fail_goal_analysis {
            anyhow::bail!("parser offline");
        }
        Ok(GoalAnalysis::normalized(
            goal,
            Domain::Code,
            Complexity::M,
            2,
            ResearchDepth::Quick,
            0.9,
        ))
    }
}

struct ScriptedResearcher(Script);

#[async_trait]
impl Researcher for ScriptedResearcher {
    async fn research(
        &self,
        goal: &str,
        _analysis: &GoalAnalysis,
        depth: ResearchDepth,
    ) -> anyhow::Result<String> {
        if self.0.fail_research {
            anyhow::bail!("research provider unavailable");
        }
        Ok(format!("notes for '{goal}' at {depth}"))
    }
}

struct ScriptedSynthesizer(Script);

#[async_trait]
impl DocumentSynthesizer for ScriptedSynthesizer {
    async fn synthesize(
        &self,
        goal: &str,
        _analysis: &GoalAnalysis,
        _research: Option<&str>,
    ) -> anyhow::Result<PlanDocument> {
        if self.0.fail_prd {
            anyhow::bail!("synthesis failed");
        }
        Ok(PlanDocument::new("PRD", format!("# {goal}")))
    }
}

struct ScriptedDecomposer(Script);

#[async_trait]
impl TaskDecomposer for ScriptedDecomposer {
    async fn decompose(
        &self,
        _goal: &str,
        _plan: &PlanDocument,
        _research: Option<&str>,
    ) -> anyhow::Result<Vec<TaskSpec>> {
        if self.0.fail_tasks {
            anyhow::bail!("decomposition failed");
        }
        Ok(self.0.specs.clone())
    }
}

struct ScriptedAssembler(Script);

#[async_trait]
impl TeamAssembler for ScriptedAssembler {
    async fn assemble(&self, _tasks: &[TaskSpec]) -> anyhow::Result<Vec<AgentSpec>> {
        if self.0.fail_team {
            anyhow::bail!("assembly failed");
        }
        Ok(vec![AgentSpec {
            name: "generalist-agent".to_string(),
            role: "generalist".to_string(),
            specialties: Vec::new(),
        }])
    }
}

struct ScriptedAgent(Script);

#[async_trait]
impl AgentBackend for ScriptedAgent {
    async fn execute_task(&self, task: &Task, _ctx: &TaskContext) -> anyhow::Result<TaskOutput> {
        if let Some(started) = &self.0.started {
            let _ = started.send(task.title.clone());
        }
        if let Some(gate) = &self.0.gate {
            let permit = gate.acquire().await?;
            permit.forget();
        }
        if self.0.failing_titles.contains(&task.title) {
            anyhow::bail!("agent crashed on '{}'", task.title);
        }
        Ok(TaskOutput { summary: format!("did {}", task.title), files: Vec::new() })
    }
}

/// Build an engine wired with the scripted capabilities.
///
/// Returns the tempdir alongside so the output root outlives the test.
pub fn engine_with(script: Script) -> (MissionEngine, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let caps = CapabilitySet {
        goal_parser: Arc::new(ScriptedParser(script.clone())),
        researcher: Arc::new(ScriptedResearcher(script.clone())),
        synthesizer: Arc::new(ScriptedSynthesizer(script.clone())),
        decomposer: Arc::new(ScriptedDecomposer(script.clone())),
        assembler: Arc::new(ScriptedAssembler(script.clone())),
        agent: Arc::new(ScriptedAgent(script)),
        jail: Arc::new(LocalOutputJail::new(tmp.path())),
    };
    (MissionEngine::new(EngineConfig::default(), caps), tmp)
}

/// Poll until the project reaches the expected status.
pub async fn wait_for_status(engine: &MissionEngine, id: ProjectId, status: ProjectStatus) -> Project {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(project) = engine.project(id).await {
            if project.status == status {
                return project;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for project {id} to reach {status}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until the named task reaches the expected status.
pub async fn wait_for_task_status(
    engine: &MissionEngine,
    id: ProjectId,
    title: &str,
    status: TaskStatus,
) -> Task {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(tasks) = engine.tasks(id).await {
            if let Some(task) = tasks.into_iter().find(|t| t.title == title && t.status == status)
            {
                return task;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for task '{title}' to reach {status}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Find a task by title.
pub fn task_named(tasks: &[Task], title: &str) -> Task {
    tasks
        .iter()
        .find(|t| t.title == title)
        .unwrap_or_else(|| panic!("no task titled '{title}'"))
        .clone()
}
