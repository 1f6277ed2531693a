//! External capability interfaces.
//!
//! The engine treats goal parsing, research, document synthesis, task
//! decomposition, team assembly, and task execution as opaque
//! capabilities behind small traits, with distinct implementations
//! swappable per deployment. Nothing in the engine hard-codes a specific
//! provider.

mod builtin;
mod jail;

pub use builtin::{
    HeuristicGoalParser, TemplateAgent, TemplateDecomposer, TemplateResearcher,
    TemplateSynthesizer, TemplateTeamAssembler,
};
pub use jail::{LocalOutputJail, OutputJail};

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{GoalAnalysis, PlanDocument, ProjectId, ResearchDepth, Task};

/// A task produced by the decomposer, before materialization.
///
/// Specs reference each other by short string keys; the pipeline resolves
/// the keys into real task ids when persisting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Short unique key within the plan (e.g. "setup-db")
    pub key: String,

    /// Short task title
    pub title: String,

    /// What the agent backend is asked to do
    pub description: String,

    /// Keys of specs that must complete first
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Recommended agent role
    #[serde(default)]
    pub role: Option<String>,

    /// Rough effort estimate
    #[serde(default)]
    pub estimated_minutes: u32,
}

impl TaskSpec {
    /// Create a spec with no dependencies.
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            key: key.into(),
            description: title.clone(),
            title,
            depends_on: Vec::new(),
            role: None,
            estimated_minutes: 0,
        }
    }

    /// Add dependency keys.
    #[must_use]
    pub fn depends_on(mut self, keys: &[&str]) -> Self {
        self.depends_on = keys.iter().map(|k| (*k).to_string()).collect();
        self
    }

    /// Set the recommended role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// A recommended team member from the team assembly phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Agent name (e.g. "frontend-dev")
    pub name: String,

    /// Role the agent fills (matched against task roles)
    pub role: String,

    /// Specialties for display surfaces
    #[serde(default)]
    pub specialties: Vec<String>,
}

/// Output of a successful task execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Summary of what was produced
    pub summary: String,

    /// Files written under the project's output directory
    #[serde(default)]
    pub files: Vec<String>,
}

/// Context handed to the agent backend with each task.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Owning project
    pub project_id: ProjectId,

    /// The project's goal description
    pub goal: String,

    /// Where the agent may write artifacts
    pub output_directory: PathBuf,

    /// Excerpt of the plan document for grounding
    pub plan_excerpt: Option<String>,
}

/// Parses a natural-language goal into a structured analysis.
///
/// Failure here is non-fatal: the pipeline degrades to a default
/// analysis instead of failing the project.
#[async_trait]
pub trait GoalParser: Send + Sync {
    /// Analyze a goal description.
    async fn analyze(&self, goal: &str) -> anyhow::Result<GoalAnalysis>;
}

/// Gathers domain knowledge for the plan.
#[async_trait]
pub trait Researcher: Send + Sync {
    /// Produce research notes for the goal at the given depth.
    async fn research(
        &self,
        goal: &str,
        analysis: &GoalAnalysis,
        depth: ResearchDepth,
    ) -> anyhow::Result<String>;
}

/// Synthesizes the requirements document.
#[async_trait]
pub trait DocumentSynthesizer: Send + Sync {
    /// Produce a plan document from the goal, analysis, and research.
    async fn synthesize(
        &self,
        goal: &str,
        analysis: &GoalAnalysis,
        research: Option<&str>,
    ) -> anyhow::Result<PlanDocument>;
}

/// Decomposes a plan into atomic task specs.
#[async_trait]
pub trait TaskDecomposer: Send + Sync {
    /// Produce task specs with dependency keys populated.
    async fn decompose(
        &self,
        goal: &str,
        plan: &PlanDocument,
        research: Option<&str>,
    ) -> anyhow::Result<Vec<TaskSpec>>;
}

/// Recommends a team composition for the task set.
#[async_trait]
pub trait TeamAssembler: Send + Sync {
    /// Produce agent specs covering the roles the tasks need.
    async fn assemble(&self, tasks: &[TaskSpec]) -> anyhow::Result<Vec<AgentSpec>>;
}

/// Executes a single task. Opaque; may take arbitrary wall-clock time.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Execute a task and return its output.
    async fn execute_task(&self, task: &Task, ctx: &TaskContext) -> anyhow::Result<TaskOutput>;
}

/// The full set of capabilities an engine instance is wired with.
#[derive(Clone)]
pub struct CapabilitySet {
    /// Goal parsing capability
    pub goal_parser: Arc<dyn GoalParser>,

    /// Research capability
    pub researcher: Arc<dyn Researcher>,

    /// Document synthesis capability
    pub synthesizer: Arc<dyn DocumentSynthesizer>,

    /// Task decomposition capability
    pub decomposer: Arc<dyn TaskDecomposer>,

    /// Team assembly capability
    pub assembler: Arc<dyn TeamAssembler>,

    /// Task execution backend
    pub agent: Arc<dyn AgentBackend>,

    /// Output directory provisioning
    pub jail: Arc<dyn OutputJail>,
}

impl CapabilitySet {
    /// Capability set backed by the built-in template implementations.
    ///
    /// Produces deterministic plans without any external provider; useful
    /// for offline operation and tests.
    pub fn template(output_root: impl Into<PathBuf>) -> Self {
        Self {
            goal_parser: Arc::new(HeuristicGoalParser),
            researcher: Arc::new(TemplateResearcher),
            synthesizer: Arc::new(TemplateSynthesizer),
            decomposer: Arc::new(TemplateDecomposer),
            assembler: Arc::new(TemplateTeamAssembler),
            agent: Arc::new(TemplateAgent),
            jail: Arc::new(LocalOutputJail::new(output_root)),
        }
    }
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilitySet").finish()
    }
}
