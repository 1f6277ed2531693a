//! Project entity and lifecycle status.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis::GoalAnalysis;
use super::document::PlanDocument;
use crate::capability::AgentSpec;

/// Maximum number of characters of the goal used for the derived title.
const TITLE_MAX_CHARS: usize = 80;

/// Opaque unique identifier for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(Uuid);

impl ProjectId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a project.
///
/// Statuses move strictly along the edges of the lifecycle state machine:
/// `Draft -> Planning -> AwaitingApproval -> Approved -> Executing ->
/// {Paused <-> Executing} -> Completed`, with `Failed` reachable from
/// `Planning` or `Executing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Created but planning has not started yet
    Draft,
    /// The planning pipeline is running
    Planning,
    /// Plan generated, waiting for human approval
    AwaitingApproval,
    /// Plan approved, execution about to start
    Approved,
    /// The execution scheduler is dispatching tasks
    Executing,
    /// Execution paused at a level boundary
    Paused,
    /// All tasks finished successfully
    Completed,
    /// Planning or execution hit an unrecoverable error
    Failed,
}

impl ProjectStatus {
    /// Check if the project has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Get the wire name for this status.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Planning => "planning",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Approved => "approved",
            Self::Executing => "executing",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How thorough the research phase should be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchDepth {
    /// Skip research entirely
    None,
    /// Quick pass over the essentials
    Quick,
    /// Balanced depth
    #[default]
    Standard,
    /// Exhaustive research
    Deep,
}

impl ResearchDepth {
    /// Parse a depth from its wire name, falling back to `Standard`.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "none" => Self::None,
            "quick" => Self::Quick,
            "deep" => Self::Deep,
            _ => Self::Standard,
        }
    }
}

impl fmt::Display for ResearchDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Deep => "deep",
        };
        write!(f, "{}", name)
    }
}

/// One goal-to-execution unit of work tracked by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique id
    pub id: ProjectId,

    /// Human title, derived from the goal
    pub title: String,

    /// Current lifecycle status
    pub status: ProjectStatus,

    /// Original natural-language input (immutable after creation)
    pub goal_description: String,

    /// Structured goal analysis, present once the analysis phase completed
    pub goal_analysis: Option<GoalAnalysis>,

    /// Resolved research thoroughness
    pub research_depth: ResearchDepth,

    /// Raw research notes produced by the research phase
    pub research_notes: Option<String>,

    /// Synthesized requirements document
    pub plan_document: Option<PlanDocument>,

    /// Recommended team composition from the team assembly phase
    pub team: Vec<AgentSpec>,

    /// Where task artifacts land (provisioned by the output jail)
    pub output_directory: PathBuf,

    /// Error recorded when the project failed
    pub error: Option<String>,

    /// When the project was created
    pub created_at: DateTime<Utc>,

    /// When the project reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,
}

impl Project {
    /// Create a draft project from a goal description.
    pub fn draft(goal_description: impl Into<String>, output_directory: PathBuf) -> Self {
        let goal_description = goal_description.into();
        Self {
            id: ProjectId::new(),
            title: derive_title(&goal_description),
            status: ProjectStatus::Draft,
            goal_description,
            goal_analysis: None,
            research_depth: ResearchDepth::Standard,
            research_notes: None,
            plan_document: None,
            team: Vec::new(),
            output_directory,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Task completion counters for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectProgress {
    /// Tasks that reached `Completed` or `Skipped`
    pub completed: usize,

    /// Total number of tasks
    pub total: usize,

    /// Completion percentage, rounded to the nearest whole number
    pub percent: u8,
}

impl ProjectProgress {
    /// Compute progress from completed/total counters.
    pub fn new(completed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u8
        };
        Self { completed, total, percent }
    }
}

/// Derive a display title from the goal: the first sentence-ish chunk,
/// truncated on a character boundary.
fn derive_title(goal: &str) -> String {
    let trimmed = goal.trim();
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        return trimmed.to_string();
    }
    trimmed.chars().take(TITLE_MAX_CHARS).collect()
}
