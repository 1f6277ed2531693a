//! Structured goal analysis.
//!
//! The goal parser capability returns loosely structured data; everything
//! here is normalized on construction so the rest of the engine can trust
//! the values.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::project::ResearchDepth;

/// Cap on sub-domains kept from the parser output.
const MAX_SUB_DOMAINS: usize = 6;

/// Cap on clarification questions kept from the parser output.
const MAX_CLARIFICATIONS: usize = 4;

/// Primary domain of a project goal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Code,
    Business,
    Creative,
    Education,
    Events,
    Home,
    /// Spans multiple domains, or the parser could not decide
    #[default]
    Hybrid,
}

impl Domain {
    /// Parse a domain from its wire name, falling back to `Hybrid`.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "code" => Self::Code,
            "business" => Self::Business,
            "creative" => Self::Creative,
            "education" => Self::Education,
            "events" => Self::Events,
            "home" => Self::Home,
            _ => Self::Hybrid,
        }
    }

    /// Human-readable label for display surfaces.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Code => "Software & Code",
            Self::Business => "Business & Strategy",
            Self::Creative => "Creative & Content",
            Self::Education => "Learning & Education",
            Self::Events => "Events & Logistics",
            Self::Home => "Home & Physical",
            Self::Hybrid => "Multi-Domain",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// T-shirt size complexity estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Complexity {
    S,
    #[default]
    M,
    L,
    XL,
}

impl Complexity {
    /// Parse a complexity from its wire name, falling back to `M`.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "S" => Self::S,
            "L" => Self::L,
            "XL" => Self::XL,
            _ => Self::M,
        }
    }

    /// Minimum number of phases a plan of this complexity should have.
    pub const fn min_phases(&self) -> u8 {
        match self {
            Self::S | Self::M => 1,
            Self::L => 2,
            Self::XL => 3,
        }
    }
}

/// Structured analysis of a user's project goal.
///
/// Produced by the goal parser as the first planning phase. Informs
/// research depth resolution and planner context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalAnalysis {
    /// Clear one-sentence restatement of the goal
    pub goal: String,

    /// Primary domain
    pub domain: Domain,

    /// Specific sub-domains (e.g. "web-development", "react")
    pub sub_domains: Vec<String>,

    /// Estimated complexity
    pub complexity: Complexity,

    /// Number of expected project phases
    pub estimated_phases: u8,

    /// Recommended research depth
    pub suggested_research_depth: ResearchDepth,

    /// Questions worth asking before planning
    pub clarifications_needed: Vec<String>,

    /// Parser confidence in the analysis (0.0 to 1.0)
    pub confidence: f64,
}

impl GoalAnalysis {
    /// Build a normalized analysis from raw parser output.
    ///
    /// Clamps confidence, enforces minimum phases for the complexity,
    /// and caps list lengths.
    pub fn normalized(
        goal: impl Into<String>,
        domain: Domain,
        complexity: Complexity,
        estimated_phases: u8,
        suggested_research_depth: ResearchDepth,
        confidence: f64,
    ) -> Self {
        Self {
            goal: goal.into(),
            domain,
            sub_domains: Vec::new(),
            complexity,
            estimated_phases: estimated_phases.clamp(1, 10).max(complexity.min_phases()),
            suggested_research_depth,
            clarifications_needed: Vec::new(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Default analysis used when goal parsing fails or is skipped.
    ///
    /// The pipeline degrades to this rather than failing the project.
    pub fn fallback(goal: impl Into<String>) -> Self {
        Self::normalized(goal, Domain::Hybrid, Complexity::M, 1, ResearchDepth::Standard, 0.0)
    }

    /// Attach sub-domains, keeping only non-empty entries up to the cap.
    #[must_use]
    pub fn with_sub_domains(mut self, sub_domains: Vec<String>) -> Self {
        self.sub_domains = sanitize_list(sub_domains, MAX_SUB_DOMAINS);
        self
    }

    /// Attach clarification questions, keeping only non-empty entries up
    /// to the cap.
    #[must_use]
    pub fn with_clarifications(mut self, clarifications: Vec<String>) -> Self {
        self.clarifications_needed = sanitize_list(clarifications, MAX_CLARIFICATIONS);
        self
    }

    /// Whether the goal needs clarification before planning.
    pub fn needs_clarification(&self) -> bool {
        !self.clarifications_needed.is_empty()
    }
}

/// Keep only non-empty trimmed strings, up to `cap` entries.
fn sanitize_list(items: Vec<String>, cap: usize) -> Vec<String> {
    items.into_iter().filter(|s| !s.trim().is_empty()).take(cap).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_parse() {
        assert_eq!(Domain::parse_or_default("code"), Domain::Code);
        assert_eq!(Domain::parse_or_default(" Business "), Domain::Business);
        assert_eq!(Domain::parse_or_default("unknown"), Domain::Hybrid);
    }

    #[test]
    fn test_complexity_parse() {
        assert_eq!(Complexity::parse_or_default("xl"), Complexity::XL);
        assert_eq!(Complexity::parse_or_default("??"), Complexity::M);
    }

    #[test]
    fn test_confidence_clamped() {
        let analysis = GoalAnalysis::normalized(
            "goal",
            Domain::Code,
            Complexity::S,
            1,
            ResearchDepth::Quick,
            7.5,
        );
        assert!((analysis.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_min_phases_enforced_for_complexity() {
        let analysis = GoalAnalysis::normalized(
            "goal",
            Domain::Code,
            Complexity::XL,
            1,
            ResearchDepth::Deep,
            0.9,
        );
        assert_eq!(analysis.estimated_phases, 3);
    }

    #[test]
    fn test_phases_clamped_to_upper_bound() {
        let analysis = GoalAnalysis::normalized(
            "goal",
            Domain::Code,
            Complexity::M,
            200,
            ResearchDepth::Standard,
            0.5,
        );
        assert_eq!(analysis.estimated_phases, 10);
    }

    #[test]
    fn test_clarifications_capped() {
        let clarifications = (0..10).map(|i| format!("q{i}")).collect();
        let analysis = GoalAnalysis::fallback("goal").with_clarifications(clarifications);
        assert_eq!(analysis.clarifications_needed.len(), MAX_CLARIFICATIONS);
        assert!(analysis.needs_clarification());
    }

    #[test]
    fn test_empty_sub_domains_dropped() {
        let analysis = GoalAnalysis::fallback("goal")
            .with_sub_domains(vec!["web".into(), "  ".into(), "react".into()]);
        assert_eq!(analysis.sub_domains, vec!["web".to_string(), "react".to_string()]);
    }
}
