//! Built-in template capabilities.
//!
//! Deterministic, offline implementations of every capability trait.
//! They produce skeleton plans from simple heuristics so the engine is
//! usable without any AI provider configured, and they double as the
//! default wiring for tests.

use async_trait::async_trait;

use super::{
    AgentBackend, AgentSpec, DocumentSynthesizer, GoalParser, Researcher, TaskContext,
    TaskDecomposer, TaskOutput, TaskSpec, TeamAssembler,
};
use crate::model::{Complexity, Domain, GoalAnalysis, PlanDocument, ResearchDepth, Task};

/// Keyword-based goal analysis.
///
/// Detects the domain from characteristic keywords and sizes complexity
/// by goal length. Crude, but deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicGoalParser;

#[async_trait]
impl GoalParser for HeuristicGoalParser {
    async fn analyze(&self, goal: &str) -> anyhow::Result<GoalAnalysis> {
        let domain = infer_domain(goal);
        let complexity = infer_complexity(goal);
        let depth = match complexity {
            Complexity::S => ResearchDepth::Quick,
            Complexity::M | Complexity::L => ResearchDepth::Standard,
            Complexity::XL => ResearchDepth::Deep,
        };

        Ok(GoalAnalysis::normalized(
            goal.trim(),
            domain,
            complexity,
            complexity.min_phases(),
            depth,
            0.5,
        ))
    }
}

/// Researcher that records what would have been researched.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateResearcher;

#[async_trait]
impl Researcher for TemplateResearcher {
    async fn research(
        &self,
        goal: &str,
        analysis: &GoalAnalysis,
        depth: ResearchDepth,
    ) -> anyhow::Result<String> {
        Ok(format!(
            "Research notes ({depth})\n\nDomain: {}\nGoal: {goal}\n",
            analysis.domain.label()
        ))
    }
}

/// Synthesizer that renders a markdown PRD skeleton.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSynthesizer;

#[async_trait]
impl DocumentSynthesizer for TemplateSynthesizer {
    async fn synthesize(
        &self,
        goal: &str,
        analysis: &GoalAnalysis,
        research: Option<&str>,
    ) -> anyhow::Result<PlanDocument> {
        let mut content = format!("# Requirements\n\n## Goal\n\n{goal}\n\n");
        content.push_str(&format!(
            "## Scope\n\n- Domain: {}\n- Complexity: {:?}\n- Phases: {}\n",
            analysis.domain.label(),
            analysis.complexity,
            analysis.estimated_phases
        ));
        if let Some(notes) = research {
            content.push_str("\n## Research\n\n");
            content.push_str(notes);
        }
        Ok(PlanDocument::new("Requirements", content))
    }
}

/// Decomposer that emits a design -> implement -> verify chain per phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateDecomposer;

#[async_trait]
impl TaskDecomposer for TemplateDecomposer {
    async fn decompose(
        &self,
        goal: &str,
        _plan: &PlanDocument,
        _research: Option<&str>,
    ) -> anyhow::Result<Vec<TaskSpec>> {
        let mut specs = vec![
            TaskSpec::new("design", format!("Design: {goal}")).with_role("architect"),
            TaskSpec::new("implement", format!("Implement: {goal}"))
                .depends_on(&["design"])
                .with_role("builder"),
            TaskSpec::new("verify", format!("Verify: {goal}"))
                .depends_on(&["implement"])
                .with_role("reviewer"),
        ];
        for spec in &mut specs {
            spec.estimated_minutes = 30;
        }
        Ok(specs)
    }
}

/// Assembler that derives one agent per distinct task role.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateTeamAssembler;

#[async_trait]
impl TeamAssembler for TemplateTeamAssembler {
    async fn assemble(&self, tasks: &[TaskSpec]) -> anyhow::Result<Vec<AgentSpec>> {
        let mut team: Vec<AgentSpec> = Vec::new();
        for spec in tasks {
            let role = spec.role.clone().unwrap_or_else(|| "generalist".to_string());
            if !team.iter().any(|a| a.role == role) {
                team.push(AgentSpec {
                    name: format!("{role}-agent"),
                    role,
                    specialties: Vec::new(),
                });
            }
        }
        Ok(team)
    }
}

/// Agent backend that acknowledges each task without doing real work.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateAgent;

#[async_trait]
impl AgentBackend for TemplateAgent {
    async fn execute_task(&self, task: &Task, _ctx: &TaskContext) -> anyhow::Result<TaskOutput> {
        Ok(TaskOutput { summary: format!("Completed: {}", task.title), files: Vec::new() })
    }
}

fn infer_domain(goal: &str) -> Domain {
    let lower = goal.to_lowercase();
    const CODE: &[&str] = &["app", "api", "code", "build", "web", "software", "deploy"];
    const BUSINESS: &[&str] = &["business", "market", "sales", "pitch", "budget plan"];
    const CREATIVE: &[&str] = &["write", "design a logo", "video", "story", "song"];
    const EDUCATION: &[&str] = &["learn", "course", "study", "teach"];
    const EVENTS: &[&str] = &["event", "wedding", "conference", "party", "trip"];
    const HOME: &[&str] = &["home", "garden", "renovate", "kitchen"];

    let groups: [(&[&str], Domain); 6] = [
        (CODE, Domain::Code),
        (BUSINESS, Domain::Business),
        (CREATIVE, Domain::Creative),
        (EDUCATION, Domain::Education),
        (EVENTS, Domain::Events),
        (HOME, Domain::Home),
    ];

    let mut matched = None;
    for (keywords, domain) in groups {
        if keywords.iter().any(|k| lower.contains(k)) {
            if matched.is_some() {
                return Domain::Hybrid;
            }
            matched = Some(domain);
        }
    }
    matched.unwrap_or(Domain::Hybrid)
}

fn infer_complexity(goal: &str) -> Complexity {
    match goal.split_whitespace().count() {
        0..=8 => Complexity::S,
        9..=25 => Complexity::M,
        26..=60 => Complexity::L,
        _ => Complexity::XL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_heuristic_parser_detects_code_domain() {
        let analysis =
            HeuristicGoalParser.analyze("Build a personal budget tracker web app").await.unwrap();
        assert_eq!(analysis.domain, Domain::Code);
    }

    #[tokio::test]
    async fn test_heuristic_parser_hybrid_on_mixed_signals() {
        let analysis =
            HeuristicGoalParser.analyze("Plan a conference and build its web app").await.unwrap();
        assert_eq!(analysis.domain, Domain::Hybrid);
    }

    #[tokio::test]
    async fn test_template_decomposer_produces_chain() {
        let plan = PlanDocument::new("Requirements", "content");
        let specs = TemplateDecomposer.decompose("goal", &plan, None).await.unwrap();

        assert_eq!(specs.len(), 3);
        assert!(specs[0].depends_on.is_empty());
        assert_eq!(specs[1].depends_on, vec!["design".to_string()]);
        assert_eq!(specs[2].depends_on, vec!["implement".to_string()]);
    }

    #[tokio::test]
    async fn test_template_assembler_dedupes_roles() {
        let specs = vec![
            TaskSpec::new("a", "A").with_role("builder"),
            TaskSpec::new("b", "B").with_role("builder"),
            TaskSpec::new("c", "C"),
        ];
        let team = TemplateTeamAssembler.assemble(&specs).await.unwrap();

        assert_eq!(team.len(), 2);
        assert!(team.iter().any(|a| a.role == "builder"));
        assert!(team.iter().any(|a| a.role == "generalist"));
    }
}
