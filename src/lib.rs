//! # Missionctl
//!
//! Mission control for AI agent projects - plan, approve, and execute
//! long-running goals.
//!
//! Missionctl takes a natural-language goal, runs it through a
//! multi-phase planning pipeline (goal analysis, research, requirements
//! document, task decomposition, team assembly), waits for human
//! approval, then executes the resulting task graph in dependency order
//! with live progress events.
//!
//! ## Features
//!
//! - **Lifecycle state machine**: projects move strictly along
//!   `draft -> planning -> awaiting_approval -> approved -> executing ->
//!   completed`, with a pause/resume cycle and inspectable failures
//! - **Dependency-level scheduling**: tasks grouped into concurrency
//!   levels by topological peeling; cycles are detected, never deadlock
//! - **Resilient event delivery**: fire-and-forget broadcast plus full
//!   resync on (re)attach, with configurable reconnect backoff
//! - **Swappable capabilities**: goal parser, researcher, synthesizer,
//!   decomposer, team assembler, and agent backend are trait objects
//!
//! ## Quick Start
//!
//! ```no_run
//! use missionctl::{CapabilitySet, EngineConfig, MissionEngine};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = EngineConfig::default();
//! let caps = CapabilitySet::template(config.output_root());
//! let engine = MissionEngine::new(config, caps);
//!
//! let project = engine
//!     .create_project("Build a personal budget tracker web app", None, None)
//!     .await?;
//! // ... wait for awaiting_approval, then:
//! engine.approve(project.id).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::redundant_clone)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::use_self)]

pub mod capability;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod store;

pub use capability::{
    AgentBackend, AgentSpec, CapabilitySet, DocumentSynthesizer, GoalParser, LocalOutputJail,
    OutputJail, Researcher, TaskContext, TaskDecomposer, TaskOutput, TaskSpec, TeamAssembler,
};
pub use config::EngineConfig;
pub use engine::{compute_levels, MissionEngine, PlanPhase, PlanView};
pub use error::{EngineError, EngineResult};
pub use events::{
    EngineCommand, Event, EventChannel, EventKind, ObserverConnection, ObserverSession,
    ObserverTransport, ProjectSnapshot, ReconnectConfig,
};
pub use model::{
    Complexity, Domain, GoalAnalysis, PlanDocument, Project, ProjectId, ProjectProgress,
    ProjectStatus, ResearchDepth, Task, TaskId, TaskStatus,
};
pub use store::{MemoryStore, ProjectStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "missionctl";

/// Initialize tracing with an environment-driven filter.
///
/// Verbose mode defaults to `debug` for this crate; otherwise `info`.
/// Respects `RUST_LOG` when set.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_filter = if verbose { "missionctl=debug" } else { "missionctl=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
}
