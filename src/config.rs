//! Engine configuration.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::events::ReconnectConfig;
use crate::model::ResearchDepth;

/// Engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// General settings
    pub general: GeneralConfig,

    /// Execution scheduler settings
    pub scheduler: SchedulerConfig,

    /// Event channel settings
    pub events: EventsConfig,

    /// Observer reconnect backoff policy
    pub reconnect: ReconnectConfig,
}

/// General engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Minimum accepted goal length, in characters
    pub min_goal_length: usize,

    /// Maximum accepted goal length, in characters
    pub max_goal_length: usize,

    /// Research depth used when neither the caller nor the goal analysis
    /// suggests one
    pub default_research_depth: ResearchDepth,

    /// Root directory for project output directories.
    /// Supports `~` expansion.
    pub output_root: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            min_goal_length: 10,
            max_goal_length: 5000,
            default_research_depth: ResearchDepth::Standard,
            output_root: default_output_root(),
        }
    }
}

/// Execution scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of tasks dispatched concurrently within a level
    pub max_concurrent_tasks: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_concurrent_tasks: num_cpus::get().max(4) }
    }
}

/// Event channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Per-subscriber event buffer capacity
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { channel_capacity: 256 }
    }
}

impl EngineConfig {
    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("missionctl")
            .join("config.toml")
    }

    /// Load configuration from the default location, falling back to
    /// defaults when no file exists.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from a specific path, falling back to defaults
    /// when the file does not exist.
    pub fn load_from(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the output root with `~` expansion.
    pub fn output_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.general.output_root).into_owned())
    }
}

fn default_output_root() -> String {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("missionctl")
        .join("projects")
        .to_string_lossy()
        .into_owned()
}
