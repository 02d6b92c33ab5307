pub mod agent;
pub mod artifact;
pub mod init;
pub mod next;
pub mod preset;
pub mod run;
pub mod status;

use anyhow::Context;
use relay_core::{config::Config, preset::PresetRegistry, registry::AgentRegistry};
use std::path::Path;

/// Config plus builtin and project-local agents and presets.
pub struct Project {
    pub config: Config,
    pub agents: AgentRegistry,
    pub presets: PresetRegistry,
}

impl Project {
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let config = Config::load(root).context("failed to load .shared/config.yaml")?;
        let agents_dir = config.agents_path(root);
        let agents = AgentRegistry::with_dir(&agents_dir)
            .with_context(|| format!("failed to load agents from {}", agents_dir.display()))?;

        let presets_dir = config.presets_path(root);
        let presets = PresetRegistry::with_dir(&presets_dir, &agents)
            .with_context(|| format!("failed to load presets from {}", presets_dir.display()))?;

        for warning in config.validate(&agents) {
            tracing::warn!("config: {}", warning.message);
        }

        Ok(Self {
            config,
            agents,
            presets,
        })
    }
}
