use crate::agent::AgentDefinition;
use crate::catalog::builtin_agents;
use crate::error::{RelayError, Result};
use crate::paths::validate_slug;
use crate::types::Stage;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Catalog of agent definitions keyed by name.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, AgentDefinition>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for def in builtin_agents() {
            registry.agents.insert(def.name.clone(), def);
        }
        registry
    }

    /// Builtins plus every `*.md` definition in `dir` (if it exists).
    pub fn with_dir(dir: &Path) -> Result<Self> {
        let mut registry = Self::builtin();
        registry.load_dir(dir)?;
        Ok(registry)
    }

    pub fn register(&mut self, def: AgentDefinition) -> Result<()> {
        validate_slug(&def.name)?;
        if self.agents.contains_key(&def.name) {
            return Err(RelayError::DuplicateAgentName(def.name));
        }
        tracing::debug!(agent = %def.name, output = %def.output, "agent registered");
        self.agents.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&AgentDefinition> {
        self.agents
            .get(name)
            .ok_or_else(|| RelayError::UnknownAgent(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    /// Check a definition against the registry as it stands.
    pub fn validate(&self, def: &AgentDefinition) -> Result<()> {
        let invalid = |reason: String| RelayError::InvalidDefinition {
            agent: def.name.clone(),
            reason,
        };

        let mut seen = HashSet::new();
        for input in &def.inputs {
            if !seen.insert(*input) {
                return Err(invalid(format!("input '{input}' listed more than once")));
            }
            if *input == def.output {
                return Err(invalid(format!("reads its own output '{input}'")));
            }
            if self.producers_of(*input).next().is_none() {
                return Err(invalid(format!("no registered agent produces input '{input}'")));
            }
        }
        Ok(())
    }

    pub fn validate_all(&self) -> Result<()> {
        self.agents.values().try_for_each(|def| self.validate(def))
    }

    pub fn producers_of(&self, stage: Stage) -> impl Iterator<Item = &AgentDefinition> {
        self.agents.values().filter(move |d| d.output == stage)
    }

    /// Sorted by output stage, then name.
    pub fn list(&self) -> Vec<&AgentDefinition> {
        let mut defs: Vec<&AgentDefinition> = self.agents.values().collect();
        defs.sort_by(|a, b| a.output.cmp(&b.output).then_with(|| a.name.cmp(&b.name)));
        defs
    }

    /// Load every `*.md` agent file in `dir`, in file-name order.
    /// A missing directory is not an error.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            return Ok(0);
        }
        let mut files: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
            .collect();
        files.sort();

        for path in &files {
            self.register(AgentDefinition::load(path)?)?;
        }
        Ok(files.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builtin_catalog_is_valid() {
        let registry = AgentRegistry::builtin();
        registry.validate_all().unwrap();
        assert!(registry.contains("interviewer"));
        assert!(registry.contains("browser-qa"));
        assert_eq!(registry.resolve("planner").unwrap().output, Stage::Roadmap);
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut registry = AgentRegistry::builtin();
        let err = registry
            .register(AgentDefinition::new("planner", Stage::Roadmap))
            .unwrap_err();
        assert!(matches!(err, RelayError::DuplicateAgentName(ref n) if n == "planner"));
    }

    #[test]
    fn resolve_unknown_agent() {
        let err = AgentRegistry::builtin().resolve("copywriter").unwrap_err();
        assert!(matches!(err, RelayError::UnknownAgent(_)));
    }

    #[test]
    fn validate_rejects_input_without_producer() {
        let mut registry = AgentRegistry::new();
        let def = AgentDefinition::new("ux-writer", Stage::UxSpecification)
            .with_inputs(&[Stage::Wireframes]);
        registry.register(def.clone()).unwrap();
        let err = registry.validate(&def).unwrap_err();
        assert!(matches!(err, RelayError::InvalidDefinition { .. }));
        assert!(err.to_string().contains("wireframes"));
    }

    #[test]
    fn validate_rejects_self_input() {
        let registry = AgentRegistry::builtin();
        let def = AgentDefinition::new("looper", Stage::Roadmap).with_inputs(&[Stage::Roadmap]);
        assert!(registry.validate(&def).is_err());
    }

    #[test]
    fn register_rejects_bad_name() {
        let mut registry = AgentRegistry::new();
        let err = registry
            .register(AgentDefinition::new("Browser QA", Stage::QaReport))
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidSlug(_)));
    }

    #[test]
    fn list_orders_by_stage() {
        let registry = AgentRegistry::builtin();
        let names: Vec<&str> = registry.list().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"interviewer"));
        assert_eq!(names.last(), Some(&"browser-qa"));
    }

    #[test]
    fn load_dir_adds_project_agents() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("copy-reviewer.md"),
            "---\nname: copy-reviewer\ninputs: [ux-specification]\noutput: qa-report\n---\nReview copy.\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.txt"), "ignored").unwrap();

        let registry = AgentRegistry::with_dir(dir.path()).unwrap();
        assert_eq!(registry.resolve("copy-reviewer").unwrap().persona, "Review copy.");
        registry.validate_all().unwrap();
    }

    #[test]
    fn load_dir_cannot_shadow_builtin() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("planner.md"),
            "---\nname: planner\noutput: roadmap\n---\nMine.\n",
        )
        .unwrap();
        assert!(matches!(
            AgentRegistry::with_dir(dir.path()).unwrap_err(),
            RelayError::DuplicateAgentName(_)
        ));
    }
}
