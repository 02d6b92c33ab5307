//! Workflow presets: named, data-driven selections of agents into phases.
//!
//! ```yaml
//! name: mobile-web
//! description: Mobile-first PWA
//! extends: webapp              # optional: inherit phases and checks
//! substitutions:
//!   ui-sketcher: mobile-ui-sketcher
//! checks:
//!   - stage: tech-architecture
//!     contains: [service worker, manifest]
//! ```

use crate::error::{RelayError, Result};
use crate::graph::DependencyGraph;
use crate::paths::validate_slug;
use crate::registry::AgentRegistry;
use crate::types::{PhaseMode, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// PhaseDef
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseDef {
    #[serde(default)]
    pub mode: PhaseMode,
    pub agents: Vec<String>,
}

impl PhaseDef {
    pub fn sequential(agents: &[&str]) -> Self {
        Self {
            mode: PhaseMode::Sequential,
            agents: agents.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn parallel(agents: &[&str]) -> Self {
        Self {
            mode: PhaseMode::Parallel,
            agents: agents.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Artifact checks (per-preset validator hook)
// ---------------------------------------------------------------------------

/// Validates an agent's output before it is stored. A rejection is treated
/// as a retryable executor failure.
pub trait ArtifactValidator: Send + Sync {
    fn validate(&self, stage: Stage, content: &str) -> std::result::Result<(), String>;
}

/// Declarative check: the artifact for `stage` must mention every needle
/// (case-insensitive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactCheck {
    pub stage: Stage,
    pub contains: Vec<String>,
}

impl ArtifactValidator for ArtifactCheck {
    fn validate(&self, stage: Stage, content: &str) -> std::result::Result<(), String> {
        if stage != self.stage {
            return Ok(());
        }
        let haystack = content.to_lowercase();
        let missing: Vec<&str> = self
            .contains
            .iter()
            .filter(|needle| !haystack.contains(&needle.to_lowercase()))
            .map(|s| s.as_str())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "{} must mention: {}",
                stage.filename(),
                missing.join(", ")
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowPreset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPreset {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default)]
    pub phases: Vec<PhaseDef>,
    /// Original agent → replacement filling the same output slot.
    #[serde(default)]
    pub substitutions: BTreeMap<String, String>,
    #[serde(default)]
    pub checks: Vec<ArtifactCheck>,
}

impl WorkflowPreset {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            extends: None,
            phases: Vec::new(),
            substitutions: BTreeMap::new(),
            checks: Vec::new(),
        }
    }

    /// The eight-stage skeleton every built-in preset shares.
    pub fn standard(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description)
            .phase(PhaseDef::sequential(&["interviewer", "ui-sketcher", "ux-writer"]))
            .phase(PhaseDef::parallel(&[
                "client-tech-architect",
                "mermaid-designer",
                "interactive-designer",
            ]))
            .phase(PhaseDef::sequential(&["planner", "browser-qa"]))
    }

    pub fn phase(mut self, phase: PhaseDef) -> Self {
        self.phases.push(phase);
        self
    }

    pub fn substitute(mut self, original: &str, replacement: &str) -> Self {
        self.substitutions
            .insert(original.to_string(), replacement.to_string());
        self
    }

    pub fn check(mut self, stage: Stage, contains: &[&str]) -> Self {
        self.checks.push(ArtifactCheck {
            stage,
            contains: contains.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// The concrete agent filling `name`'s slot after substitutions.
    pub fn effective<'a>(&'a self, name: &'a str) -> &'a str {
        self.substitutions
            .get(name)
            .map(|s| s.as_str())
            .unwrap_or(name)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }

    /// Merge `self` over `base`: phases are inherited when `self` declares
    /// none, substitutions are overlaid, checks are concatenated.
    fn merged_over(self, base: &WorkflowPreset) -> WorkflowPreset {
        let mut substitutions = base.substitutions.clone();
        substitutions.extend(self.substitutions);
        let mut checks = base.checks.clone();
        checks.extend(self.checks);
        WorkflowPreset {
            name: self.name,
            description: self.description,
            extends: self.extends,
            phases: if self.phases.is_empty() {
                base.phases.clone()
            } else {
                self.phases
            },
            substitutions,
            checks,
        }
    }
}

// ---------------------------------------------------------------------------
// Built-in presets
// ---------------------------------------------------------------------------

pub fn builtin_presets() -> Vec<WorkflowPreset> {
    vec![
        WorkflowPreset::standard("webapp", "Generic responsive web application"),
        WorkflowPreset::standard("tauri-app", "Tauri desktop and mobile application")
            .substitute("client-tech-architect", "tauri-architect")
            .check(Stage::TechArchitecture, &["capabilities"]),
        WorkflowPreset::standard("chrome-extension", "Chrome extension (Manifest V3)")
            .substitute("ui-sketcher", "extension-ui-sketcher")
            .substitute("client-tech-architect", "extension-architect")
            .check(Stage::TechArchitecture, &["permissions"]),
        WorkflowPreset::standard("mobile-web", "Mobile-first progressive web app")
            .substitute("ui-sketcher", "mobile-ui-sketcher")
            .substitute("client-tech-architect", "pwa-architect")
            .substitute("interactive-designer", "mobile-interaction-designer")
            .check(Stage::TechArchitecture, &["service worker", "manifest"]),
    ]
}

// ---------------------------------------------------------------------------
// PresetRegistry
// ---------------------------------------------------------------------------

/// Presets by name, stored with `extends` already resolved.
#[derive(Debug, Clone, Default)]
pub struct PresetRegistry {
    presets: BTreeMap<String, WorkflowPreset>,
}

impl PresetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for preset in builtin_presets() {
            registry.presets.insert(preset.name.clone(), preset);
        }
        registry
    }

    /// Builtins plus every `*.yaml` preset in `dir`, validated against `agents`.
    pub fn with_dir(dir: &Path, agents: &AgentRegistry) -> Result<Self> {
        let mut registry = Self::builtin();
        registry.load_dir(dir, agents)?;
        Ok(registry)
    }

    /// Resolve `extends`, validate by building the dependency graph, then store.
    pub fn register(&mut self, preset: WorkflowPreset, agents: &AgentRegistry) -> Result<()> {
        validate_slug(&preset.name)?;
        if self.presets.contains_key(&preset.name) {
            return Err(RelayError::DuplicatePreset(preset.name));
        }
        let resolved = match preset.extends.clone() {
            Some(base) => {
                let base = self.resolve(&base)?;
                preset.merged_over(base)
            }
            None => preset,
        };
        DependencyGraph::build(&resolved, agents)?;
        tracing::debug!(preset = %resolved.name, "preset registered");
        self.presets.insert(resolved.name.clone(), resolved);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&WorkflowPreset> {
        self.presets
            .get(name)
            .ok_or_else(|| RelayError::UnknownPreset(name.to_string()))
    }

    /// Validated dependency graph for the named preset.
    pub fn graph(&self, name: &str, agents: &AgentRegistry) -> Result<DependencyGraph> {
        DependencyGraph::build(self.resolve(name)?, agents)
    }

    pub fn list(&self) -> Vec<&WorkflowPreset> {
        self.presets.values().collect()
    }

    /// Register every `*.yaml` preset in `dir`. A preset is registered after
    /// the preset it extends when both live in `dir`.
    pub fn load_dir(&mut self, dir: &Path, agents: &AgentRegistry) -> Result<usize> {
        if !dir.is_dir() {
            return Ok(0);
        }
        let mut files: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .is_some_and(|ext| ext == "yaml" || ext == "yml")
            })
            .collect();
        files.sort();

        let mut pending = files
            .iter()
            .map(|p| WorkflowPreset::load(p))
            .collect::<Result<Vec<_>>>()?;
        let count = pending.len();
        while !pending.is_empty() {
            // With no base available (missing or cyclic), register the first
            // so it reports the unknown base.
            let next = pending
                .iter()
                .position(|p| match &p.extends {
                    Some(base) => {
                        self.presets.contains_key(base)
                            || !pending.iter().any(|q| &q.name == base)
                    }
                    None => true,
                })
                .unwrap_or(0);
            let preset = pending.remove(next);
            self.register(preset, agents)?;
        }
        Ok(count)
    }
}
