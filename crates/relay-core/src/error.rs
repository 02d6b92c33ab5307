use crate::types::Stage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("artifact already exists: {0} (pass an explicit overwrite for a clean re-run)")]
    DuplicateArtifact(Stage),

    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("agent already registered: {0}")]
    DuplicateAgentName(String),

    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    #[error("preset already registered: {0}")]
    DuplicatePreset(String),

    #[error("invalid definition for '{agent}': {reason}")]
    InvalidDefinition { agent: String, reason: String },

    #[error("dependency cycle detected among agents: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),

    #[error("invalid parallel group in phase {phase}: {reason}")]
    InvalidParallelGroup { phase: usize, reason: String },

    #[error("agent '{agent}' failed at stage {stage} after {attempts} attempt(s): {message}")]
    ExecutorFailure {
        agent: String,
        stage: Stage,
        attempts: u32,
        message: String,
    },

    #[error("agent '{agent}' dispatched with missing inputs: {}", .missing.join(", "))]
    MissingRequiredInput { agent: String, missing: Vec<String> },

    #[error("invalid stage '{0}': expected one of requirements, wireframes, ux-specification, tech-architecture, flow-diagrams, animations, roadmap, qa-report")]
    InvalidStage(String),

    #[error("invalid name '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("no run recorded for this project: start one with 'relay run <preset>'")]
    NoRunRecord,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
