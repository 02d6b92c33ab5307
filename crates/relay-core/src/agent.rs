use crate::artifact::{render_front_matter, split_front_matter};
use crate::error::{RelayError, Result};
use crate::types::Stage;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// AgentDefinition
// ---------------------------------------------------------------------------

/// A named unit of work: reads `inputs`, writes exactly one `output` stage.
///
/// `persona` and the `must`/`must_not` lists are opaque payload handed to the
/// executor verbatim; the orchestrator never interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inputs: Vec<Stage>,
    pub output: Stage,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub persona: String,
    #[serde(default)]
    pub must: Vec<String>,
    #[serde(default)]
    pub must_not: Vec<String>,
    /// When set, exhausting retries waives the output stage instead of failing the run.
    #[serde(default)]
    pub optional: bool,
}

/// Front matter of an agent markdown file; the body becomes the persona.
#[derive(Debug, Serialize, Deserialize)]
struct AgentHeader {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    inputs: Vec<Stage>,
    output: Stage,
    #[serde(default)]
    must: Vec<String>,
    #[serde(default)]
    must_not: Vec<String>,
    #[serde(default)]
    optional: bool,
}

impl AgentDefinition {
    pub fn new(name: impl Into<String>, output: Stage) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            inputs: Vec::new(),
            output,
            persona: String::new(),
            must: Vec::new(),
            must_not: Vec::new(),
            optional: false,
        }
    }

    pub fn with_inputs(mut self, inputs: &[Stage]) -> Self {
        self.inputs = inputs.to_vec();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_rules(mut self, must: &[&str], must_not: &[&str]) -> Self {
        self.must = must.iter().map(|s| s.to_string()).collect();
        self.must_not = must_not.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Parse an `AGENT.md`-style file: YAML header plus persona body.
    pub fn from_markdown(text: &str) -> Result<Self> {
        let (yaml, body) = split_front_matter(text).ok_or_else(|| RelayError::InvalidDefinition {
            agent: "<unnamed>".to_string(),
            reason: "missing front matter block".to_string(),
        })?;
        let header: AgentHeader =
            serde_yaml::from_str(yaml).map_err(|e| RelayError::InvalidDefinition {
                agent: "<unnamed>".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            name: header.name,
            description: header.description,
            inputs: header.inputs,
            output: header.output,
            persona: body.trim().to_string(),
            must: header.must,
            must_not: header.must_not,
            optional: header.optional,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_markdown(&text).map_err(|e| match e {
            RelayError::InvalidDefinition { reason, .. } => RelayError::InvalidDefinition {
                agent: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    pub fn to_markdown(&self) -> Result<String> {
        let header = AgentHeader {
            name: self.name.clone(),
            description: self.description.clone(),
            inputs: self.inputs.clone(),
            output: self.output,
            must: self.must.clone(),
            must_not: self.must_not.clone(),
            optional: self.optional,
        };
        let body = format!("\n{}\n", self.persona);
        Ok(render_front_matter(&header, &body)?)
    }
}
