use crate::types::Stage;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Front matter
// ---------------------------------------------------------------------------

const DELIM: &str = "---\n";

/// Split `---\n<yaml>---\n<body>` into its YAML block and body.
///
/// The closing delimiter must start a line. Returns `None` when the text does
/// not open with a delimiter or the block is never closed.
pub fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix(DELIM)?;
    if let Some(body) = rest.strip_prefix(DELIM) {
        return Some(("", body));
    }
    let end = rest.find("\n---\n")?;
    Some((&rest[..end + 1], &rest[end + 5..]))
}

/// Parse a front-matter document into `(header, body)`. Text without a
/// well-formed header yields `None` for the header and the whole text as body.
pub fn parse_front_matter<T: DeserializeOwned>(text: &str) -> (Option<T>, &str) {
    match split_front_matter(text) {
        Some((yaml, body)) => match serde_yaml::from_str::<T>(yaml) {
            Ok(header) => (Some(header), body),
            Err(_) => (None, text),
        },
        None => (None, text),
    }
}

pub fn render_front_matter<T: Serialize>(
    header: &T,
    body: &str,
) -> Result<String, serde_yaml::Error> {
    let yaml = serde_yaml::to_string(header)?;
    Ok(format!("{DELIM}{yaml}{DELIM}{body}"))
}

// ---------------------------------------------------------------------------
// ArtifactMeta
// ---------------------------------------------------------------------------

/// Provenance block written at the top of every artifact file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// File names of the artifacts consumed to produce this one.
    #[serde(default)]
    pub inputs: Vec<String>,
}

impl ArtifactMeta {
    pub fn produced_by(agent: impl Into<String>, inputs: &[Stage]) -> Self {
        Self {
            agent: Some(agent.into()),
            created_at: Some(Utc::now()),
            inputs: inputs.iter().map(|s| s.filename()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Artifact {
    pub stage: Stage,
    pub path: PathBuf,
    pub meta: ArtifactMeta,
    pub content: String,
}

impl Artifact {
    /// Parse an artifact file. Hand-written files without a provenance block
    /// are accepted with empty metadata.
    pub fn parse(stage: Stage, path: PathBuf, text: &str) -> Self {
        let (meta, body) = parse_front_matter::<ArtifactMeta>(text);
        Self {
            stage,
            path,
            meta: meta.unwrap_or_default(),
            content: body.to_string(),
        }
    }

    pub fn render(meta: &ArtifactMeta, content: &str) -> Result<String, serde_yaml::Error> {
        render_front_matter(meta, content)
    }

    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            stage: self.stage,
            number: self.stage.number(),
            filename: self.stage.filename(),
            agent: self.meta.agent.clone(),
            created_at: self.meta.created_at,
            inputs: self.meta.inputs.clone(),
            bytes: self.content.len(),
        }
    }
}

/// Listing entry returned by `ArtifactStore::list`.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub stage: Stage,
    pub number: u8,
    pub filename: String,
    pub agent: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub inputs: Vec<String>,
    pub bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_then_parse_preserves_body() {
        let meta = ArtifactMeta::produced_by("ux-writer", &[Stage::Requirements, Stage::Wireframes]);
        let body = "# UX Specification\n\n---\n\nMicrocopy table\n";
        let text = Artifact::render(&meta, body).unwrap();
        assert!(text.starts_with("---\nagent: ux-writer\n"));

        let parsed = Artifact::parse(Stage::UxSpecification, PathBuf::from("x"), &text);
        assert_eq!(parsed.content, body);
        assert_eq!(parsed.meta.agent.as_deref(), Some("ux-writer"));
        assert_eq!(
            parsed.meta.inputs,
            vec!["01-requirements.md".to_string(), "02-wireframes.md".to_string()]
        );
    }

    #[test]
    fn hand_written_artifact_has_empty_meta() {
        let text = "# Requirements\n\nJust notes.\n";
        let parsed = Artifact::parse(Stage::Requirements, PathBuf::from("x"), text);
        assert_eq!(parsed.meta, ArtifactMeta::default());
        assert_eq!(parsed.content, text);
    }

    #[test]
    fn unclosed_front_matter_is_body() {
        let text = "---\nagent: planner\n# no closing delimiter\n";
        assert!(split_front_matter(text).is_none());
        let parsed = Artifact::parse(Stage::Roadmap, PathBuf::from("x"), text);
        assert_eq!(parsed.content, text);
    }

    #[test]
    fn empty_body_round_trips() {
        let meta = ArtifactMeta::produced_by("planner", &[]);
        let text = Artifact::render(&meta, "").unwrap();
        let parsed = Artifact::parse(Stage::Roadmap, PathBuf::from("x"), &text);
        assert_eq!(parsed.content, "");
    }
}
