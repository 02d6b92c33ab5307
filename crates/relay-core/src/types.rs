use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One of the eight fixed artifact slots in `.shared/`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Requirements,
    Wireframes,
    UxSpecification,
    TechArchitecture,
    FlowDiagrams,
    Animations,
    Roadmap,
    QaReport,
}

impl Stage {
    pub fn all() -> &'static [Stage] {
        &[
            Stage::Requirements,
            Stage::Wireframes,
            Stage::UxSpecification,
            Stage::TechArchitecture,
            Stage::FlowDiagrams,
            Stage::Animations,
            Stage::Roadmap,
            Stage::QaReport,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// 1-based stage number used in file names.
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn from_number(n: u8) -> Option<Stage> {
        Stage::all().get((n as usize).checked_sub(1)?).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Requirements => "requirements",
            Stage::Wireframes => "wireframes",
            Stage::UxSpecification => "ux-specification",
            Stage::TechArchitecture => "tech-architecture",
            Stage::FlowDiagrams => "flow-diagrams",
            Stage::Animations => "animations",
            Stage::Roadmap => "roadmap",
            Stage::QaReport => "qa-report",
        }
    }

    /// `NN-slug.md`, e.g. `04-tech-architecture.md`.
    pub fn filename(self) -> String {
        format!("{:02}-{}.md", self.number(), self.as_str())
    }

    /// Parse a file name of the form `NN-slug.md`. The number must match the slug.
    pub fn from_filename(name: &str) -> Option<Stage> {
        let stem = name.strip_suffix(".md")?;
        let (num, slug) = stem.split_once('-')?;
        let stage = Stage::from_number(num.parse().ok()?)?;
        (num.len() == 2 && stage.as_str() == slug).then_some(stage)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = crate::error::RelayError;

    /// Accepts a slug (`roadmap`), a file name (`07-roadmap.md`), a file stem
    /// (`07-roadmap`) or a bare number (`7`, `07`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(stage) = Stage::all().iter().find(|st| st.as_str() == s) {
            return Ok(*stage);
        }
        if let Some(stage) = Stage::from_filename(s) {
            return Ok(stage);
        }
        if let Some(stage) = Stage::from_filename(&format!("{s}.md")) {
            return Ok(stage);
        }
        s.parse::<u8>()
            .ok()
            .and_then(Stage::from_number)
            .ok_or_else(|| crate::error::RelayError::InvalidStage(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// PhaseMode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseMode {
    #[default]
    Sequential,
    Parallel,
}

impl fmt::Display for PhaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PhaseMode::Sequential => "sequential",
            PhaseMode::Parallel => "parallel",
        })
    }
}

// ---------------------------------------------------------------------------
// RunStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Aborted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Aborted => "aborted",
        };
        f.write_str(s)
    }
}
