use crate::error::{RelayError, Result};
use crate::paths;
use crate::types::{RunStatus, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// RunEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    Started { attempt: u32 },
    Succeeded { attempt: u32 },
    Failed { attempt: u32, error: String },
    /// Output already present; nothing dispatched.
    Skipped { reason: String },
    /// Optional agent exhausted its retries.
    Waived { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub stage: Stage,
    #[serde(flatten)]
    pub kind: EventKind,
}

// ---------------------------------------------------------------------------
// RunRecord
// ---------------------------------------------------------------------------

/// The run log at `.shared/run.yaml`: one record per project, rewritten after
/// every transition so `status` and `resume` see the latest state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub preset: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub waived: BTreeSet<Stage>,
    #[serde(default)]
    pub events: Vec<RunEvent>,
}

impl RunRecord {
    pub fn new(preset: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            preset: preset.into(),
            status: RunStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
            failed_agent: None,
            failed_stage: None,
            error: None,
            waived: BTreeSet::new(),
            events: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::run_path(root);
        if !path.exists() {
            return Err(RelayError::NoRunRecord);
        }
        let data = std::fs::read_to_string(&path)?;
        let record: RunRecord = serde_yaml::from_str(&data)?;
        Ok(record)
    }

    pub fn load_optional(root: &Path) -> Result<Option<Self>> {
        match Self::load(root) {
            Ok(r) => Ok(Some(r)),
            Err(RelayError::NoRunRecord) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::run_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    pub fn record(&mut self, agent: &str, stage: Stage, kind: EventKind) {
        self.events.push(RunEvent {
            timestamp: Utc::now(),
            agent: agent.to_string(),
            stage,
            kind,
        });
    }

    /// Reopen a finished record for `resume`; the history is kept.
    pub fn reopen(&mut self) {
        self.status = RunStatus::Pending;
        self.finished_at = None;
        self.failed_agent = None;
        self.failed_stage = None;
        self.error = None;
    }

    pub fn start(&mut self) {
        self.status = RunStatus::Running;
    }

    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, agent: &str, stage: Stage, error: impl Into<String>) {
        self.failed_agent = Some(agent.to_string());
        self.failed_stage = Some(stage);
        self.error = Some(error.into());
        self.finish(RunStatus::Failed);
    }

    /// Attempts recorded for `agent` in this run.
    pub fn attempts(&self, agent: &str) -> u32 {
        self.events
            .iter()
            .filter(|e| e.agent == agent && matches!(e.kind, EventKind::Started { .. }))
            .count() as u32
    }

    /// The agent that produced or waived `stage` most recently, if recorded.
    pub fn last_event_for(&self, stage: Stage) -> Option<&RunEvent> {
        self.events.iter().rev().find(|e| e.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_record_is_no_run() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            RunRecord::load(dir.path()).unwrap_err(),
            RelayError::NoRunRecord
        ));
        assert!(RunRecord::load_optional(dir.path()).unwrap().is_none());
    }

    #[test]
    fn save_and_reload_with_events() {
        let dir = TempDir::new().unwrap();
        let mut run = RunRecord::new("webapp");
        run.start();
        run.record("interviewer", Stage::Requirements, EventKind::Started { attempt: 1 });
        run.record(
            "interviewer",
            Stage::Requirements,
            EventKind::Failed {
                attempt: 1,
                error: "exited with code 1".into(),
            },
        );
        run.fail("interviewer", Stage::Requirements, "gave up");
        run.save(dir.path()).unwrap();

        let text = std::fs::read_to_string(paths::run_path(dir.path())).unwrap();
        assert!(text.contains("kind: failed"));
        assert!(text.contains("status: failed"));

        let loaded = RunRecord::load(dir.path()).unwrap();
        assert_eq!(loaded.id, run.id);
        assert_eq!(loaded.status, RunStatus::Failed);
        assert_eq!(loaded.failed_stage, Some(Stage::Requirements));
        assert_eq!(loaded.events.len(), 2);
        assert_eq!(loaded.attempts("interviewer"), 1);
        assert!(loaded.finished_at.is_some());
    }

    #[test]
    fn reopen_clears_failure() {
        let mut run = RunRecord::new("webapp");
        run.fail("planner", Stage::Roadmap, "boom");
        run.reopen();
        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.failed_agent.is_none());
        assert!(run.error.is_none());
    }
}
