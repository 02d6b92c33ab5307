//! File-backed artifact store over `{project}/.shared/`.
//!
//! Each stage has exactly one slot (`NN-slug.md`). Slots are write-once: a
//! second `put` for the same stage fails with `DuplicateArtifact` unless the
//! store was opened for a clean re-run with [`ArtifactStore::with_overwrite`].

use crate::artifact::{Artifact, ArtifactMeta, ArtifactSummary};
use crate::error::{RelayError, Result};
use crate::{io, paths, types::Stage};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct ArtifactStore {
    root: PathBuf,
    overwrite: bool,
    /// One writer at a time per stage slot.
    locks: [Mutex<()>; 8],
}

impl ArtifactStore {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            overwrite: false,
            locks: std::array::from_fn(|_| Mutex::new(())),
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self) -> PathBuf {
        paths::shared_dir(&self.root)
    }

    pub fn path(&self, stage: Stage) -> PathBuf {
        paths::artifact_path(&self.root, stage)
    }

    pub fn put(&self, stage: Stage, meta: &ArtifactMeta, content: &str) -> Result<Artifact> {
        let _guard = self.locks[stage.index()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let path = self.path(stage);
        let text = Artifact::render(meta, content)?;
        if self.overwrite {
            io::atomic_write(&path, text.as_bytes())?;
        } else if !io::atomic_create(&path, text.as_bytes())? {
            return Err(RelayError::DuplicateArtifact(stage));
        }

        tracing::debug!(stage = %stage, path = %path.display(), "artifact written");
        Ok(Artifact {
            stage,
            path,
            meta: meta.clone(),
            content: content.to_string(),
        })
    }

    pub fn get(&self, stage: Stage) -> Result<Artifact> {
        let path = self.path(stage);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RelayError::ArtifactNotFound(stage.filename()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Artifact::parse(stage, path, &text))
    }

    pub fn exists(&self, stage: Stage) -> bool {
        self.path(stage).is_file()
    }

    /// Stages whose artifact is currently on disk.
    pub fn present(&self) -> BTreeSet<Stage> {
        Stage::all()
            .iter()
            .copied()
            .filter(|s| self.exists(*s))
            .collect()
    }

    /// Present artifacts ordered by stage number. Read-only; safe to call repeatedly.
    pub fn list(&self) -> Result<Vec<ArtifactSummary>> {
        let mut out = Vec::new();
        for &stage in Stage::all() {
            if self.exists(stage) {
                out.push(self.get(stage)?.summary());
            }
        }
        Ok(out)
    }

    /// Delete every stage artifact. Used for a clean re-run. Returns the count removed.
    pub fn remove_all(&self) -> Result<usize> {
        let mut removed = 0;
        for &stage in Stage::all() {
            let _guard = self.locks[stage.index()]
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let path = self.path(stage);
            if path.is_file() {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn meta(agent: &str) -> ArtifactMeta {
        ArtifactMeta::produced_by(agent, &[])
    }

    #[test]
    fn put_then_get_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path());
        let body = "# Requirements\n\n- offline mode\n- 日本語 copy\n\n";
        store.put(Stage::Requirements, &meta("interviewer"), body).unwrap();

        let got = store.get(Stage::Requirements).unwrap();
        assert_eq!(got.content.as_bytes(), body.as_bytes());
        assert_eq!(got.meta.agent.as_deref(), Some("interviewer"));
        assert!(dir.path().join(".shared/01-requirements.md").is_file());
    }

    #[test]
    fn second_put_is_duplicate() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path());
        store.put(Stage::Wireframes, &meta("ui-sketcher"), "v1").unwrap();
        let err = store.put(Stage::Wireframes, &meta("ui-sketcher"), "v2").unwrap_err();
        assert!(matches!(err, RelayError::DuplicateArtifact(Stage::Wireframes)));
        assert_eq!(store.get(Stage::Wireframes).unwrap().content, "v1");
    }

    #[test]
    fn overwrite_store_replaces() {
        let dir = TempDir::new().unwrap();
        ArtifactStore::open(dir.path())
            .put(Stage::Roadmap, &meta("planner"), "old")
            .unwrap();
        let store = ArtifactStore::open(dir.path()).with_overwrite(true);
        store.put(Stage::Roadmap, &meta("planner"), "new").unwrap();
        assert_eq!(store.get(Stage::Roadmap).unwrap().content, "new");
    }

    #[test]
    fn get_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path());
        assert!(!store.exists(Stage::QaReport));
        let err = store.get(Stage::QaReport).unwrap_err();
        assert!(matches!(err, RelayError::ArtifactNotFound(ref f) if f == "08-qa-report.md"));
    }

    #[test]
    fn list_is_ordered_and_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path());
        store.put(Stage::Roadmap, &meta("planner"), "r").unwrap();
        store.put(Stage::Requirements, &meta("interviewer"), "q").unwrap();
        std::fs::write(dir.path().join(".shared/notes.md"), "scratch").unwrap();

        let first = store.list().unwrap();
        let second = store.list().unwrap();
        let stages: Vec<Stage> = first.iter().map(|s| s.stage).collect();
        assert_eq!(stages, vec![Stage::Requirements, Stage::Roadmap]);
        assert_eq!(second.len(), first.len());
    }

    #[test]
    fn remove_all_clears_slots() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path());
        store.put(Stage::Requirements, &meta("interviewer"), "q").unwrap();
        store.put(Stage::Wireframes, &meta("ui-sketcher"), "w").unwrap();
        assert_eq!(store.remove_all().unwrap(), 2);
        assert!(store.present().is_empty());
    }

    #[test]
    fn concurrent_puts_admit_one_writer() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ArtifactStore::open(dir.path()));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .put(Stage::FlowDiagrams, &meta("mermaid-designer"), &format!("v{i}"))
                        .is_ok()
                })
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
    }
}
