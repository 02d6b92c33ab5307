use crate::error::{RelayError, Result};
use crate::types::Stage;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const SHARED_DIR: &str = ".shared";
pub const AGENTS_DIR: &str = ".shared/agents";
pub const PRESETS_DIR: &str = ".shared/presets";

pub const CONFIG_FILE: &str = ".shared/config.yaml";
pub const RUN_FILE: &str = ".shared/run.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn shared_dir(root: &Path) -> PathBuf {
    root.join(SHARED_DIR)
}

pub fn artifact_path(root: &Path, stage: Stage) -> PathBuf {
    shared_dir(root).join(stage.filename())
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn run_path(root: &Path) -> PathBuf {
    root.join(RUN_FILE)
}

pub fn agents_dir(root: &Path) -> PathBuf {
    root.join(AGENTS_DIR)
}

pub fn presets_dir(root: &Path) -> PathBuf {
    root.join(PRESETS_DIR)
}

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

/// Agent and preset names share the slug rules.
pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 64 || !slug_re().is_match(slug) {
        return Err(RelayError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_slugs() {
        for slug in ["interviewer", "ui-sketcher", "chrome-extension", "x1"] {
            validate_slug(slug).unwrap_or_else(|_| panic!("expected valid: {slug}"));
        }
    }

    #[test]
    fn invalid_slugs() {
        for slug in ["", "-qa", "qa-", "browser qa", "Planner", "ux_writer"] {
            assert!(validate_slug(slug).is_err(), "expected invalid: {slug}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            artifact_path(root, Stage::FlowDiagrams),
            PathBuf::from("/tmp/proj/.shared/05-flow-diagrams.md")
        );
        assert_eq!(config_path(root), PathBuf::from("/tmp/proj/.shared/config.yaml"));
        assert_eq!(run_path(root), PathBuf::from("/tmp/proj/.shared/run.yaml"));
    }
}
