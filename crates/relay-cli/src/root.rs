use std::path::{Path, PathBuf};

/// Resolve the project directory.
///
/// Priority:
/// 1. positional project argument, `--root`, or `RELAY_ROOT` (passed in as `explicit`)
/// 2. nearest ancestor of `cwd` containing `.shared/`
/// 3. nearest ancestor of `cwd` containing `.git/`
/// 4. `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    detect_from(&cwd)
}

fn detect_from(start: &Path) -> PathBuf {
    for marker in [".shared", ".git"] {
        if let Some(dir) = start.ancestors().find(|d| d.join(marker).is_dir()) {
            return dir.to_path_buf();
        }
    }
    start.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_root(Some(dir.path())), dir.path());
    }

    #[test]
    fn finds_shared_dir_above_cwd() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".shared")).unwrap();
        let deep = dir.path().join("src/deep");
        std::fs::create_dir_all(&deep).unwrap();
        assert_eq!(detect_from(&deep), dir.path());
    }

    #[test]
    fn shared_beats_git() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let app = dir.path().join("app");
        std::fs::create_dir_all(app.join(".shared")).unwrap();
        assert_eq!(detect_from(&app.join("src")), app);
    }

    #[test]
    fn falls_back_to_start() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("plain");
        std::fs::create_dir_all(&plain).unwrap();
        // The temp dir itself may live under a git checkout; only assert
        // when it does not.
        if !plain.ancestors().any(|d| d.join(".git").is_dir() || d.join(".shared").is_dir()) {
            assert_eq!(detect_from(&plain), plain);
        }
    }
}
