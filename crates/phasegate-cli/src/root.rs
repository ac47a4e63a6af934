use phasegate_core::paths::PHASEGATE_DIR;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` / `PHASEGATE_ROOT` (passed in as `explicit`)
/// 2. Nearest ancestor of `cwd` containing `.phasegate/`
/// 3. Nearest ancestor of `cwd` containing `.git/`
/// 4. `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_root(&cwd)
}

fn find_root(start: &Path) -> PathBuf {
    [PHASEGATE_DIR, ".git"]
        .iter()
        .find_map(|marker| nearest_with(start, marker))
        .unwrap_or_else(|| start.to_path_buf())
}

fn nearest_with(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
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
    fn phasegate_dir_beats_git() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("repo/project");
        std::fs::create_dir_all(dir.path().join("repo/.git")).unwrap();
        std::fs::create_dir_all(project.join(PHASEGATE_DIR)).unwrap();
        let deep = project.join("src/deep");
        std::fs::create_dir_all(&deep).unwrap();

        assert_eq!(find_root(&deep), project);
    }

    #[test]
    fn falls_back_to_git_then_start() {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(repo.join(".git")).unwrap();
        std::fs::create_dir_all(repo.join("a/b")).unwrap();
        assert_eq!(find_root(&repo.join("a/b")), repo);

        let bare = dir.path().join("bare");
        std::fs::create_dir_all(&bare).unwrap();
        // TempDir lives under /tmp, which has no .git above it in CI images.
        let found = find_root(&bare);
        assert!(found == bare || found.join(".git").is_dir() || found.join(PHASEGATE_DIR).is_dir());
    }
}
