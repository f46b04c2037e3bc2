use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::WorkspaceError;

/// Directories and lockfiles never shown to the model.
const IGNORED_NAMES: &[&str] = &[
    ".git",
    "__pycache__",
    "venv",
    "env",
    ".venv",
    "node_modules",
    "target",
    ".idea",
    ".vscode",
    "pnpm-lock.yaml",
    "yarn.lock",
    "package-lock.json",
];

/// File extensions worth listing in the prompt.
const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "tsx", "jsx", "rs", "go", "html", "css", "md", "txt", "json", "toml", "yaml",
    "yml",
];

/// Resolve `relative` under `root`, rejecting absolute paths and `..` components.
pub fn resolve_in_workspace(root: &Path, relative: &str) -> Result<PathBuf, WorkspaceError> {
    let candidate = Path::new(relative.trim());
    let confined = !candidate.as_os_str().is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !confined {
        return Err(WorkspaceError::PathOutsideWorkspace {
            path: relative.to_string(),
        });
    }
    Ok(root.join(candidate))
}

/// Read a workspace file for the model. Failures come back as text, never as an error.
pub async fn read_workspace_file(root: &Path, relative: &str) -> String {
    let path = match resolve_in_workspace(root, relative) {
        Ok(path) => path,
        Err(e) => return format!("Error reading file: {}", e),
    };
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) => format!("Error reading file: {}: {}", relative, e),
    }
}

/// Relative paths of code files under `root`, sorted, one per line.
pub fn list_repo_files(root: &Path) -> String {
    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !IGNORED_NAMES
                    .iter()
                    .any(|name| entry.file_name() == std::ffi::OsStr::new(name))
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| CODE_EXTENSIONS.contains(&ext))
        })
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files.join("\n")
}

/// [`list_repo_files`] on the blocking pool. A failed walk yields an empty listing.
pub async fn scan_repo_files(root: &Path) -> String {
    let root = root.to_path_buf();
    match tokio::task::spawn_blocking(move || list_repo_files(&root)).await {
        Ok(listing) => listing,
        Err(e) => {
            tracing::warn!(error = %e, "repository listing task failed");
            String::new()
        }
    }
}

/// Recursively delete `path`, clearing read-only attributes if the first attempt fails.
///
/// Git object files are created read-only, which makes a plain removal fail on
/// Windows. A missing directory is not an error.
pub fn force_remove_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        return Ok(());
    }
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(first) => {
            tracing::debug!(path = %path.display(), error = %first, "retrying removal after clearing read-only flags");
            clear_readonly(path);
            std::fs::remove_dir_all(path)
        }
    }
}

#[allow(clippy::permissions_set_readonly_false)]
fn clear_readonly(path: &Path) {
    for entry in WalkDir::new(path).into_iter().filter_map(Result::ok) {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let mut permissions = metadata.permissions();
        if permissions.readonly() {
            permissions.set_readonly(false);
            if let Err(e) = std::fs::set_permissions(entry.path(), permissions) {
                tracing::debug!(path = %entry.path().display(), error = %e, "could not clear read-only flag");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_accepts_nested_relative_path() {
        let root = Path::new("/ws/run");
        let resolved = resolve_in_workspace(root, "src/app.ts").unwrap();
        assert_eq!(resolved, PathBuf::from("/ws/run/src/app.ts"));
        assert!(resolve_in_workspace(root, "./README.md").is_ok());
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let root = Path::new("/ws/run");
        for bad in ["../secret", "/etc/passwd", "src/../../x", ""] {
            assert!(
                matches!(
                    resolve_in_workspace(root, bad),
                    Err(WorkspaceError::PathOutsideWorkspace { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_read_workspace_file_returns_content_or_error_text() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        assert_eq!(read_workspace_file(dir.path(), "a.txt").await, "hello");
        for bad in ["missing.txt", "../a.txt"] {
            let content = read_workspace_file(dir.path(), bad).await;
            assert!(content.starts_with("Error reading file"), "{content}");
        }
    }

    #[test]
    fn test_list_repo_files_filters_ignored_and_non_code() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/components")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("src/components/Button.tsx"), "").unwrap();
        fs::write(root.join("src/main.ts"), "").unwrap();
        fs::write(root.join("README.md"), "").unwrap();
        fs::write(root.join("logo.png"), "").unwrap();
        fs::write(root.join("package-lock.json"), "{}").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "").unwrap();
        fs::write(root.join(".git/config.json"), "").unwrap();

        let listing = list_repo_files(root);
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(
            lines,
            vec!["README.md", "src/components/Button.tsx", "src/main.ts"]
        );
    }

    #[tokio::test]
    async fn test_scan_repo_files_matches_direct_listing() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        fs::write(dir.path().join("Cargo.toml"), "").unwrap();

        let listing = scan_repo_files(dir.path()).await;
        assert_eq!(listing, "Cargo.toml\nsrc/lib.rs");
        assert_eq!(listing, list_repo_files(dir.path()));
    }

    #[test]
    fn test_force_remove_dir_handles_readonly_entries() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("run");
        fs::create_dir_all(target.join("objects/ab")).unwrap();
        let file = target.join("objects/ab/cdef");
        fs::write(&file, "blob").unwrap();
        let mut perms = fs::metadata(&file).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&file, perms).unwrap();

        force_remove_dir(&target).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn test_force_remove_dir_missing_is_ok() {
        let dir = tempdir().unwrap();
        force_remove_dir(&dir.path().join("never-created")).unwrap();
    }
}
