//! Disposable repository clones, one per pipeline run.
//!
//! | Module  | Responsibility                                              |
//! |---------|-------------------------------------------------------------|
//! | `git`   | `WorkspaceManager` / `WorkspaceSession` on top of `git2`     |
//! | `files` | Path confinement, file listing, forced directory removal     |

pub mod files;
pub mod git;

pub use files::{force_remove_dir, read_workspace_file, resolve_in_workspace, scan_repo_files};
pub use git::{WorkspaceManager, WorkspaceSession};

/// Branch name for a ticket: `prefix` followed by the last five characters of its id.
pub fn branch_name_for(prefix: &str, ticket_id: &str) -> String {
    let chars: Vec<char> = ticket_id.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(5)..].iter().collect();
    format!("{}{}", prefix, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_name_uses_last_five_chars() {
        assert_eq!(
            branch_name_for("feature/ticket-", "691d9d7f9faff31f3cc13819"),
            "feature/ticket-13819"
        );
    }

    #[test]
    fn test_branch_name_short_id() {
        assert_eq!(branch_name_for("fix-", "abc"), "fix-abc");
    }
}
