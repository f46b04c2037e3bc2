//! Typed error hierarchy for cardsmith.
//!
//! - `TransportError`: a ticketing, hosting or model HTTP call failed
//! - `WorkspaceError`: clone, branch, commit, push or workspace file I/O failed
//! - `PipelineError`: everything that can end a pipeline run early
//!
//! Patch-level failures (`ParseError`, `PatchMismatch`) live in `cardsmith-patch`.

use std::path::PathBuf;

use cardsmith_patch::ParseError;
use thiserror::Error;

/// Errors from the external HTTP collaborators.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{service} request failed: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} response could not be decoded: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

/// Errors from the repository workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Failed to clone {url}: {source}")]
    Clone {
        url: String,
        #[source]
        source: git2::Error,
    },

    #[error("Branch {name} already exists")]
    BranchExists { name: String },

    #[error("Nothing to commit: staged files match HEAD")]
    NothingToCommit,

    #[error("Push of {branch} rejected by remote: {reason}")]
    PushRejected { branch: String, reason: String },

    #[error("Path {path} is outside the workspace")]
    PathOutsideWorkspace { path: String },

    #[error("Git {op} failed: {source}")]
    Git {
        op: &'static str,
        #[source]
        source: git2::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WorkspaceError {
    /// Adapter for `map_err` on git2 calls.
    pub fn git(op: &'static str) -> impl FnOnce(git2::Error) -> Self {
        move |source| WorkspaceError::Git { op, source }
    }

    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| WorkspaceError::Io { path, source }
    }
}

/// Reasons a pipeline run stops before opening a pull request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("Model output could not be parsed: {0}")]
    Parse(#[from] ParseError),

    #[error("Agent produced no usable proposal after {rounds} rounds")]
    NoSolution { rounds: u32 },
}

impl PipelineError {
    /// Text posted to the card when a run ends with this error.
    pub fn card_comment(&self) -> String {
        match self {
            PipelineError::Parse(e) => format!(
                "⚠️ The AI response did not contain usable SEARCH/REPLACE blocks ({}), so no changes could be applied.",
                e
            ),
            PipelineError::NoSolution { rounds } => format!(
                "⚠️ The AI agent could not produce a solution within {} rounds. No changes were made.",
                rounds
            ),
            other => format!("⚠️ An error occurred: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_error_branch_exists_carries_name() {
        let err = WorkspaceError::BranchExists {
            name: "feature/ticket-abcde".into(),
        };
        assert!(err.to_string().contains("feature/ticket-abcde"));
    }

    #[test]
    fn workspace_git_adapter_keeps_op() {
        let err = WorkspaceError::git("push")(git2::Error::from_str("boom"));
        match &err {
            WorkspaceError::Git { op, source } => {
                assert_eq!(*op, "push");
                assert_eq!(source.message(), "boom");
            }
            _ => panic!("Expected Git variant"),
        }
    }

    #[test]
    fn workspace_io_adapter_carries_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = WorkspaceError::io("/tmp/ws")(io_err);
        match &err {
            WorkspaceError::Io { path, source } => {
                assert_eq!(path, &PathBuf::from("/tmp/ws"));
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn pipeline_error_converts_from_parse_error() {
        let err: PipelineError = ParseError::NoBlocks.into();
        assert!(matches!(err, PipelineError::Parse(ParseError::NoBlocks)));
        assert!(err.card_comment().contains("no changes could be applied"));
    }

    #[test]
    fn pipeline_error_no_solution_comment_mentions_rounds() {
        let err = PipelineError::NoSolution { rounds: 3 };
        assert!(err.card_comment().contains("3 rounds"));
    }

    #[test]
    fn transport_error_comment_includes_status() {
        let err: PipelineError = TransportError::Status {
            service: "trello",
            status: 401,
            body: "invalid token".into(),
        }
        .into();
        let comment = err.card_comment();
        assert!(comment.starts_with("⚠️ An error occurred"));
        assert!(comment.contains("401"));
        assert!(comment.contains("invalid token"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&WorkspaceError::NothingToCommit);
        assert_std_error(&PipelineError::NoSolution { rounds: 1 });
        assert_std_error(&TransportError::Decode {
            service: "github",
            message: "x".into(),
        });
    }
}
