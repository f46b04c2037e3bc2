use std::path::{Path, PathBuf};

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    BranchType, Cred, ErrorCode, FetchOptions, PushOptions, RemoteCallbacks, Repository, Signature,
};
use uuid::Uuid;

use super::files::{force_remove_dir, resolve_in_workspace};
use crate::config::AppConfig;
use crate::errors::WorkspaceError;

/// Creates one isolated clone per pipeline run.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    base_branch: String,
    token: Option<String>,
    author_name: String,
    author_email: String,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>, base_branch: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_branch: base_branch.into(),
            token: None,
            author_name: "cardsmith".to_string(),
            author_email: "cardsmith@localhost".to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.workspace.root, &config.github.base_branch)
            .with_token(config.github.token.clone())
            .with_author(&config.workspace.author_name, &config.workspace.author_email)
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = name.into();
        self.author_email = email.into();
        self
    }

    /// Clone `remote_url` at the base branch into a fresh UUID-named directory.
    ///
    /// A partially written directory is removed before the error is returned.
    pub async fn open(&self, remote_url: &str) -> Result<WorkspaceSession, WorkspaceError> {
        let path = self.root.join(Uuid::new_v4().to_string());
        let url = remote_url.to_string();
        let base = self.base_branch.clone();
        let token = self.token.clone();

        std::fs::create_dir_all(&self.root).map_err(WorkspaceError::io(&self.root))?;
        tracing::info!(path = %path.display(), "cloning workspace");

        run_blocking(path.clone(), move |dir| {
            let mut fetch = FetchOptions::new();
            fetch.remote_callbacks(remote_callbacks(token));
            let result = RepoBuilder::new()
                .branch(&base)
                .fetch_options(fetch)
                .clone(&url, dir);
            match result {
                Ok(_) => Ok(()),
                Err(source) => {
                    if let Err(e) = force_remove_dir(dir) {
                        tracing::warn!(path = %dir.display(), error = %e, "failed to remove partial clone");
                    }
                    Err(WorkspaceError::Clone { url, source })
                }
            }
        })
        .await?;

        Ok(WorkspaceSession {
            path,
            token: self.token.clone(),
            author_name: self.author_name.clone(),
            author_email: self.author_email.clone(),
            closed: false,
        })
    }
}

/// A cloned repository owned by exactly one run.
///
/// The directory is removed by [`WorkspaceSession::close`], or on drop if the
/// session was never closed.
#[derive(Debug)]
pub struct WorkspaceSession {
    path: PathBuf,
    token: Option<String>,
    author_name: String,
    author_email: String,
    closed: bool,
}

impl WorkspaceSession {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create `name` from HEAD and check it out.
    pub async fn create_branch(&self, name: &str) -> Result<(), WorkspaceError> {
        let name = name.to_string();
        run_blocking(self.path.clone(), move |dir| {
            let repo = Repository::open(dir).map_err(WorkspaceError::git("open"))?;
            if repo.find_branch(&name, BranchType::Local).is_ok() {
                return Err(WorkspaceError::BranchExists { name });
            }
            let head = repo
                .head()
                .and_then(|h| h.peel_to_commit())
                .map_err(WorkspaceError::git("resolve HEAD"))?;
            repo.branch(&name, &head, false)
                .map_err(WorkspaceError::git("create branch"))?;
            repo.set_head(&format!("refs/heads/{}", name))
                .map_err(WorkspaceError::git("set HEAD"))?;
            repo.checkout_head(Some(CheckoutBuilder::new().safe()))
                .map_err(WorkspaceError::git("checkout"))?;
            tracing::info!(branch = %name, "created branch");
            Ok(())
        })
        .await
    }

    /// Read a workspace file; `None` when it does not exist.
    pub async fn read_file(&self, relative: &str) -> Result<Option<String>, WorkspaceError> {
        let path = resolve_in_workspace(&self.path, relative)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WorkspaceError::io(path)(e)),
        }
    }

    /// Write a workspace file, creating parent directories as needed.
    pub async fn write_file(&self, relative: &str, content: &str) -> Result<(), WorkspaceError> {
        let path = resolve_in_workspace(&self.path, relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(WorkspaceError::io(parent))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(WorkspaceError::io(&path))
    }

    /// Stage exactly `files` and commit them on the current branch.
    ///
    /// Returns the new commit id.
    pub async fn commit(&self, files: &[&str], message: &str) -> Result<String, WorkspaceError> {
        for file in files {
            resolve_in_workspace(&self.path, file)?;
        }
        let files: Vec<String> = files.iter().map(|f| f.replace('\\', "/")).collect();
        let message = message.to_string();
        let name = self.author_name.clone();
        let email = self.author_email.clone();

        run_blocking(self.path.clone(), move |dir| {
            let repo = Repository::open(dir).map_err(WorkspaceError::git("open"))?;
            let mut index = repo.index().map_err(WorkspaceError::git("index"))?;
            for file in &files {
                index
                    .add_path(Path::new(file))
                    .map_err(WorkspaceError::git("stage"))?;
            }
            index.write().map_err(WorkspaceError::git("write index"))?;

            let tree_id = index.write_tree().map_err(WorkspaceError::git("write tree"))?;
            let parent = repo
                .head()
                .and_then(|h| h.peel_to_commit())
                .map_err(WorkspaceError::git("resolve HEAD"))?;
            if parent.tree_id() == tree_id {
                return Err(WorkspaceError::NothingToCommit);
            }

            let tree = repo.find_tree(tree_id).map_err(WorkspaceError::git("find tree"))?;
            let sig = Signature::now(&name, &email).map_err(WorkspaceError::git("signature"))?;
            let oid = repo
                .commit(Some("HEAD"), &sig, &sig, &message, &tree, &[&parent])
                .map_err(WorkspaceError::git("commit"))?;
            tracing::info!(commit = %oid, files = files.len(), "committed");
            Ok(oid.to_string())
        })
        .await
    }

    /// Push `refs/heads/<branch>` to `origin`.
    pub async fn push(&self, branch: &str) -> Result<(), WorkspaceError> {
        let branch = branch.to_string();
        let token = self.token.clone();

        run_blocking(self.path.clone(), move |dir| {
            let repo = Repository::open(dir).map_err(WorkspaceError::git("open"))?;
            let mut remote = repo
                .find_remote("origin")
                .map_err(WorkspaceError::git("find remote"))?;
            let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch);

            let mut rejection: Option<String> = None;
            {
                let mut callbacks = remote_callbacks(token);
                callbacks.push_update_reference(|_refname, status| {
                    if let Some(reason) = status {
                        rejection = Some(reason.to_string());
                    }
                    Ok(())
                });
                let mut options = PushOptions::new();
                options.remote_callbacks(callbacks);
                remote
                    .push(&[refspec.as_str()], Some(&mut options))
                    .map_err(|source| {
                        if is_non_fast_forward(&source) {
                            WorkspaceError::PushRejected {
                                branch: branch.clone(),
                                reason: source.message().to_string(),
                            }
                        } else {
                            WorkspaceError::git("push")(source)
                        }
                    })?;
            }

            if let Some(reason) = rejection {
                return Err(WorkspaceError::PushRejected { branch, reason });
            }
            tracing::info!(branch = %branch, "pushed");
            Ok(())
        })
        .await
    }

    /// Remove the workspace directory.
    pub async fn close(mut self) -> Result<(), WorkspaceError> {
        self.closed = true;
        let path = self.path.clone();
        run_blocking(path.clone(), move |dir| {
            force_remove_dir(dir).map_err(WorkspaceError::io(dir))
        })
        .await?;
        tracing::debug!(path = %path.display(), "workspace removed");
        Ok(())
    }
}

impl Drop for WorkspaceSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = force_remove_dir(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove workspace on drop");
        }
    }
}

/// The remote branch has commits the local one lacks.
fn is_non_fast_forward(error: &git2::Error) -> bool {
    error.code() == ErrorCode::NotFastForward || error.message().contains("non-fastforward")
}

/// Credential callbacks that offer the hosting token once.
fn remote_callbacks<'a>(token: Option<String>) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts = 0u32;
    callbacks.credentials(move |_url, _username, _allowed| {
        attempts += 1;
        if attempts > 1 {
            return Err(git2::Error::from_str("credentials rejected by remote"));
        }
        match token.as_deref() {
            Some(token) => Cred::userpass_plaintext("x-access-token", token),
            None => Err(git2::Error::from_str("no hosting token configured")),
        }
    });
    callbacks
}

async fn run_blocking<T, F>(path: PathBuf, f: F) -> Result<T, WorkspaceError>
where
    T: Send + 'static,
    F: FnOnce(&Path) -> Result<T, WorkspaceError> + Send + 'static,
{
    let dir = path.clone();
    tokio::task::spawn_blocking(move || f(&dir))
        .await
        .map_err(|e| WorkspaceError::Io {
            path,
            source: std::io::Error::other(e),
        })?
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use git2::RepositoryInitOptions;
    use std::fs;
    use tempfile::TempDir;

    /// Bare origin on `main` with one commit containing `files`.
    ///
    /// The commit is made in a scratch working repository, then cloned bare;
    /// the local transport only pushes to bare repositories.
    pub(crate) fn init_origin(files: &[(&str, &str)]) -> TempDir {
        let seed = TempDir::new().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(seed.path(), &opts).unwrap();
        for (name, content) in files {
            let path = seed.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("test", "test@localhost").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();

        let origin = TempDir::new().unwrap();
        RepoBuilder::new()
            .bare(true)
            .clone(&seed.path().to_string_lossy(), origin.path())
            .unwrap();
        origin
    }

    fn origin_url(origin: &TempDir) -> String {
        origin.path().to_string_lossy().into_owned()
    }

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_open_clones_into_unique_directory() {
        let origin = init_origin(&[("README.md", "hello\n")]);
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path(), "main");

        let first = manager.open(&origin_url(&origin)).await.unwrap();
        let second = manager.open(&origin_url(&origin)).await.unwrap();

        assert_ne!(first.path(), second.path());
        assert!(first.path().starts_with(root.path()));
        assert_eq!(
            first.read_file("README.md").await.unwrap().as_deref(),
            Some("hello\n")
        );
        first.close().await.unwrap();
        second.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_failure_leaves_no_directory() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path(), "main");
        let missing = root.path().join("no-such-origin");

        let err = manager
            .open(&missing.to_string_lossy())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::Clone { .. }));
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_create_branch_checks_out_and_rejects_duplicates() {
        let origin = init_origin(&[("a.txt", "a\n")]);
        let root = TempDir::new().unwrap();
        let session = WorkspaceManager::new(root.path(), "main")
            .open(&origin_url(&origin))
            .await
            .unwrap();

        session.create_branch("feature/ticket-abcde").await.unwrap();
        let repo = Repository::open(session.path()).unwrap();
        assert_eq!(
            repo.head().unwrap().shorthand(),
            Some("feature/ticket-abcde")
        );

        let err = session.create_branch("main").await.unwrap_err();
        assert!(matches!(err, WorkspaceError::BranchExists { ref name } if name == "main"));
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_and_push_reach_origin() {
        let origin = init_origin(&[("src/app.js", "function f() { return 1; }\n")]);
        let root = TempDir::new().unwrap();
        let session = WorkspaceManager::new(root.path(), "main")
            .with_author("bot", "bot@example.com")
            .open(&origin_url(&origin))
            .await
            .unwrap();

        session.create_branch("feature/ticket-12345").await.unwrap();
        session
            .write_file("src/app.js", "function f() { return 2; }\n")
            .await
            .unwrap();
        session.commit(&["src/app.js"], "Fix: thing").await.unwrap();
        session.push("feature/ticket-12345").await.unwrap();

        let origin_repo = Repository::open(origin.path()).unwrap();
        let branch = origin_repo
            .find_branch("feature/ticket-12345", BranchType::Local)
            .unwrap();
        let commit = branch.get().peel_to_commit().unwrap();
        assert_eq!(commit.message(), Some("Fix: thing"));
        assert_eq!(commit.author().name(), Some("bot"));
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_diverged_push_is_rejected() {
        let origin = init_origin(&[("a.txt", "a\n")]);
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path(), "main");
        let first = manager.open(&origin_url(&origin)).await.unwrap();
        let second = manager.open(&origin_url(&origin)).await.unwrap();

        for (session, content) in [(&first, "first\n"), (&second, "second\n")] {
            session.create_branch("feature/ticket-x").await.unwrap();
            session.write_file("a.txt", content).await.unwrap();
            session.commit(&["a.txt"], content.trim()).await.unwrap();
        }

        first.push("feature/ticket-x").await.unwrap();
        let err = second.push("feature/ticket-x").await.unwrap_err();
        assert!(
            matches!(err, WorkspaceError::PushRejected { ref branch, .. } if branch == "feature/ticket-x"),
            "unexpected error: {err:?}"
        );

        let origin_repo = Repository::open(origin.path()).unwrap();
        let commit = origin_repo
            .find_branch("feature/ticket-x", BranchType::Local)
            .unwrap()
            .get()
            .peel_to_commit()
            .unwrap();
        assert_eq!(commit.message(), Some("first"));
        first.close().await.unwrap();
        second.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_without_changes_is_nothing_to_commit() {
        let origin = init_origin(&[("a.txt", "a\n")]);
        let root = TempDir::new().unwrap();
        let session = WorkspaceManager::new(root.path(), "main")
            .open(&origin_url(&origin))
            .await
            .unwrap();

        let err = session.commit(&["a.txt"], "noop").await.unwrap_err();
        assert!(matches!(err, WorkspaceError::NothingToCommit));
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_paths_outside_workspace_are_rejected() {
        let origin = init_origin(&[("a.txt", "a\n")]);
        let root = TempDir::new().unwrap();
        let session = WorkspaceManager::new(root.path(), "main")
            .open(&origin_url(&origin))
            .await
            .unwrap();

        assert!(matches!(
            session.write_file("../escape.txt", "x").await,
            Err(WorkspaceError::PathOutsideWorkspace { .. })
        ));
        assert!(matches!(
            session.commit(&["/etc/passwd"], "x").await,
            Err(WorkspaceError::PathOutsideWorkspace { .. })
        ));
        assert_eq!(session.read_file("missing.txt").await.unwrap(), None);
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_and_drop_remove_directory() {
        let origin = init_origin(&[("a.txt", "a\n")]);
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path(), "main");

        let closed = manager.open(&origin_url(&origin)).await.unwrap();
        let closed_path = closed.path().to_path_buf();
        closed.close().await.unwrap();
        assert!(!closed_path.exists());

        let dropped = manager.open(&origin_url(&origin)).await.unwrap();
        let dropped_path = dropped.path().to_path_buf();
        drop(dropped);
        assert!(!dropped_path.exists());
    }
}
