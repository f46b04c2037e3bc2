//! Configuration for cardsmith.
//!
//! Settings are read from `cardsmith.toml` (optional) and then layered with
//! environment variables, which always win. Secrets are normally supplied only
//! through the environment or a `.env` file loaded by `dotenvy` at startup.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//!
//! [trello]
//! bot_username = "cardsmith-bot"
//! in_progress_list = "691d9d7f9faff31f3cc13819"
//! review_list = "691d9d7f9faff31f3cc1381a"
//!
//! [github]
//! repo = "owner/repo"
//! base_branch = "main"
//!
//! [model]
//! model = "gpt-4o"
//! max_rounds = 3
//!
//! [workspace]
//! root = "workspace"
//! branch_prefix = "feature/ticket-"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "cardsmith.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Ticketing (Trello) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrelloSection {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    /// Username whose assignment to a card triggers a run.
    #[serde(default)]
    pub bot_username: String,
    #[serde(default)]
    pub in_progress_list: String,
    #[serde(default)]
    pub review_list: String,
    #[serde(default = "default_trello_api_url")]
    pub api_url: String,
}

fn default_trello_api_url() -> String {
    "https://api.trello.com/1".to_string()
}

impl Default for TrelloSection {
    fn default() -> Self {
        Self {
            api_key: None,
            token: None,
            bot_username: String::new(),
            in_progress_list: String::new(),
            review_list: String::new(),
            api_url: default_trello_api_url(),
        }
    }
}

/// Hosting (GitHub) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubSection {
    #[serde(default)]
    pub token: Option<String>,
    /// `owner/repo` slug of the target repository.
    #[serde(default)]
    pub repo: String,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    /// Clone URL override; defaults to `https://github.com/<repo>.git`.
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

impl Default for GitHubSection {
    fn default() -> Self {
        Self {
            token: None,
            repo: String::new(),
            base_branch: default_base_branch(),
            remote_url: None,
            api_url: default_github_api_url(),
        }
    }
}

impl GitHubSection {
    pub fn clone_url(&self) -> String {
        self.remote_url
            .clone()
            .unwrap_or_else(|| format!("https://github.com/{}.git", self.repo))
    }
}

/// Language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSection {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_model_api_url")]
    pub api_url: String,
    /// Conversation rounds before the agent gives up.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_model_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_rounds() -> u32 {
    3
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            api_url: default_model_api_url(),
            max_rounds: default_max_rounds(),
        }
    }
}

/// Local workspace settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSection {
    /// Directory under which per-run clones are created.
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
    /// File committed with the raw proposal when no block applies.
    #[serde(default = "default_failure_artifact")]
    pub failure_artifact: String,
    #[serde(default = "default_author_name")]
    pub author_name: String,
    #[serde(default = "default_author_email")]
    pub author_email: String,
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("workspace")
}

fn default_branch_prefix() -> String {
    "feature/ticket-".to_string()
}

fn default_failure_artifact() -> String {
    "AI_PATCH_FAILED.md".to_string()
}

fn default_author_name() -> String {
    "cardsmith".to_string()
}

fn default_author_email() -> String {
    "cardsmith@localhost".to_string()
}

impl Default for WorkspaceSection {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            branch_prefix: default_branch_prefix(),
            failure_artifact: default_failure_artifact(),
            author_name: default_author_name(),
            author_email: default_author_email(),
        }
    }
}

/// Complete, immutable runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub trello: TrelloSection,
    #[serde(default)]
    pub github: GitHubSection,
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub workspace: WorkspaceSection,
}

impl AppConfig {
    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse cardsmith.toml")
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Load `path` if it exists (defaults otherwise) and apply process environment overrides.
    pub fn load_layered(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("TRELLO_API_KEY") {
            self.trello.api_key = Some(v);
        }
        if let Some(v) = non_empty("TRELLO_TOKEN") {
            self.trello.token = Some(v);
        }
        if let Some(v) = non_empty("TRELLO_BOT_USERNAME") {
            self.trello.bot_username = v;
        }
        if let Some(v) = non_empty("GITHUB_TOKEN") {
            self.github.token = Some(v);
        }
        if let Some(v) = non_empty("GITHUB_REPO") {
            self.github.repo = v;
        }
        if let Some(v) = non_empty("OPENAI_API_KEY") {
            self.model.api_key = Some(v);
        }
        if let Some(v) = non_empty("OPENAI_MODEL") {
            self.model.model = v;
        }
        if let Some(v) = non_empty("CARDSMITH_WORKSPACE_ROOT") {
            self.workspace.root = PathBuf::from(v);
        }
    }

    /// Human-readable problems that would make a pipeline run fail.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.trello.api_key.is_none() || self.trello.token.is_none() {
            warnings.push("Trello credentials missing (TRELLO_API_KEY / TRELLO_TOKEN)".to_string());
        }
        if self.trello.bot_username.is_empty() {
            warnings.push(
                "trello.bot_username is empty; no webhook event will trigger a run".to_string(),
            );
        }
        if self.trello.in_progress_list.is_empty() || self.trello.review_list.is_empty() {
            warnings.push(
                "trello.in_progress_list and trello.review_list must both be set".to_string(),
            );
        }
        if self.github.token.is_none() {
            warnings.push(
                "GITHUB_TOKEN missing; clone, push and PR creation will fail".to_string(),
            );
        }
        if self.github.repo.split('/').filter(|s| !s.is_empty()).count() != 2 {
            warnings.push(format!(
                "github.repo '{}' is not an owner/repo slug",
                self.github.repo
            ));
        }
        if self.model.api_key.is_none() {
            warnings.push("OPENAI_API_KEY missing; the edit agent cannot run".to_string());
        }
        if self.model.max_rounds == 0 {
            warnings.push("model.max_rounds is 0; every run will end with no solution".to_string());
        }
        let artifact = &self.workspace.failure_artifact;
        if artifact.contains('/') || artifact.contains('\\') {
            warnings.push("workspace.failure_artifact must be a bare file name".to_string());
        }

        warnings
    }

    /// Copy with every secret replaced, safe to print.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        let mask = |v: &mut Option<String>| {
            if v.is_some() {
                *v = Some("***".to_string());
            }
        };
        mask(&mut copy.trello.api_key);
        mask(&mut copy.trello.token);
        mask(&mut copy.github.token);
        mask(&mut copy.model.api_key);
        copy
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
