use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{HostingClient, send_json};
use crate::config::GitHubSection;
use crate::errors::TransportError;

const SERVICE: &str = "github";
const USER_AGENT: &str = "cardsmith";

/// Body of `POST /repos/{owner}/{repo}/pulls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestRequest {
    pub title: String,
    pub body: String,
    /// Branch holding the changes.
    pub head: String,
    /// Branch the changes should be merged into.
    pub base: String,
}

/// A created pull request (subset of fields).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub html_url: String,
    #[serde(default)]
    pub number: Option<u64>,
}

/// Parse an `owner/repo` slug, also accepting full GitHub URLs.
///
/// Handles:
/// - `owner/repo`
/// - `https://github.com/owner/repo`
/// - `https://github.com/owner/repo.git`
pub fn parse_owner_repo(input: &str) -> Option<(String, String)> {
    let trimmed = input.trim();
    let path = trimmed
        .strip_prefix("https://github.com/")
        .unwrap_or(trimmed);
    let path = path.strip_suffix(".git").unwrap_or(path);
    let path = path.trim_end_matches('/');

    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
        Some((parts[0].to_string(), parts[1].to_string()))
    } else {
        None
    }
}

/// GitHub REST client authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    repo: String,
}

impl GitHubClient {
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            repo: repo.into(),
        }
    }

    pub fn from_config(section: &GitHubSection) -> Self {
        Self::new(
            &section.api_url,
            section.token.clone().unwrap_or_default(),
            &section.repo,
        )
    }

    fn pulls_url(&self) -> Result<String, TransportError> {
        let (owner, repo) = parse_owner_repo(&self.repo).ok_or_else(|| TransportError::Decode {
            service: SERVICE,
            message: format!("'{}' is not an owner/repo slug", self.repo),
        })?;
        Ok(format!("{}/repos/{}/{}/pulls", self.api_url, owner, repo))
    }
}

#[async_trait]
impl HostingClient for GitHubClient {
    async fn create_pull_request(
        &self,
        request: &PullRequestRequest,
    ) -> Result<PullRequest, TransportError> {
        let http_request = self
            .http
            .post(self.pulls_url()?)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .json(request);
        let pr: PullRequest = send_json(SERVICE, http_request).await?;
        tracing::info!(url = %pr.html_url, head = %request.head, "opened pull request");
        Ok(pr)
    }
}
