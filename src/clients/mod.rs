//! HTTP clients for the ticketing and hosting services.
//!
//! Both are stateless wrappers behind a trait so the pipeline can be driven by
//! in-test implementations.

pub mod github;
pub mod trello;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::errors::TransportError;

pub use github::{GitHubClient, PullRequest, PullRequestRequest, parse_owner_repo};
pub use trello::{Card, TrelloClient};

/// Ticketing operations used by the pipeline.
#[async_trait]
pub trait TicketingClient: Send + Sync {
    async fn get_card(&self, card_id: &str) -> Result<Card, TransportError>;

    async fn move_card(&self, card_id: &str, list_id: &str) -> Result<(), TransportError>;

    async fn add_comment(&self, card_id: &str, text: &str) -> Result<(), TransportError>;
}

/// Code hosting operations used by the pipeline.
#[async_trait]
pub trait HostingClient: Send + Sync {
    async fn create_pull_request(
        &self,
        request: &PullRequestRequest,
    ) -> Result<PullRequest, TransportError>;
}

const BODY_EXCERPT_LEN: usize = 500;

/// Send `request`, failing on transport errors and non-success statuses.
pub(crate) async fn send(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, TransportError> {
    let response = request
        .send()
        .await
        .map_err(|source| TransportError::Request { service, source })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(BODY_EXCERPT_LEN).collect();
    tracing::warn!(service, status = status.as_u16(), "request rejected");
    Err(TransportError::Status {
        service,
        status: status.as_u16(),
        body,
    })
}

/// Send `request` and decode a JSON body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<T, TransportError> {
    let text = send(service, request)
        .await?
        .text()
        .await
        .map_err(|source| TransportError::Request { service, source })?;
    serde_json::from_str(&text).map_err(|e| TransportError::Decode {
        service,
        message: e.to_string(),
    })
}
