use async_trait::async_trait;
use serde::Deserialize;

use super::{TicketingClient, send, send_json};
use crate::config::TrelloSection;
use crate::errors::TransportError;

const SERVICE: &str = "trello";

/// A card (subset of fields we care about).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Card {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Long description; empty when the card has none.
    #[serde(default)]
    pub desc: String,
}

/// Trello REST client authenticated with key/token query parameters.
#[derive(Debug, Clone)]
pub struct TrelloClient {
    http: reqwest::Client,
    base_url: String,
    key: String,
    token: String,
}

impl TrelloClient {
    pub fn new(
        base_url: impl Into<String>,
        key: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key: key.into(),
            token: token.into(),
        }
    }

    pub fn from_config(section: &TrelloSection) -> Self {
        Self::new(
            &section.api_url,
            section.api_key.clone().unwrap_or_default(),
            section.token.clone().unwrap_or_default(),
        )
    }

    fn card_url(&self, card_id: &str, suffix: &str) -> String {
        format!("{}/cards/{}{}", self.base_url, card_id, suffix)
    }

    fn auth(&self) -> [(&'static str, &str); 2] {
        [("key", self.key.as_str()), ("token", self.token.as_str())]
    }
}

#[async_trait]
impl TicketingClient for TrelloClient {
    async fn get_card(&self, card_id: &str) -> Result<Card, TransportError> {
        let request = self.http.get(self.card_url(card_id, "")).query(&self.auth());
        send_json(SERVICE, request).await
    }

    async fn move_card(&self, card_id: &str, list_id: &str) -> Result<(), TransportError> {
        let request = self
            .http
            .put(self.card_url(card_id, ""))
            .query(&self.auth())
            .query(&[("idList", list_id)]);
        send(SERVICE, request).await?;
        tracing::info!(card_id, list_id, "moved card");
        Ok(())
    }

    async fn add_comment(&self, card_id: &str, text: &str) -> Result<(), TransportError> {
        let request = self
            .http
            .post(self.card_url(card_id, "/actions/comments"))
            .query(&self.auth())
            .query(&[("text", text)]);
        send(SERVICE, request).await?;
        tracing::debug!(card_id, "commented on card");
        Ok(())
    }
}
