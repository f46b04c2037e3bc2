use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use super::server::SharedState;
use crate::pipeline::TicketEvent;

/// The only action type that starts a run.
pub const TRIGGER_ACTION: &str = "addMemberToCard";

/// Trello webhook body (subset of fields). Every level is optional.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub action: Option<WebhookAction>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookAction {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub member: Option<ActionMember>,
    #[serde(default)]
    pub data: Option<ActionData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionMember {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionData {
    #[serde(default)]
    pub card: Option<CardRef>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CardRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct WebhookAck {
    pub status: &'static str,
}

impl WebhookAck {
    fn ok() -> Json<Self> {
        Json(Self { status: "ok" })
    }

    fn error() -> Json<Self> {
        Json(Self { status: "error" })
    }
}

/// The event to run for `payload`, if it assigns `bot_username` to a card.
pub fn ticket_event(payload: &WebhookPayload, bot_username: &str) -> Option<TicketEvent> {
    let action = payload.action.as_ref()?;
    if action.kind.as_deref() != Some(TRIGGER_ACTION) {
        return None;
    }
    let member = action.member.as_ref()?.username.as_deref()?;
    if bot_username.is_empty() || member != bot_username {
        return None;
    }
    let card = action.data.as_ref()?.card.as_ref()?;
    let card_id = card.id.as_deref().filter(|id| !id.is_empty())?;

    Some(TicketEvent {
        card_id: card_id.to_string(),
        title: card.name.clone().unwrap_or_default(),
        description: String::new(),
        member: member.to_string(),
    })
}

/// `POST /webhook`: always 200; the body reports whether the payload was understood.
pub(super) async fn receive_webhook(
    State(state): State<SharedState>,
    body: Bytes,
) -> Json<WebhookAck> {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, bytes = body.len(), "unreadable webhook body");
            return WebhookAck::error();
        }
    };

    match ticket_event(&payload, &state.bot_username) {
        Some(event) => {
            tracing::info!(card_id = %event.card_id, title = %event.title, "dispatching pipeline");
            state.dispatcher.dispatch(event);
        }
        None => {
            let kind = payload
                .action
                .as_ref()
                .and_then(|a| a.kind.as_deref())
                .unwrap_or("<none>");
            tracing::debug!(action = kind, "ignoring webhook event");
        }
    }
    WebhookAck::ok()
}

/// `HEAD /webhook`: Trello probes the callback URL before registering it.
pub(super) async fn probe_webhook() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: serde_json::Value) -> WebhookPayload {
        serde_json::from_value(json).unwrap()
    }

    fn assignment(kind: &str, member: &str) -> WebhookPayload {
        payload(serde_json::json!({
            "action": {
                "type": kind,
                "member": {"username": member},
                "data": {"card": {"id": "c123", "name": "Add dark mode"}}
            }
        }))
    }

    #[test]
    fn test_bot_assignment_produces_event() {
        let event = ticket_event(&assignment("addMemberToCard", "bot"), "bot").unwrap();
        assert_eq!(event.card_id, "c123");
        assert_eq!(event.title, "Add dark mode");
        assert_eq!(event.member, "bot");
        assert!(event.description.is_empty());
    }

    #[test]
    fn test_other_member_or_action_is_ignored() {
        assert!(ticket_event(&assignment("addMemberToCard", "alice"), "bot").is_none());
        assert!(ticket_event(&assignment("updateCard", "bot"), "bot").is_none());
        assert!(ticket_event(&assignment("removeMemberFromCard", "bot"), "bot").is_none());
    }

    #[test]
    fn test_empty_bot_identity_never_matches() {
        assert!(ticket_event(&assignment("addMemberToCard", ""), "").is_none());
    }

    #[test]
    fn test_missing_fields_are_ignored() {
        assert!(ticket_event(&payload(serde_json::json!({})), "bot").is_none());
        let no_card = payload(serde_json::json!({
            "action": {"type": "addMemberToCard", "member": {"username": "bot"}, "data": {}}
        }));
        assert!(ticket_event(&no_card, "bot").is_none());
        let no_member = payload(serde_json::json!({
            "action": {"type": "addMemberToCard", "data": {"card": {"id": "c1"}}}
        }));
        assert!(ticket_event(&no_member, "bot").is_none());
    }

    #[test]
    fn test_card_without_name_has_empty_title() {
        let p = payload(serde_json::json!({
            "action": {
                "type": "addMemberToCard",
                "member": {"username": "bot"},
                "data": {"card": {"id": "c9"}}
            }
        }));
        assert_eq!(ticket_event(&p, "bot").unwrap().title, "");
    }
}
