//! Model-driven edit agent.
//!
//! The conversation is a bounded state machine:
//!
//! ```text
//! Requesting{1} ──tool calls──▶ ToolResolution{1} ──▶ Requesting{2} ... ──▶ Exhausted
//!      │
//!      └──proposal text──▶ Completed
//! ```
//!
//! Each `Requesting` state consumes one round. A reply that is neither a tool
//! call nor a proposal wastes its round.

pub mod model;
pub mod prompt;
pub mod tools;

use std::path::Path;
use std::sync::Arc;

use cardsmith_patch::looks_like_proposal;

use crate::errors::TransportError;
use crate::workspace::scan_repo_files;
use model::{ChatMessage, ChatModel, ToolCall, ToolDefinition};

pub use model::OpenAiChatModel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentState {
    Requesting { round: u32 },
    ToolResolution { round: u32, calls: Vec<ToolCall> },
    Completed(String),
    Exhausted { rounds: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    /// Raw model text containing edit blocks.
    Proposal(String),
    NoSolution { rounds: u32 },
}

pub struct EditAgent {
    model: Arc<dyn ChatModel>,
    max_rounds: u32,
}

impl EditAgent {
    pub fn new(model: Arc<dyn ChatModel>, max_rounds: u32) -> Self {
        Self { model, max_rounds }
    }

    /// Run the conversation for one ticket against the checked-out repository at `root`.
    pub async fn propose(
        &self,
        root: &Path,
        title: &str,
        description: &str,
    ) -> Result<AgentOutcome, TransportError> {
        let tools = vec![tools::read_file_tool()];
        let listing = scan_repo_files(root).await;
        let mut history = vec![
            ChatMessage::system(prompt::system_prompt(title, &listing)),
            ChatMessage::user(prompt::task_message(description)),
        ];

        let mut state = if self.max_rounds == 0 {
            AgentState::Exhausted { rounds: 0 }
        } else {
            AgentState::Requesting { round: 1 }
        };

        loop {
            state = match state {
                AgentState::Requesting { round } => {
                    self.request(round, &mut history, &tools).await?
                }
                AgentState::ToolResolution { round, calls } => {
                    for call in &calls {
                        history.push(tools::resolve_tool_call(root, call).await);
                    }
                    self.after_round(round)
                }
                AgentState::Completed(raw) => {
                    tracing::info!(chars = raw.len(), "agent produced a proposal");
                    return Ok(AgentOutcome::Proposal(raw));
                }
                AgentState::Exhausted { rounds } => {
                    tracing::warn!(rounds, "agent exhausted its rounds");
                    return Ok(AgentOutcome::NoSolution { rounds });
                }
            };
        }
    }

    async fn request(
        &self,
        round: u32,
        history: &mut Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> Result<AgentState, TransportError> {
        tracing::debug!(round, messages = history.len(), "requesting model reply");
        let reply = self.model.complete(history, tools).await?;
        let calls = reply.tool_calls.clone().unwrap_or_default();
        let content = reply.content.clone().unwrap_or_default();
        history.push(reply.into_message());

        if !calls.is_empty() {
            tracing::debug!(round, calls = calls.len(), "model requested tools");
            return Ok(AgentState::ToolResolution { round, calls });
        }
        if looks_like_proposal(&content) {
            return Ok(AgentState::Completed(content));
        }

        tracing::debug!(round, "reply was not a proposal");
        history.push(ChatMessage::user(prompt::FORMAT_REMINDER));
        Ok(self.after_round(round))
    }

    fn after_round(&self, round: u32) -> AgentState {
        if round >= self.max_rounds {
            AgentState::Exhausted { rounds: round }
        } else {
            AgentState::Requesting { round: round + 1 }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use model::AssistantReply;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Replays canned replies and records every history it was sent.
    #[derive(Default)]
    pub(crate) struct ScriptedModel {
        replies: Mutex<VecDeque<AssistantReply>>,
        pub(crate) seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(replies: Vec<AssistantReply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::default(),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _tools: &[ToolDefinition],
        ) -> Result<AssistantReply, TransportError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| AssistantReply::text("I am not sure.")))
        }
    }

    const PROPOSAL: &str = "FILE: app.js\n<<<<<<< SEARCH\nreturn 1;\n=======\nreturn 2;\n>>>>>>> REPLACE\n";

    #[tokio::test]
    async fn test_direct_proposal_completes_in_one_round() {
        let dir = tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new(vec![AssistantReply::text(PROPOSAL)]));
        let agent = EditAgent::new(model.clone(), 3);

        let outcome = agent.propose(dir.path(), "Fix", "desc").await.unwrap();
        assert_eq!(outcome, AgentOutcome::Proposal(PROPOSAL.to_string()));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_tool_call_then_proposal() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("app.js"), "function f() { return 1; }").unwrap();
        let model = Arc::new(ScriptedModel::new(vec![
            AssistantReply::tools(vec![ToolCall::function(
                "call_1",
                "read_file",
                r#"{"file_path":"app.js"}"#,
            )]),
            AssistantReply::text(PROPOSAL),
        ]));
        let agent = EditAgent::new(model.clone(), 3);

        let outcome = agent.propose(dir.path(), "Fix", "desc").await.unwrap();
        assert!(matches!(outcome, AgentOutcome::Proposal(_)));

        let seen = model.seen.lock().unwrap();
        let second = &seen[1];
        // system, user, assistant(tool_calls), tool
        assert_eq!(second.len(), 4);
        match &second[3] {
            ChatMessage::Tool {
                tool_call_id,
                content,
                ..
            } => {
                assert_eq!(tool_call_id, "call_1");
                assert_eq!(content, "function f() { return 1; }");
            }
            other => panic!("Expected tool message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_system_prompt_lists_repository_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("main.py"), "").unwrap();
        let model = Arc::new(ScriptedModel::new(vec![AssistantReply::text(PROPOSAL)]));
        EditAgent::new(model.clone(), 1)
            .propose(dir.path(), "Title", "Body")
            .await
            .unwrap();

        let seen = model.seen.lock().unwrap();
        match (&seen[0][0], &seen[0][1]) {
            (ChatMessage::System { content }, ChatMessage::User { content: user }) => {
                assert!(content.contains("main.py"));
                assert!(content.contains("Task: Title"));
                assert_eq!(user, "Details: Body");
            }
            other => panic!("Unexpected history start: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_prose_replies_exhaust_rounds() {
        let dir = tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new(vec![]));
        let agent = EditAgent::new(model.clone(), 3);

        let outcome = agent.propose(dir.path(), "Fix", "desc").await.unwrap();
        assert_eq!(outcome, AgentOutcome::NoSolution { rounds: 3 });
        assert_eq!(model.calls(), 3);

        // Wasted rounds leave a reminder for the next request.
        let seen = model.seen.lock().unwrap();
        assert!(matches!(
            seen[1].last(),
            Some(ChatMessage::User { content }) if content == prompt::FORMAT_REMINDER
        ));
    }

    #[tokio::test]
    async fn test_tool_calls_in_last_round_exhaust() {
        let dir = tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new(vec![AssistantReply::tools(vec![
            ToolCall::function("c", "read_file", r#"{"file_path":"x"}"#),
        ])]));
        let outcome = EditAgent::new(model.clone(), 1)
            .propose(dir.path(), "Fix", "desc")
            .await
            .unwrap();
        assert_eq!(outcome, AgentOutcome::NoSolution { rounds: 1 });
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_rounds_never_calls_model() {
        let dir = tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new(vec![AssistantReply::text(PROPOSAL)]));
        let outcome = EditAgent::new(model.clone(), 0)
            .propose(dir.path(), "Fix", "desc")
            .await
            .unwrap();
        assert_eq!(outcome, AgentOutcome::NoSolution { rounds: 0 });
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_text_with_only_file_header_is_not_a_proposal() {
        let dir = tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new(vec![
            AssistantReply::text("FILE: app.js but I will not show blocks"),
            AssistantReply::text(PROPOSAL),
        ]));
        let outcome = EditAgent::new(model.clone(), 3)
            .propose(dir.path(), "Fix", "desc")
            .await
            .unwrap();
        assert!(matches!(outcome, AgentOutcome::Proposal(_)));
        assert_eq!(model.calls(), 2);
    }
}
