//! Ticket-to-pull-request pipeline.
//!
//! One run per accepted webhook event:
//!
//! 1. Move the card to the in-progress list and fetch its full detail
//! 2. Clone the repository into a fresh workspace and create the ticket branch
//! 3. Ask the edit agent for a proposal
//! 4. Parse it and apply the primary file's blocks
//! 5. Commit (the patched file, or the failure artifact when nothing matched), push, open a PR
//! 6. Comment the PR link and move the card to the review list
//!
//! Any error ends the run with a card comment; the workspace is always removed.

use std::sync::Arc;

use cardsmith_patch::{EditProposal, PatchMismatch};

use crate::agent::model::ChatModel;
use crate::agent::{AgentOutcome, EditAgent};
use crate::clients::{HostingClient, PullRequestRequest, TicketingClient};
use crate::config::AppConfig;
use crate::errors::PipelineError;
use crate::workspace::{WorkspaceManager, WorkspaceSession, branch_name_for};

/// A card assignment that should trigger a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketEvent {
    pub card_id: String,
    pub title: String,
    /// Usually empty from the webhook; the run fetches the full card.
    pub description: String,
    pub member: String,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The patch applied and a pull request carries it.
    Applied {
        pr_url: String,
        branch: String,
        applied: usize,
    },
    /// No block matched; the pull request only carries the failure artifact.
    ArtifactOnly {
        pr_url: String,
        branch: String,
        mismatch: PatchMismatch,
    },
    /// The run stopped early and the error was reported on the card.
    Aborted { error: String },
}

impl RunOutcome {
    /// Comment posted on the card for a delivered run; `None` for aborted runs.
    pub fn card_comment(&self, failure_artifact: &str) -> Option<String> {
        match self {
            RunOutcome::Applied { pr_url, .. } => Some(format!("✅ PR Opened: {}", pr_url)),
            RunOutcome::ArtifactOnly {
                pr_url, mismatch, ..
            } => Some(format!(
                "⚠️ The AI suggested changes but none could be applied automatically ({}). \
                 The suggestion was committed to {} for manual review: {}",
                mismatch, failure_artifact, pr_url
            )),
            RunOutcome::Aborted { .. } => None,
        }
    }
}

/// Hands accepted events to the pipeline without waiting for it.
pub trait PipelineDispatch: Send + Sync {
    fn dispatch(&self, event: TicketEvent);
}

/// Production dispatcher: one detached tokio task per event.
#[derive(Clone)]
pub struct SpawnDispatcher {
    runner: Arc<PipelineRunner>,
}

impl SpawnDispatcher {
    pub fn new(runner: Arc<PipelineRunner>) -> Self {
        Self { runner }
    }
}

impl PipelineDispatch for SpawnDispatcher {
    fn dispatch(&self, event: TicketEvent) {
        let runner = Arc::clone(&self.runner);
        tokio::spawn(async move {
            runner.run(event).await;
        });
    }
}

pub struct PipelineRunner {
    config: Arc<AppConfig>,
    ticketing: Arc<dyn TicketingClient>,
    hosting: Arc<dyn HostingClient>,
    model: Arc<dyn ChatModel>,
    workspaces: WorkspaceManager,
}

impl PipelineRunner {
    pub fn new(
        config: Arc<AppConfig>,
        ticketing: Arc<dyn TicketingClient>,
        hosting: Arc<dyn HostingClient>,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        let workspaces = WorkspaceManager::from_config(&config);
        Self {
            config,
            ticketing,
            hosting,
            model,
            workspaces,
        }
    }

    /// Run the whole pipeline for `event`. Errors are reported on the card, never returned.
    pub async fn run(&self, event: TicketEvent) -> RunOutcome {
        let card_id = event.card_id.clone();
        tracing::info!(card_id = %card_id, title = %event.title, "pipeline started");

        match self.execute(event).await {
            Ok(outcome) => {
                tracing::info!(card_id = %card_id, outcome = ?outcome, "pipeline finished");
                outcome
            }
            Err(e) => {
                tracing::error!(card_id = %card_id, error = %e, "pipeline failed");
                if let Err(comment_err) = self
                    .ticketing
                    .add_comment(&card_id, &e.card_comment())
                    .await
                {
                    tracing::warn!(card_id = %card_id, error = %comment_err, "failed to report error on card");
                }
                RunOutcome::Aborted {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn execute(&self, event: TicketEvent) -> Result<RunOutcome, PipelineError> {
        let trello = &self.config.trello;
        self.ticketing
            .move_card(&event.card_id, &trello.in_progress_list)
            .await?;

        let card = self.ticketing.get_card(&event.card_id).await?;
        let title = if card.name.is_empty() {
            event.title
        } else {
            card.name
        };
        let description = if card.desc.is_empty() {
            event.description
        } else {
            card.desc
        };

        let session = self
            .workspaces
            .open(&self.config.github.clone_url())
            .await?;
        let result = self
            .deliver(&session, &event.card_id, &title, &description)
            .await;
        if let Err(e) = session.close().await {
            tracing::warn!(card_id = %event.card_id, error = %e, "workspace cleanup failed");
        }
        let outcome = result?;

        // The pull request exists from here on; card updates can no longer fail the run.
        if let Some(comment) = outcome.card_comment(&self.config.workspace.failure_artifact)
            && let Err(e) = self.ticketing.add_comment(&event.card_id, &comment).await
        {
            tracing::warn!(card_id = %event.card_id, error = %e, "failed to post result comment");
        }
        if let Err(e) = self
            .ticketing
            .move_card(&event.card_id, &trello.review_list)
            .await
        {
            tracing::warn!(card_id = %event.card_id, error = %e, "failed to move card to review");
        }

        Ok(outcome)
    }

    /// Everything that happens inside the workspace, up to the pull request.
    async fn deliver(
        &self,
        session: &WorkspaceSession,
        card_id: &str,
        title: &str,
        description: &str,
    ) -> Result<RunOutcome, PipelineError> {
        let branch = branch_name_for(&self.config.workspace.branch_prefix, card_id);
        session.create_branch(&branch).await?;

        let agent = EditAgent::new(Arc::clone(&self.model), self.config.model.max_rounds);
        let raw = match agent.propose(session.path(), title, description).await? {
            AgentOutcome::Proposal(raw) => raw,
            AgentOutcome::NoSolution { rounds } => return Err(PipelineError::NoSolution { rounds }),
        };

        let proposal = EditProposal::parse(&raw)?;
        let target = proposal.primary_target().to_string();
        // A missing target is patched as empty content and ends in a mismatch.
        let original = session.read_file(&target).await?.unwrap_or_default();
        let result = proposal.apply_primary(&original);
        tracing::info!(
            card_id,
            branch = %branch,
            target = %target,
            applied = result.applied_count(),
            attempted = result.outcomes.len(),
            "applied proposal"
        );

        let patched = match result.ensure_applied(&target) {
            Ok(result) => {
                session.write_file(&target, &result.final_content).await?;
                session
                    .commit(&[target.as_str()], &format!("Fix: {} (AI Search/Replace)", title))
                    .await?;
                Ok(result.applied_count())
            }
            Err(mismatch) => {
                tracing::warn!(card_id, error = %mismatch, "no block applied, committing failure artifact");
                let artifact = &self.config.workspace.failure_artifact;
                session.write_file(artifact, &raw).await?;
                session
                    .commit(&[artifact.as_str()], "Docs: AI suggested solution but failed to apply")
                    .await?;
                Err(mismatch)
            }
        };

        session.push(&branch).await?;
        let pr = self
            .hosting
            .create_pull_request(&PullRequestRequest {
                title: format!("AI Feat: {}", title),
                body: format!(
                    "🤖 **AI Agent PR**\n\n**Task:** {}\n**Request:** {}",
                    title, description
                ),
                head: branch.clone(),
                base: self.config.github.base_branch.clone(),
            })
            .await?;
        tracing::info!(card_id, pr_url = %pr.html_url, number = ?pr.number, "pull request opened");

        Ok(match patched {
            Ok(applied) => RunOutcome::Applied {
                pr_url: pr.html_url,
                branch,
                applied,
            },
            Err(mismatch) => RunOutcome::ArtifactOnly {
                pr_url: pr.html_url,
                branch,
                mismatch,
            },
        })
    }
}
