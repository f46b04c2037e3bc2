//! Webhook gateway command (`cardsmith serve`).

use std::sync::Arc;

use anyhow::Result;

use cardsmith::agent::OpenAiChatModel;
use cardsmith::clients::{GitHubClient, TrelloClient};
use cardsmith::config::AppConfig;
use cardsmith::gateway::{GatewayState, ServerConfig, start_server};
use cardsmith::pipeline::{PipelineRunner, SpawnDispatcher};

pub async fn cmd_serve(config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    for warning in config.validate() {
        tracing::warn!(%warning, "configuration problem");
    }

    let server = ServerConfig {
        host: host.unwrap_or_else(|| config.server.host.clone()),
        port: port.unwrap_or(config.server.port),
    };
    let bot_username = config.trello.bot_username.clone();

    let config = Arc::new(config);
    let runner = PipelineRunner::new(
        Arc::clone(&config),
        Arc::new(TrelloClient::from_config(&config.trello)),
        Arc::new(GitHubClient::from_config(&config.github)),
        Arc::new(OpenAiChatModel::from_config(&config.model)),
    );

    let state = Arc::new(GatewayState {
        bot_username,
        dispatcher: Arc::new(SpawnDispatcher::new(Arc::new(runner))),
    });

    start_server(server, state).await
}
