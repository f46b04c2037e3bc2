//! Inbound webhook gateway.
//!
//! | Route           | Purpose                                     |
//! |-----------------|---------------------------------------------|
//! | `POST /webhook` | Trello action events; may dispatch a run    |
//! | `HEAD /webhook` | Callback URL probe                          |
//! | `GET /health`   | Liveness                                    |

pub mod server;
pub mod webhook;

pub use server::{GatewayState, ServerConfig, SharedState, build_router, start_server};
pub use webhook::{WebhookPayload, ticket_event};
