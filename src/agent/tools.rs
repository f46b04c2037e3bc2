//! The single tool offered to the model.

use std::path::Path;

use serde::Deserialize;

use super::model::{ChatMessage, FunctionSpec, ToolCall, ToolDefinition};
use crate::workspace::read_workspace_file;

pub const READ_FILE: &str = "read_file";

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    file_path: String,
}

pub fn read_file_tool() -> ToolDefinition {
    ToolDefinition {
        kind: "function",
        function: FunctionSpec {
            name: READ_FILE,
            description: "Reads the content of a file in the repository",
            parameters: serde_json::json!({
                "type": "object",
                "properties": {"file_path": {"type": "string"}},
                "required": ["file_path"],
            }),
        },
    }
}

/// Resolve one tool call against the workspace. Never fails: problems become the tool output.
pub async fn resolve_tool_call(root: &Path, call: &ToolCall) -> ChatMessage {
    let content = match call.function.name.as_str() {
        READ_FILE => match serde_json::from_str::<ReadFileArgs>(&call.function.arguments) {
            Ok(args) => {
                tracing::debug!(file_path = %args.file_path, "model read file");
                read_workspace_file(root, &args.file_path).await
            }
            Err(e) => format!("Error reading file: invalid arguments: {}", e),
        },
        other => {
            tracing::warn!(tool = other, "model called unknown tool");
            format!("Error: unknown tool '{}'", other)
        }
    };
    ChatMessage::Tool {
        tool_call_id: call.id.clone(),
        name: call.function.name.clone(),
        content,
    }
}
