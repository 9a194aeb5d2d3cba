//! Tool boundary.
//!
//! Exposes the question pipeline as a single tool, `ask_db(question) -> string`,
//! for whatever tool-calling transport wraps it. Every invocation returns text;
//! malformed calls become error text rather than failures.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::service::QueryService;

/// Name of the question tool.
pub const ASK_DB: &str = "ask_db";

/// Tool definition for function calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Input parameters for the ask_db tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AskDbInput {
    pub question: String,
}

/// A tool call payload: `{"name": "...", "arguments": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Returns the definition of the ask_db tool.
pub fn ask_db_definition() -> ToolDefinition {
    ToolDefinition {
        name: ASK_DB.to_string(),
        description: "Ask a natural-language question about the Kubernetes cluster cost \
                      database. The question is converted to a read-only SQL query, executed, \
                      and the resulting rows are returned as a JSON array of objects."
            .to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to answer, e.g. \"Which nodes cost the most per hour?\""
                }
            },
            "required": ["question"]
        }),
    }
}

/// Returns every tool this crate exposes.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![ask_db_definition()]
}

/// Invokes tool `name` with JSON-encoded arguments.
pub async fn invoke(service: &Arc<QueryService>, name: &str, args_json: &str) -> String {
    if name != ASK_DB {
        warn!(tool = name, "Unknown tool requested");
        return format!("Error: Unknown tool: {name}");
    }

    let input: AskDbInput = match serde_json::from_str(args_json) {
        Ok(input) => input,
        Err(e) => {
            warn!(error = %e, "Malformed tool arguments");
            return format!("Error: Invalid arguments for {ASK_DB}: {e}");
        }
    };

    let question = input.question.trim();
    if question.is_empty() {
        return "Error: Question must not be empty".to_string();
    }

    Arc::clone(service).answer_isolated(question).await
}

/// Invokes a whole tool call payload.
pub async fn invoke_call(service: &Arc<QueryService>, call_json: &str) -> String {
    match serde_json::from_str::<ToolCall>(call_json) {
        Ok(call) => invoke(service, &call.name, &call.arguments.to_string()).await,
        Err(e) => format!("Error: Invalid tool call: {e}"),
    }
}
