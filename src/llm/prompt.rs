//! Prompt construction for LLM requests.
//!
//! Builds the single system instruction that grounds generation in the
//! current schema snapshot.

use crate::config::DEFAULT_REFUSAL_TOKEN;
use crate::llm::types::Message;

const SCHEMA_PLACEHOLDER: &str = "{schema}";
const REFUSAL_PLACEHOLDER: &str = "{refusal_token}";

/// Domain-context template used when no prompt file is configured.
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"You are a SQL assistant for a PostgreSQL database that monitors the resource usage and cost of a Kubernetes cluster. Translate the user's question into a single SQL query.

DATABASE SCHEMA:
{schema}

DOMAIN NOTES:
- Nodes are the machines of the cluster. price_per_hour is the hourly cost of a node and may be NULL until it has been priced.
- Owners are the workloads (Deployments, ReplicaSets, StatefulSets, DaemonSets, Jobs) that own pods; own_kind is the workload kind and owner_* columns reference the parent workload.
- Services expose pods; selector and app_label link a service to the pods it targets.
- Pod usage rows record CPU and memory consumption per pod, namespace and node over time.
- labels and selector columns hold serialized Kubernetes label maps.

INSTRUCTIONS:
- Produce exactly one read-only SELECT statement (a WITH ... SELECT is fine).
- Always qualify table names with their schema, exactly as listed above.
- Quote identifiers that contain upper-case letters or special characters with double quotes.
- Only use tables and columns that appear in the schema above, joining through the columns they share.
- Return raw SQL only: no explanations, no comments, no markdown code fences.
- Never write INSERT, UPDATE, DELETE, DDL, or any statement that changes data.
- If the question cannot be answered from this schema, or asks about anything other than this cluster's resources and costs, reply with exactly {refusal_token} and nothing else."#;

/// A domain-context template with `{schema}` and `{refusal_token}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
    refusal_token: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT_TEMPLATE, DEFAULT_REFUSAL_TOKEN)
    }
}

impl PromptTemplate {
    /// Creates a template.
    pub fn new(template: impl Into<String>, refusal_token: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            refusal_token: refusal_token.into(),
        }
    }

    /// Returns the refusal token the model is told to use.
    pub fn refusal_token(&self) -> &str {
        &self.refusal_token
    }

    /// Renders the system instruction for a schema snapshot.
    pub fn render(&self, schema: &str) -> String {
        build_system_prompt(&self.template, schema, &self.refusal_token)
    }
}

/// Builds the system prompt with the schema and refusal token injected.
///
/// A template without a `{schema}` placeholder gets the schema appended.
pub fn build_system_prompt(template: &str, schema: &str, refusal_token: &str) -> String {
    // Schema text is inserted last and never rescanned for placeholders.
    let prompt = template.replace(REFUSAL_PLACEHOLDER, refusal_token);

    if prompt.contains(SCHEMA_PLACEHOLDER) {
        prompt.replace(SCHEMA_PLACEHOLDER, schema)
    } else {
        format!("{}\n\nDATABASE SCHEMA:\n{}", prompt.trim_end(), schema)
    }
}

/// Builds the complete message list for one generation request.
pub fn build_messages(system_prompt: String, question: &str) -> Vec<Message> {
    vec![Message::system(system_prompt), Message::user(question)]
}
