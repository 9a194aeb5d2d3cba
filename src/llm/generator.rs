//! Natural-language to SQL generation.
//!
//! One question becomes one completion request: the schema-grounded system
//! instruction plus the question, sampled at temperature zero. The cleaned
//! answer is either SQL or the refusal token.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{AskError, Result};
use crate::llm::parser::clean_response;
use crate::llm::prompt::{build_messages, PromptTemplate};
use crate::llm::LlmClient;

/// Outcome of a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    /// A SQL statement to execute.
    Sql(String),
    /// The model judged the question out of domain.
    Refusal,
}

impl Generation {
    /// Returns the SQL, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Sql(sql) => Some(sql),
            Self::Refusal => None,
        }
    }
}

/// Turns a question and a rendered schema into SQL or a refusal.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Generates SQL for `question` against `schema`.
    ///
    /// Fails with `EmptyGeneration` when the model produced no usable text.
    async fn generate(&self, question: &str, schema: &str) -> Result<Generation>;
}

/// Recognizes the refusal token in a cleaned model answer.
///
/// Matching ignores case, surrounding quotes or backticks, and trailing `.`
/// or `!`. Anything else around the token is not a refusal.
#[derive(Debug, Clone)]
pub struct RefusalMatcher {
    pattern: Regex,
}

impl RefusalMatcher {
    /// Creates a matcher for `token`.
    pub fn new(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AskError::config("Refusal token must not be empty"));
        }

        let pattern = format!(
            r#"(?i)^["'`]*\s*{}\s*[.!]*\s*["'`]*\s*[.!]*$"#,
            regex::escape(token)
        );
        let pattern = Regex::new(&pattern)
            .map_err(|e| AskError::config(format!("Invalid refusal token: {e}")))?;

        Ok(Self { pattern })
    }

    /// Returns true if `answer` is the refusal token.
    pub fn is_refusal(&self, answer: &str) -> bool {
        self.pattern.is_match(answer.trim())
    }
}

/// SQL generator backed by an LLM completion client.
pub struct LlmSqlGenerator {
    client: Arc<dyn LlmClient>,
    template: PromptTemplate,
    refusal: RefusalMatcher,
}

impl LlmSqlGenerator {
    /// Creates a generator using `template` and its refusal token.
    pub fn new(client: Arc<dyn LlmClient>, template: PromptTemplate) -> Result<Self> {
        let refusal = RefusalMatcher::new(template.refusal_token())?;
        Ok(Self {
            client,
            template,
            refusal,
        })
    }
}

#[async_trait]
impl SqlGenerator for LlmSqlGenerator {
    async fn generate(&self, question: &str, schema: &str) -> Result<Generation> {
        let messages = build_messages(self.template.render(schema), question);
        let start = Instant::now();

        let raw = self
            .client
            .complete(&messages)
            .await?
            .ok_or(AskError::EmptyGeneration)?;

        let answer = clean_response(&raw);
        let duration_ms = start.elapsed().as_millis() as u64;

        if answer.is_empty() {
            return Err(AskError::EmptyGeneration);
        }

        if self.refusal.is_refusal(&answer) {
            info!(duration_ms, "Model refused the question");
            return Ok(Generation::Refusal);
        }

        info!(duration_ms, sql_len = answer.len(), "SQL generated");
        debug!(sql = %answer, "Generated SQL");
        Ok(Generation::Sql(answer))
    }
}
