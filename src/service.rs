//! Question service.
//!
//! Orchestrates one question end to end: schema snapshot, SQL generation,
//! read-only validation, execution and formatting. Each question is an
//! independent best-effort attempt; nothing is retried and every failure is
//! turned into text at this boundary.
//!
//! # Flow
//!
//! `SchemaCatalog::get` → `SqlGenerator::generate` → (refusal ⇒ declination
//! message) → `validate_read_only` → `QueryExecutor::run` → pretty JSON.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::catalog::{CatalogPolicy, SchemaCatalog, SchemaSnapshot};
use crate::config::{Config, DEFAULT_REFUSAL_MESSAGE};
use crate::db::{DatabaseClient, QueryResult};
use crate::error::{AskError, Result};
use crate::llm::{Generation, LlmClient, LlmSqlGenerator, PromptTemplate, SqlGenerator};
use crate::query::QueryExecutor;
use crate::safety::validate_read_only;

/// Default deadline for one generation request.
const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// A failed question, with the SQL that was attempted when there was one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineError {
    /// What went wrong.
    pub error: AskError,
    /// The generated SQL, if generation got that far.
    pub sql: Option<String>,
}

impl PipelineError {
    /// Creates an error raised before any SQL existed.
    pub fn new(error: AskError) -> Self {
        Self { error, sql: None }
    }

    /// Creates an error raised while handling `sql`.
    pub fn with_sql(error: AskError, sql: impl Into<String>) -> Self {
        Self {
            error,
            sql: Some(sql.into()),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.error)?;
        if let Some(sql) = &self.sql {
            write!(f, "\nGenerated SQL was:\n{}", sql)?;
        }
        Ok(())
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// A successful outcome of one question.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// The generated SQL ran and produced rows.
    Rows {
        /// The SQL that was executed.
        sql: String,
        /// The materialized result.
        result: QueryResult,
    },
    /// The model declined the question as out of domain.
    Refused {
        /// The declination message for the caller.
        message: String,
    },
}

impl Answer {
    /// Renders the answer as text: pretty JSON rows or the declination message.
    pub fn render(&self) -> Result<String> {
        match self {
            Self::Rows { result, .. } => result.to_json_string().map_err(|e| {
                AskError::internal(format!("Failed to serialize result rows: {e}"))
            }),
            Self::Refused { message } => Ok(message.clone()),
        }
    }

    /// Returns the executed SQL, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Rows { sql, .. } => Some(sql),
            Self::Refused { .. } => None,
        }
    }
}

/// Answers natural-language questions against the monitored schema.
pub struct QueryService {
    catalog: Arc<SchemaCatalog>,
    generator: Arc<dyn SqlGenerator>,
    executor: QueryExecutor,
    generation_timeout: Duration,
    refusal_message: String,
}

impl QueryService {
    /// Creates a service from its collaborators.
    pub fn new(
        catalog: Arc<SchemaCatalog>,
        generator: Arc<dyn SqlGenerator>,
        executor: QueryExecutor,
    ) -> Self {
        Self {
            catalog,
            generator,
            executor,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            refusal_message: DEFAULT_REFUSAL_MESSAGE.to_string(),
        }
    }

    /// Wires a service from configuration over a store and a model client.
    pub fn from_config(
        config: &Config,
        db: Arc<dyn DatabaseClient>,
        llm: Arc<dyn LlmClient>,
    ) -> Result<Self> {
        let policy = CatalogPolicy::new(config.database.schema_or_default())
            .with_ttl(config.pipeline.schema_ttl())
            .with_fetch_timeout(config.database.catalog_timeout());
        let catalog = Arc::new(SchemaCatalog::new(Arc::clone(&db), policy));

        let template = match config.pipeline.load_prompt_template()? {
            Some(text) => PromptTemplate::new(text, config.pipeline.refusal_token.clone()),
            None => PromptTemplate::new(
                crate::llm::DEFAULT_PROMPT_TEMPLATE,
                config.pipeline.refusal_token.clone(),
            ),
        };
        let generator = Arc::new(LlmSqlGenerator::new(llm, template)?);
        let executor = QueryExecutor::new(db, config.database.query_timeout());

        Ok(Self::new(catalog, generator, executor)
            .with_generation_timeout(config.llm.timeout())
            .with_refusal_message(config.pipeline.refusal_message.clone()))
    }

    /// Sets the deadline for the generation step.
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Sets the message returned for refused questions.
    pub fn with_refusal_message(mut self, message: impl Into<String>) -> Self {
        self.refusal_message = message.into();
        self
    }

    /// Returns the schema catalog.
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Returns the current schema snapshot, fetching it if needed.
    pub async fn schema(&self) -> Result<Arc<SchemaSnapshot>> {
        self.catalog.get().await
    }

    /// Replaces the schema snapshot with a fresh one from the store.
    pub async fn refresh_schema(&self) -> Result<Arc<SchemaSnapshot>> {
        info!("Refreshing schema snapshot");
        self.catalog.refresh().await
    }

    /// Answers a question, returning a typed outcome.
    pub async fn ask(&self, question: &str) -> std::result::Result<Answer, PipelineError> {
        info!("New question received");
        info!(question, "User question");
        let start = Instant::now();

        let outcome = self.run_pipeline(question).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            Ok(Answer::Rows { result, .. }) => {
                info!(rows = result.row_count(), duration_ms, "Question complete");
            }
            Ok(Answer::Refused { .. }) => {
                info!(duration_ms, "Question complete (refused)");
            }
            Err(e) => {
                error!(
                    category = e.error.category(),
                    error = %e.error,
                    sql = e.sql.as_deref().unwrap_or(""),
                    duration_ms,
                    "Question failed"
                );
            }
        }

        outcome
    }

    /// Answers a question as text. Never fails.
    pub async fn answer(&self, question: &str) -> String {
        match self.ask(question).await {
            Ok(answer) => answer
                .render()
                .unwrap_or_else(|e| PipelineError::new(e).to_string()),
            Err(e) => e.to_string(),
        }
    }

    /// Answers a question on its own task, so a panic in a collaborator is
    /// reported as an error instead of unwinding into the caller.
    pub async fn answer_isolated(self: Arc<Self>, question: &str) -> String {
        let question = question.to_string();

        match tokio::spawn(async move { self.answer(&question).await }).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "Question handler aborted");
                PipelineError::new(AskError::internal(format!(
                    "Question handler aborted: {e}"
                )))
                .to_string()
            }
        }
    }

    async fn run_pipeline(&self, question: &str) -> std::result::Result<Answer, PipelineError> {
        let snapshot = self.catalog.get().await.map_err(PipelineError::new)?;
        debug!(version = snapshot.version, "Using schema snapshot");

        let generation = tokio::time::timeout(
            self.generation_timeout,
            self.generator.generate(question, &snapshot.text),
        )
        .await
        .map_err(|_| {
            PipelineError::new(AskError::llm(format!(
                "Language model request timed out after {}ms",
                self.generation_timeout.as_millis()
            )))
        })?
        .map_err(PipelineError::new)?;

        let sql = match generation {
            Generation::Refusal => {
                warn!("Question refused by the model (off-topic)");
                return Ok(Answer::Refused {
                    message: self.refusal_message.clone(),
                });
            }
            Generation::Sql(sql) => sql,
        };

        info!(sql = %sql, "Generated SQL");

        if let Err(e) = validate_read_only(&sql) {
            warn!(reason = %e, "Generated SQL rejected before execution");
            return Err(PipelineError::with_sql(e, sql));
        }

        match self.executor.run(&sql).await {
            Ok(result) => Ok(Answer::Rows { sql, result }),
            Err(e) => Err(PipelineError::with_sql(e, sql)),
        }
    }
}
