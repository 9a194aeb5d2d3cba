//! Mock database clients for testing.
//!
//! Provides in-memory implementations that return canned catalog and query
//! results and record how often they were called.

use super::{ColumnInfo, DatabaseClient, QueryResult, SchemaDescription, Value};
use crate::error::{AskError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A mock database client that returns predefined results.
#[derive(Debug, Default)]
pub struct MockDatabaseClient {
    schema: SchemaDescription,
    result: Option<QueryResult>,
    catalog_delay: Duration,
    query_delay: Duration,
    catalog_calls: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

impl MockDatabaseClient {
    /// Creates a new mock database client with an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new mock database client with the given schema.
    pub fn with_schema(schema: SchemaDescription) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    /// Returns this result for every executed statement.
    pub fn with_result(mut self, result: QueryResult) -> Self {
        self.result = Some(result);
        self
    }

    /// Delays every catalog read, to widen race windows in tests.
    pub fn with_catalog_delay(mut self, delay: Duration) -> Self {
        self.catalog_delay = delay;
        self
    }

    /// Delays every query, to exercise deadlines.
    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = delay;
        self
    }

    /// Number of catalog reads served so far.
    pub fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }

    /// Statements executed so far, in call order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|sqls| sqls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn introspect_schema(&self, namespace: &str) -> Result<SchemaDescription> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if !self.catalog_delay.is_zero() {
            tokio::time::sleep(self.catalog_delay).await;
        }

        let mut schema = self.schema.clone();
        if schema.namespace.is_empty() {
            schema.namespace = namespace.to_string();
        }
        Ok(schema)
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(sql.to_string());
        }
        if !self.query_delay.is_zero() {
            tokio::time::sleep(self.query_delay).await;
        }

        if let Some(result) = &self.result {
            return Ok(result.clone());
        }

        if !sql.trim_start().to_uppercase().starts_with("SELECT") {
            return Err(AskError::NoResultSet);
        }

        let columns = vec![ColumnInfo::new("result", "TEXT")];
        let rows = vec![vec![Value::String(format!("Mock result for: {sql}"))]];
        Ok(QueryResult::with_data(columns, rows).with_execution_time(Duration::from_millis(1)))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A database client whose every operation fails with the given error.
#[derive(Debug, Clone)]
pub struct FailingDatabaseClient {
    error: AskError,
}

impl FailingDatabaseClient {
    /// Creates a client failing with `error`.
    pub fn new(error: AskError) -> Self {
        Self { error }
    }

    /// Creates a client that behaves like an unreachable store.
    pub fn unreachable() -> Self {
        Self::new(AskError::connection(
            "Cannot connect to localhost:5432. Check that the server is running.",
        ))
    }
}

#[async_trait]
impl DatabaseClient for FailingDatabaseClient {
    async fn introspect_schema(&self, _namespace: &str) -> Result<SchemaDescription> {
        Err(match &self.error {
            AskError::CatalogUnavailable(msg) | AskError::Connection(msg) => {
                AskError::catalog(msg.clone())
            }
            other => AskError::catalog(other.to_string()),
        })
    }

    async fn execute_query(&self, _sql: &str) -> Result<QueryResult> {
        Err(self.error.clone())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
