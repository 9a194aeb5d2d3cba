//! Deadline-bounded query execution.
//!
//! Runs SQL verbatim against the store and materializes the full result. The
//! store client owns connection acquisition and release; this layer adds the
//! client-side deadline and timing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::db::{DatabaseClient, QueryResult};
use crate::error::{AskError, Result};

/// Executes SQL against the relational store.
pub struct QueryExecutor {
    db: Arc<dyn DatabaseClient>,
    timeout: Duration,
}

impl QueryExecutor {
    /// Creates an executor with a per-query deadline.
    pub fn new(db: Arc<dyn DatabaseClient>, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    /// Returns the per-query deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `sql` and returns every row it produces.
    ///
    /// Fails with `NoResultSet` if the statement yields no tabular result and
    /// with `Execution` if the store rejects it or the deadline elapses.
    pub async fn run(&self, sql: &str) -> Result<QueryResult> {
        debug!(sql_len = sql.len(), "Executing query");
        let start = Instant::now();

        let result = tokio::time::timeout(self.timeout, self.db.execute_query(sql))
            .await
            .map_err(|_| {
                AskError::execution(format!(
                    "Query timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })??;

        let execution_time = start.elapsed();
        info!(
            rows = result.row_count(),
            columns = result.columns.len(),
            duration_ms = execution_time.as_millis() as u64,
            "Query executed"
        );

        Ok(result.with_execution_time(execution_time))
    }
}
