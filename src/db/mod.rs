//! Relational store abstraction.
//!
//! Provides a trait-based interface for the two store surfaces the pipeline
//! depends on: the metadata catalog and statement execution.

mod mock;
mod postgres;
mod schema;
mod types;

pub use mock::{FailingDatabaseClient, MockDatabaseClient};
pub use postgres::PostgresClient;
pub use schema::{Column, ForeignKey, SchemaDescription, Table};
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::error::Result;
use async_trait::async_trait;

/// Trait defining the interface for database clients.
///
/// Every call acquires its own connection and releases it before returning,
/// on success and on failure alike.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Reads the column catalog of one schema namespace.
    ///
    /// Fails with `CatalogUnavailable` when the store cannot be reached or
    /// rejects the catalog query.
    async fn introspect_schema(&self, namespace: &str) -> Result<SchemaDescription>;

    /// Executes a SQL statement verbatim and materializes its rows.
    ///
    /// Fails with `NoResultSet` when the statement yields no tabular result
    /// and with `Execution` when the store rejects it.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Closes the underlying connections.
    async fn close(&self) -> Result<()>;
}
