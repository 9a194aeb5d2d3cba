//! Shared fixtures for pipeline tests.

use std::sync::Arc;

use async_trait::async_trait;
use klustercost_ask::catalog::{CatalogPolicy, SchemaCatalog};
use klustercost_ask::db::{ColumnInfo, DatabaseClient, QueryResult, SchemaDescription, Value};
use klustercost_ask::error::Result;
use klustercost_ask::llm::{Generation, SqlGenerator};
use klustercost_ask::query::QueryExecutor;
use klustercost_ask::service::QueryService;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// `pods(name text, namespace text)` in the `klustercost` namespace.
pub fn pods_schema() -> SchemaDescription {
    SchemaDescription::from_catalog_rows(
        "klustercost",
        vec![
            ("pods".to_string(), "name".to_string(), "text".to_string()),
            ("pods".to_string(), "namespace".to_string(), "text".to_string()),
        ],
    )
}

/// Two pods across two namespaces.
pub fn two_pods() -> QueryResult {
    QueryResult::with_data(
        vec![
            ColumnInfo::new("name", "text"),
            ColumnInfo::new("namespace", "text"),
        ],
        vec![
            vec![Value::from("api-7d9f"), Value::from("default")],
            vec![Value::from("coredns-5c"), Value::from("kube-system")],
        ],
    )
}

/// A generator that always answers with the same canned outcome.
pub struct CannedGenerator {
    outcome: Generation,
    calls: AtomicUsize,
}

impl CannedGenerator {
    pub fn sql(sql: &str) -> Self {
        Self {
            outcome: Generation::Sql(sql.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn refusal() -> Self {
        Self {
            outcome: Generation::Refusal,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SqlGenerator for CannedGenerator {
    async fn generate(&self, _question: &str, _schema: &str) -> Result<Generation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.outcome.clone())
    }
}

/// A generator that panics mid-request.
pub struct PanickingGenerator;

#[async_trait]
impl SqlGenerator for PanickingGenerator {
    async fn generate(&self, _question: &str, _schema: &str) -> Result<Generation> {
        panic!("generator crashed");
    }
}

/// Wires a service directly from collaborators.
pub fn service_with(
    db: Arc<dyn DatabaseClient>,
    generator: Arc<dyn SqlGenerator>,
) -> Arc<QueryService> {
    let catalog = Arc::new(SchemaCatalog::new(
        Arc::clone(&db),
        CatalogPolicy::new("klustercost"),
    ));
    let executor = QueryExecutor::new(db, Duration::from_secs(5));
    Arc::new(QueryService::new(catalog, generator, executor))
}

/// A store whose catalog works but which rejects every statement.
pub struct RejectingStore {
    pub schema: SchemaDescription,
    pub error: klustercost_ask::error::AskError,
    pub executed: std::sync::Mutex<Vec<String>>,
}

impl RejectingStore {
    pub fn new(error: klustercost_ask::error::AskError) -> Self {
        Self {
            schema: pods_schema(),
            error,
            executed: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DatabaseClient for RejectingStore {
    async fn introspect_schema(&self, _namespace: &str) -> Result<SchemaDescription> {
        Ok(self.schema.clone())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        self.executed.lock().unwrap().push(sql.to_string());
        Err(self.error.clone())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
