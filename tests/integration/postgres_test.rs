//! Tests against a live PostgreSQL server.
//!
//! Set DATABASE_URL to run them; they are skipped otherwise.

use std::sync::Arc;

use klustercost_ask::config::ConnectionConfig;
use klustercost_ask::db::{DatabaseClient, PostgresClient, Value};
use klustercost_ask::error::AskError;

use super::common::{service_with, CannedGenerator};

/// Helper to create a test client.
fn get_test_client() -> Option<PostgresClient> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    Some(PostgresClient::new(&config))
}

#[tokio::test]
async fn test_execute_simple_select() {
    let Some(client) = get_test_client() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT 1 AS num, 'hello' AS greeting, NULL::text AS nothing")
        .await
        .unwrap();

    assert_eq!(result.column_names(), vec!["num", "greeting", "nothing"]);
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.rows[0][0], Value::Int(1));
    assert_eq!(result.rows[0][1], Value::from("hello"));
    assert_eq!(result.rows[0][2], Value::Null);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_statement_without_rows_is_no_result_set() {
    let Some(client) = get_test_client() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = client.execute_query("SET search_path TO public").await.unwrap_err();
    assert_eq!(err, AskError::NoResultSet);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_store_error_is_execution_failure() {
    let Some(client) = get_test_client() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = client
        .execute_query("SELECT * FROM klustercost_missing_table")
        .await
        .unwrap_err();
    assert!(matches!(err, AskError::Execution(msg) if msg.contains("does not exist")));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_catalog_of_unknown_namespace_is_empty() {
    let Some(client) = get_test_client() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let schema = client
        .introspect_schema("klustercost_no_such_namespace")
        .await
        .unwrap();
    assert!(schema.is_empty());

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_pipeline_against_live_store() {
    let Some(client) = get_test_client() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let db = Arc::new(client);
    let service = service_with(
        db.clone(),
        Arc::new(CannedGenerator::sql("SELECT 1 AS a, 'x' AS b")),
    );

    let output = service.answer("anything").await;
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed, serde_json::json!([{"a": 1, "b": "x"}]));

    db.close().await.unwrap();
}
