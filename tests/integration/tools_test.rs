//! The ask_db tool boundary.

use std::sync::Arc;

use klustercost_ask::config::DEFAULT_REFUSAL_MESSAGE;
use klustercost_ask::db::MockDatabaseClient;
use klustercost_ask::tools::{self, ASK_DB};
use serde_json::json;

use super::common::{pods_schema, service_with, two_pods, CannedGenerator};

#[tokio::test]
async fn test_ask_db_returns_rows_as_json_text() {
    let db = Arc::new(MockDatabaseClient::with_schema(pods_schema()).with_result(two_pods()));
    let service = service_with(
        db.clone(),
        Arc::new(CannedGenerator::sql("SELECT name, namespace FROM pods")),
    );

    let text = tools::invoke(&service, ASK_DB, r#"{"question": "list all pods"}"#).await;

    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed.as_array().map(Vec::len), Some(2));
    assert_eq!(parsed[1], json!({"name": "coredns-5c", "namespace": "kube-system"}));
}

#[tokio::test]
async fn test_ask_db_refusal_is_plain_text() {
    let db = Arc::new(MockDatabaseClient::with_schema(pods_schema()));
    let service = service_with(db.clone(), Arc::new(CannedGenerator::refusal()));

    let text = tools::invoke_call(
        &service,
        r#"{"name": "ask_db", "arguments": {"question": "delete everything"}}"#,
    )
    .await;

    assert_eq!(text, DEFAULT_REFUSAL_MESSAGE);
    assert!(db.executed().is_empty());
}

#[tokio::test]
async fn test_rejected_calls_never_reach_the_pipeline() {
    let db = Arc::new(MockDatabaseClient::with_schema(pods_schema()));
    let generator = Arc::new(CannedGenerator::sql("SELECT 1"));
    let service = service_with(db.clone(), generator.clone());

    for (name, args) in [
        ("ask_database", r#"{"question": "pods"}"#),
        (ASK_DB, r#"{"question": ""}"#),
        (ASK_DB, r#"{"question": 42}"#),
        (ASK_DB, "{"),
    ] {
        let text = tools::invoke(&service, name, args).await;
        assert!(text.starts_with("Error: "), "{text}");
    }

    assert_eq!(generator.calls(), 0);
    assert_eq!(db.catalog_calls(), 0);
}

#[test]
fn test_tool_definitions_serialize() {
    let json = serde_json::to_value(tools::tool_definitions()).unwrap();
    assert_eq!(json[0]["name"], "ask_db");
    assert_eq!(json[0]["parameters"]["type"], "object");
}
