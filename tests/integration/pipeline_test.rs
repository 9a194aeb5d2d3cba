//! End-to-end question pipeline tests over mock collaborators.

use std::sync::Arc;

use klustercost_ask::config::{Config, DEFAULT_REFUSAL_MESSAGE};
use klustercost_ask::db::{
    ColumnInfo, FailingDatabaseClient, MockDatabaseClient, QueryResult, Value,
};
use klustercost_ask::error::AskError;
use klustercost_ask::llm::{LlmClient, MockLlmClient, Role};
use klustercost_ask::service::QueryService;
use pretty_assertions::assert_eq;
use serde_json::json;

use super::common::{
    pods_schema, service_with, two_pods, CannedGenerator, PanickingGenerator, RejectingStore,
};

fn service_over(db: Arc<MockDatabaseClient>, llm: Arc<MockLlmClient>) -> Arc<QueryService> {
    Arc::new(QueryService::from_config(&Config::default(), db, llm).unwrap())
}

#[tokio::test]
async fn test_list_all_pods_scenario() {
    let db = Arc::new(MockDatabaseClient::with_schema(pods_schema()).with_result(two_pods()));
    let generator = Arc::new(CannedGenerator::sql("SELECT name, namespace FROM pods"));
    let service = service_with(db.clone(), generator);

    let output = service.answer("list all pods").await;

    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(
        parsed,
        json!([
            {"name": "api-7d9f", "namespace": "default"},
            {"name": "coredns-5c", "namespace": "kube-system"}
        ])
    );
    assert_eq!(db.executed(), vec!["SELECT name, namespace FROM pods"]);
}

#[tokio::test]
async fn test_delete_everything_is_refused() {
    let db = Arc::new(MockDatabaseClient::with_schema(pods_schema()).with_result(two_pods()));
    let generator = Arc::new(CannedGenerator::refusal());
    let service = service_with(db.clone(), generator.clone());

    let output = service.answer("delete everything").await;

    assert_eq!(output, DEFAULT_REFUSAL_MESSAGE);
    assert_eq!(generator.calls(), 1);
    assert!(db.executed().is_empty());
}

#[tokio::test]
async fn test_refusal_token_from_model_short_circuits() {
    let db = Arc::new(MockDatabaseClient::with_schema(pods_schema()).with_result(two_pods()));
    let llm = Arc::new(MockLlmClient::new().with_fallback("  `Refuse.`  "));
    let service = service_over(db.clone(), llm.clone());

    assert_eq!(service.answer("delete everything").await, DEFAULT_REFUSAL_MESSAGE);
    assert_eq!(llm.calls(), 1);
    assert!(db.executed().is_empty());
}

#[tokio::test]
async fn test_rows_round_trip_through_output() {
    let result = QueryResult::with_data(
        vec![ColumnInfo::new("a", "int4"), ColumnInfo::new("b", "text")],
        vec![vec![Value::Int(1), Value::from("x")]],
    );
    let db = Arc::new(MockDatabaseClient::with_schema(pods_schema()).with_result(result));
    let service = service_with(db, Arc::new(CannedGenerator::sql("SELECT 1 AS a, 'x' AS b")));

    let output = service.answer("anything").await;

    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed, json!([{"a": 1, "b": "x"}]));
    assert_eq!(output, "[\n  {\n    \"a\": 1,\n    \"b\": \"x\"\n  }\n]");
}

#[tokio::test]
async fn test_empty_result_is_empty_array() {
    let result = QueryResult::with_data(vec![ColumnInfo::new("name", "text")], vec![]);
    let db = Arc::new(MockDatabaseClient::with_schema(pods_schema()).with_result(result));
    let service = service_with(db, Arc::new(CannedGenerator::sql("SELECT name FROM pods")));

    assert_eq!(service.answer("pods in a missing namespace").await, "[]");
}

#[tokio::test]
async fn test_execution_failure_contains_sql() {
    let sql = "SELECT name FROM klustercost.pods WHERE nmespace = 'default'";
    let db = Arc::new(RejectingStore::new(AskError::execution(
        "column \"nmespace\" does not exist",
    )));
    let service = service_with(db.clone(), Arc::new(CannedGenerator::sql(sql)));

    let output = service.answer("pods in default").await;

    assert_eq!(
        output,
        format!(
            "Error: Query error: column \"nmespace\" does not exist\nGenerated SQL was:\n{sql}"
        )
    );
    assert_eq!(*db.executed.lock().unwrap(), vec![sql.to_string()]);
}

#[tokio::test]
async fn test_no_result_set_contains_sql() {
    let sql = "SELECT pg_sleep(0)";
    let db = Arc::new(RejectingStore::new(AskError::NoResultSet));
    let service = service_with(db, Arc::new(CannedGenerator::sql(sql)));

    let err = service.ask("sleep").await.unwrap_err();

    assert_eq!(err.error, AskError::NoResultSet);
    assert_eq!(err.sql.as_deref(), Some(sql));
    assert!(err.to_string().ends_with(&format!("Generated SQL was:\n{sql}")));
}

#[tokio::test]
async fn test_rejected_mutation_contains_sql_and_skips_store() {
    let mutating = "UPDATE pods SET name = 'x'";
    let db = Arc::new(MockDatabaseClient::with_schema(pods_schema()).with_result(two_pods()));
    let service = service_with(db.clone(), Arc::new(CannedGenerator::sql(mutating)));

    let output = service.answer("rename pods").await;

    assert!(output.starts_with("Error: Query error:"), "{output}");
    assert!(output.ends_with(&format!("Generated SQL was:\n{mutating}")));
    assert!(db.executed().is_empty());
}

#[tokio::test]
async fn test_unreachable_catalog_has_no_sql() {
    let llm = Arc::new(MockLlmClient::new().with_fallback("SELECT name FROM klustercost.pods"));
    let db = Arc::new(FailingDatabaseClient::unreachable());

    let service = QueryService::from_config(&Config::default(), db, llm.clone()).unwrap();
    let err = service.ask("pods").await.unwrap_err();

    assert!(matches!(err.error, AskError::CatalogUnavailable(_)));
    assert_eq!(err.sql, None);
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_multiple_statements_never_reach_the_store() {
    let sql = "SELECT name FROM pods; DELETE FROM pods";
    let db = Arc::new(MockDatabaseClient::with_schema(pods_schema()).with_result(two_pods()));
    let service = service_with(db.clone(), Arc::new(CannedGenerator::sql(sql)));

    let output = service.answer("pods").await;

    assert!(output.contains("2 statements"), "{output}");
    assert!(output.contains(sql));
    assert!(db.executed().is_empty());
}

#[tokio::test]
async fn test_answer_never_fails_on_collaborator_failures() {
    let schema_db = || Arc::new(MockDatabaseClient::with_schema(pods_schema()));

    let cases: Vec<(Arc<QueryService>, &str)> = vec![
        (
            Arc::new(
                QueryService::from_config(
                    &Config::default(),
                    Arc::new(FailingDatabaseClient::unreachable()),
                    Arc::new(MockLlmClient::new()),
                )
                .unwrap(),
            ),
            "catalog unavailable",
        ),
        (
            service_over(schema_db(), Arc::new(MockLlmClient::empty())),
            "empty response",
        ),
        (
            service_over(
                schema_db(),
                Arc::new(MockLlmClient::failing(AskError::llm("HTTP 429 rate limited"))),
            ),
            "rate limited",
        ),
        (
            service_over(
                schema_db(),
                Arc::new(MockLlmClient::new().with_fallback("here is your answer")),
            ),
            "could not be parsed",
        ),
        (
            service_with(schema_db(), Arc::new(PanickingGenerator)),
            "aborted",
        ),
    ];

    for (service, expected) in cases {
        let output = Arc::clone(&service).answer_isolated("which pods cost most?").await;
        assert!(output.starts_with("Error: "), "{output}");
        assert!(output.contains(expected), "expected {expected:?} in {output:?}");
    }
}

#[tokio::test]
async fn test_generation_is_deterministic_for_fixed_inputs() {
    let db = Arc::new(MockDatabaseClient::with_schema(pods_schema()).with_result(two_pods()));
    let llm = Arc::new(
        MockLlmClient::new().with_response("pods", "SELECT name, namespace FROM klustercost.pods"),
    );
    let service = service_over(db.clone(), llm.clone());

    let first = service.ask("list all pods").await.unwrap();
    let second = service.ask("list all pods").await.unwrap();

    assert_eq!(first.sql(), second.sql());
    assert_eq!(first.render().unwrap(), second.render().unwrap());
    assert_eq!(db.executed().len(), 2);
    assert_eq!(db.executed()[0], db.executed()[1]);

    let prompts = llm.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0], prompts[1]);
}

#[tokio::test]
async fn test_prompt_is_single_system_and_user_exchange() {
    let db = Arc::new(MockDatabaseClient::with_schema(pods_schema()).with_result(two_pods()));
    let llm = Arc::new(MockLlmClient::new().with_fallback("SELECT name FROM klustercost.pods"));
    let service = service_over(db, llm.clone());

    service.answer("list all pods").await;

    let prompts = llm.prompts();
    let messages = &prompts[0];
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::System);
    assert!(messages[0]
        .content
        .contains("klustercost.pods: name (text), namespace (text)"));
    assert!(messages[0].content.contains("REFUSE"));
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[1].content, "list all pods");
}

#[tokio::test]
async fn test_fenced_sql_from_model_is_executed() {
    let db = Arc::new(MockDatabaseClient::with_schema(pods_schema()).with_result(two_pods()));
    let llm = Arc::new(
        MockLlmClient::new().with_fallback("```sql\nSELECT name, namespace FROM pods;\n```"),
    );
    let service = service_over(db.clone(), llm);

    let answer = service.ask("list all pods").await.unwrap();

    assert_eq!(answer.sql(), Some("SELECT name, namespace FROM pods;"));
    assert_eq!(db.executed(), vec!["SELECT name, namespace FROM pods;"]);
}

#[tokio::test]
async fn test_concurrent_questions_share_one_catalog_fetch() {
    let db = Arc::new(
        MockDatabaseClient::with_schema(pods_schema())
            .with_result(two_pods())
            .with_catalog_delay(std::time::Duration::from_millis(30)),
    );
    let service = service_with(
        db.clone(),
        Arc::new(CannedGenerator::sql("SELECT name, namespace FROM pods")),
    );

    let answers = futures::future::join_all(
        (0..8).map(|_| Arc::clone(&service).answer_isolated("list all pods")),
    )
    .await;

    assert_eq!(db.catalog_calls(), 1);
    assert_eq!(db.executed().len(), 8);
    assert!(answers.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn test_llm_client_trait_object_is_usable() {
    let llm: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new());
    let db = Arc::new(MockDatabaseClient::with_schema(pods_schema()));
    let service = QueryService::from_config(&Config::default(), db, llm).unwrap();

    assert_eq!(service.answer("what's the weather?").await, DEFAULT_REFUSAL_MESSAGE);
}
