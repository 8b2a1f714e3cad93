//! Pipeline Execution Tests
//!
//! Tests for:
//! - Executing compiled pipelines through the in-memory executor
//! - Streaming rows across partial responses
//! - Consistency selectors and explain mode on the request
//! - Decoding explain statistics

use docpipe::explain::{encode_string_value, STRING_VALUE_TYPE};
use docpipe::prelude::*;
use docpipe::protocol::{ConsistencySelector, ExplainStatsPayload};
use docpipe::{
    ClientError, ExecutePipelineResponse, InMemoryExecutor, PipelineClient, Row, WireDocument,
};
use docpipe_core::WireValue;
use futures::TryStreamExt;
use serde_json::json;

fn client() -> PipelineClient<InMemoryExecutor> {
    docpipe::logging::init_tracing("docpipe=debug");
    PipelineClient::new(InMemoryExecutor::new(), Settings::new("test-project")).unwrap()
}

fn book(id: &str, title: &str, rating: i64) -> WireDocument {
    WireDocument::new([
        ("title", WireValue::string(title)),
        ("rating", WireValue::IntegerValue(rating)),
    ])
    .with_name(format!(
        "projects/test-project/databases/(default)/documents/books/{}",
        id
    ))
}

#[tokio::test]
async fn test_execute_returns_rows() {
    let client = client();
    client.executor().push_response(ExecutePipelineResponse {
        results: vec![book("dune", "Dune", 5), book("emma", "Emma", 4)],
        execution_time: Some(Timestamp::new(1_700_000_000, 0)),
        ..Default::default()
    });

    let pipeline = client
        .pipeline()
        .collection("books")
        .unwrap()
        .filter(field("rating").greater_than(3));
    let snapshot = client.execute(&pipeline).await.unwrap();

    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.execution_time(), Some(Timestamp::new(1_700_000_000, 0)));
    let first = &snapshot.results()[0];
    assert_eq!(first.id(), Some("dune"));
    assert_eq!(first.data(), json!({"title": "Dune", "rating": 5}));

    let requests = client.executor().requests();
    assert_eq!(requests.len(), 1);
    let stages = &requests[0].structured_pipeline.pipeline.stages;
    assert_eq!(stages[0].name, "collection");
    assert_eq!(stages[1].name, "where");
    assert!(requests[0].consistency.is_none());
}

#[tokio::test]
async fn test_invalid_pipeline_never_reaches_executor() {
    let client = client();
    let pipeline = client
        .pipeline()
        .collection("books")
        .unwrap()
        .filter(field("a").equal(ConstantValue::Undefined));

    let err = client.execute(&pipeline).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Pipeline(PipelineError::Validation { .. })
    ));
    assert!(client.executor().requests().is_empty());
}

#[tokio::test]
async fn test_ignore_undefined_from_settings() {
    let settings = Settings::new("test-project").ignore_undefined_properties(true);
    let client = PipelineClient::new(InMemoryExecutor::new(), settings).unwrap();
    let pipeline = client
        .pipeline()
        .collection("books")
        .unwrap()
        .filter(field("a").equal(ConstantValue::Undefined));

    assert!(client.execute(&pipeline).await.is_ok());
}

#[tokio::test]
async fn test_execution_error_propagates() {
    let client = client();
    client.executor().push_error("deadline exceeded");
    let pipeline = client.pipeline().collection("books").unwrap();
    let err = client.execute(&pipeline).await.unwrap_err();
    assert_eq!(err.to_string(), "Execution error: deadline exceeded");
}

#[tokio::test]
async fn test_read_time_and_transaction_on_request() {
    let client = client();
    let pipeline = client.pipeline().collection("books").unwrap();

    let options = ExecuteOptions::new()
        .with_read_time(Timestamp::new(42, 0))
        .unwrap();
    client.execute_with(&pipeline, &options).await.unwrap();

    let options = ExecuteOptions::new().with_transaction(b"tx-1".to_vec()).unwrap();
    client.execute_with(&pipeline, &options).await.unwrap();

    let requests = client.executor().requests();
    assert_eq!(
        requests[0].consistency,
        Some(ConsistencySelector::ReadTime(Timestamp::new(42, 0)))
    );
    assert_eq!(
        requests[1].consistency,
        Some(ConsistencySelector::Transaction(b"tx-1".to_vec()))
    );
}

#[tokio::test]
async fn test_stream_flattens_chunks() {
    let client = client();
    client.executor().push_chunks(vec![
        ExecutePipelineResponse::with_results(vec![book("a", "A", 1)]),
        ExecutePipelineResponse::with_results(vec![book("b", "B", 2), book("c", "C", 3)]),
    ]);

    let pipeline = client.pipeline().collection("books").unwrap();
    let rows: Vec<Row> = client.stream(&pipeline).try_collect().await.unwrap();
    let ids: Vec<&str> = rows.iter().filter_map(|r| r.id()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_stream_surfaces_compile_error() {
    let client = client();
    let pipeline = client
        .pipeline()
        .collection("books")
        .unwrap()
        .filter(field("a").equal(ConstantValue::Undefined));
    let result: Result<Vec<Row>, _> = client.stream(&pipeline).try_collect().await;
    assert!(result.is_err());
    assert!(client.executor().requests().is_empty());
}

#[tokio::test]
async fn test_explain_stats_exposed() {
    let client = client();
    client.executor().push_response(ExecutePipelineResponse {
        explain_stats: Some(ExplainStatsPayload {
            data: Some(encode_string_value(r#"{"plan":{"stages":2}}"#)),
        }),
        ..Default::default()
    });

    let pipeline = client.pipeline().collection("books").unwrap();
    let options = ExecuteOptions::new().explain(ExplainMode::Analyze);
    let snapshot = client.execute_with(&pipeline, &options).await.unwrap();

    let stats = snapshot.explain_stats().expect("explain stats present");
    assert_eq!(stats.type_url(), Some(STRING_VALUE_TYPE));
    assert_eq!(stats.json().unwrap(), json!({"plan": {"stages": 2}}));
    assert_eq!(
        client.executor().requests()[0].explain_mode(),
        Some(ExplainMode::Analyze)
    );
}

#[tokio::test]
async fn test_query_conversion_executes() {
    let client = client();
    let query = Query::collection(client.database().collection("books").unwrap())
        .where_field("genre", FilterOperator::Equal, "scifi")
        .order_by("rating", Direction::Descending)
        .limit(3);
    let pipeline = client.pipeline().create_from(&query).unwrap();
    client.execute(&pipeline).await.unwrap();

    let requests = client.executor().requests();
    let names: Vec<&str> = requests[0]
        .structured_pipeline
        .pipeline
        .stages
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(names, vec!["collection", "where", "where", "sort", "limit"]);
}
