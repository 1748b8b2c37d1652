use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use super::support::{sample_triple, FlakyEngine, RecordingEngine};
use crate::classify::{classify, classify_read_only, Operation};
use crate::engine::{GraphEngine, OxigraphEngine};
use crate::error::StoreError;
use crate::executor::{ExecutorConfig, TransactionalExecutor};

fn executor_with(engine: Arc<dyn GraphEngine>, timeout: Duration) -> TransactionalExecutor {
    TransactionalExecutor::new(engine, ExecutorConfig { query_timeout: timeout })
}

fn update_op(text: &str) -> crate::UpdateOperation {
    match classify(text).unwrap() {
        Operation::Update(op) => op,
        Operation::Read(_) => panic!("expected update"),
    }
}

#[tokio::test]
async fn ask_round_trip_through_embedded_engine() {
    let engine = Arc::new(OxigraphEngine::in_memory().unwrap());
    let executor = executor_with(engine, Duration::from_secs(5));

    executor
        .write(&update_op(
            "INSERT DATA { GRAPH <urn:g> { <urn:a> <urn:b> <urn:c> } }",
        ))
        .await
        .unwrap();

    let ask = classify_read_only("ASK { GRAPH <urn:g> { <urn:a> <urn:b> <urn:c> } }").unwrap();
    let result = executor
        .read(&ask, Some("application/sparql-results+json"))
        .await
        .unwrap();
    assert_eq!(result.content_type, "application/sparql-results+json");
    assert!(String::from_utf8(result.body).unwrap().contains("true"));
}

#[tokio::test]
async fn select_and_construct_round_trip() {
    let engine = Arc::new(OxigraphEngine::in_memory().unwrap());
    let executor = executor_with(engine, Duration::from_secs(5));

    executor
        .write(&update_op("INSERT DATA { <urn:a> <urn:b> <urn:c> }"))
        .await
        .unwrap();

    let select = classify_read_only("SELECT ?s WHERE { ?s <urn:b> <urn:c> }").unwrap();
    let result = executor.read(&select, None).await.unwrap();
    assert!(String::from_utf8(result.body).unwrap().contains("urn:a"));

    let construct =
        classify_read_only("CONSTRUCT { ?s ?p ?o } WHERE { ?s ?p ?o }").unwrap();
    let result = executor.read(&construct, Some("application/n-triples")).await.unwrap();
    assert_eq!(result.content_type, "application/n-triples");
    assert!(String::from_utf8(result.body).unwrap().contains("<urn:a> <urn:b> <urn:c>"));
}

#[tokio::test]
async fn bulk_load_lands_in_target_graph() {
    let engine = Arc::new(OxigraphEngine::in_memory().unwrap());
    let executor = executor_with(engine, Duration::from_secs(5));

    let triples: Vec<_> = (0..5).map(sample_triple).collect();
    executor.load("urn:graph:data", &triples).await.unwrap();

    let ask =
        classify_read_only("ASK { GRAPH <urn:graph:data> { <urn:s:3> <urn:p> <urn:o:3> } }")
            .unwrap();
    let result = executor.read(&ask, None).await.unwrap();
    assert!(String::from_utf8(result.body).unwrap().contains("true"));
}

#[tokio::test]
async fn read_timeout_aborts_and_surfaces_timeout_error() {
    let engine = Arc::new(FlakyEngine::stalling(Duration::from_secs(30)));
    let aborted = Arc::clone(&engine.aborted);
    let executor = executor_with(engine, Duration::from_millis(50));

    let ask = classify_read_only("ASK { ?s ?p ?o }").unwrap();
    match executor.read(&ask, None).await {
        Err(StoreError::Timeout { timeout }) => assert_eq!(timeout, Duration::from_millis(50)),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(aborted.load(Ordering::SeqCst));
}

#[tokio::test]
async fn failed_read_aborts_without_committing() {
    let engine = Arc::new(FlakyEngine::failing(1));
    let aborted = Arc::clone(&engine.aborted);
    let executor = executor_with(engine, Duration::from_secs(5));

    let ask = classify_read_only("ASK { ?s ?p ?o }").unwrap();
    assert!(executor.read(&ask, None).await.is_err());
    assert!(aborted.load(Ordering::SeqCst));
}

#[tokio::test]
async fn failed_write_aborts_and_propagates() {
    let engine = Arc::new(FlakyEngine::failing(1));
    let aborted = Arc::clone(&engine.aborted);
    let executor = executor_with(engine, Duration::from_secs(5));

    match executor.write(&update_op("INSERT DATA { <urn:a> <urn:b> <urn:c> }")).await {
        Err(StoreError::TransientStorage { .. }) => {}
        other => panic!("expected transient failure, got {other:?}"),
    }
    assert!(aborted.load(Ordering::SeqCst));
}

#[tokio::test]
async fn failed_update_script_leaves_store_unchanged() {
    let engine = Arc::new(OxigraphEngine::in_memory().unwrap());
    let executor = executor_with(engine, Duration::from_secs(5));

    // The script parses but fails at apply time on the unreachable LOAD;
    // the insert in the same transaction must not become visible.
    let bad = update_op(
        "INSERT DATA { <urn:x> <urn:y> <urn:z> } ; LOAD <http://invalid.invalid/data.ttl>",
    );
    assert!(executor.write(&bad).await.is_err());

    let ask = classify_read_only("ASK { <urn:x> <urn:y> <urn:z> }").unwrap();
    let result = executor.read(&ask, None).await.unwrap();
    assert!(String::from_utf8(result.body).unwrap().contains("false"));
}

#[tokio::test]
async fn mismatched_outcome_shape_is_unsupported() {
    // The recording double answers every query with a boolean outcome, so a
    // SELECT read observes a shape it cannot serve.
    let engine = Arc::new(RecordingEngine::new(Duration::ZERO));
    let executor = executor_with(engine, Duration::from_secs(5));

    let select = classify_read_only("SELECT ?s WHERE { ?s ?p ?o }").unwrap();
    match executor.read(&select, None).await {
        Err(StoreError::UnsupportedOperationType { .. }) => {}
        other => panic!("expected unsupported operation type, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_writes_never_overlap() {
    let engine = Arc::new(RecordingEngine::new(Duration::from_millis(10)));
    let intervals = Arc::clone(&engine.write_intervals);
    let executor = Arc::new(executor_with(engine, Duration::from_secs(5)));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let executor = Arc::clone(&executor);
        handles.push(tokio::spawn(async move {
            executor
                .write(&update_op("INSERT DATA { <urn:a> <urn:b> <urn:c> }"))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut intervals = intervals.lock().unwrap().clone();
    assert_eq!(intervals.len(), 8);
    intervals.sort_by_key(|(start, _)| *start);
    for pair in intervals.windows(2) {
        let (_, first_end) = pair[0];
        let (second_start, _) = pair[1];
        assert!(
            first_end <= second_start,
            "write transactions overlapped in wall-clock time"
        );
    }
}
