#![allow(dead_code, clippy::unwrap_used)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gateway_triple_store::engine::{GraphEngine, GraphTransaction, QueryOutcome, TxnMode};
use gateway_triple_store::oxigraph::model::Triple;
use gateway_triple_store::{
    ExecutorConfig, ReadOperation, StoreError, TransactionalExecutor, UpdateOperation,
};
use triplestore_gateway::services::notification::{NotificationEmitter, NotificationEvent};

/// Notifier double that records every emitted event.
#[derive(Default)]
pub struct CapturingNotifier {
    pub events: Mutex<Vec<NotificationEvent>>,
}

#[async_trait]
impl NotificationEmitter for CapturingNotifier {
    async fn emit(&self, event: NotificationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl CapturingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.title.clone())
            .collect()
    }
}

/// Engine double that fails every transaction with a transient error and
/// counts how many transactions were opened.
pub struct FailingEngine {
    pub attempts: Arc<AtomicU32>,
}

impl FailingEngine {
    pub fn new() -> Self {
        Self {
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl GraphEngine for FailingEngine {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn begin(&self, _mode: TxnMode) -> Result<Box<dyn GraphTransaction>, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FailingTransaction))
    }
}

struct FailingTransaction;

#[async_trait]
impl GraphTransaction for FailingTransaction {
    async fn execute_query(&mut self, _op: &ReadOperation) -> Result<QueryOutcome, StoreError> {
        Err(injected())
    }

    async fn execute_update(&mut self, _op: &UpdateOperation) -> Result<(), StoreError> {
        Err(injected())
    }

    async fn bulk_insert(&mut self, _graph: &str, _triples: &[Triple]) -> Result<(), StoreError> {
        Err(injected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Engine double that delegates to an inner engine while recording the batch
/// size and target graph of every bulk insert, and optionally failing the
/// first N bulk inserts.
pub struct CapturingEngine {
    inner: Arc<dyn GraphEngine>,
    pub loads: Arc<Mutex<Vec<(String, usize)>>>,
    pub remaining_failures: Arc<AtomicU32>,
    /// Fail every bulk insert once this many batches have committed.
    pub poison_after: Arc<AtomicU32>,
}

impl CapturingEngine {
    pub fn wrapping(inner: Arc<dyn GraphEngine>) -> Self {
        Self {
            inner,
            loads: Arc::new(Mutex::new(Vec::new())),
            remaining_failures: Arc::new(AtomicU32::new(0)),
            poison_after: Arc::new(AtomicU32::new(u32::MAX)),
        }
    }

    pub fn failing_first(inner: Arc<dyn GraphEngine>, failures: u32) -> Self {
        let engine = Self::wrapping(inner);
        engine.remaining_failures.store(failures, Ordering::SeqCst);
        engine
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.loads.lock().unwrap().iter().map(|(_, n)| *n).collect()
    }
}

#[async_trait]
impl GraphEngine for CapturingEngine {
    fn name(&self) -> &'static str {
        "capturing"
    }

    async fn begin(&self, mode: TxnMode) -> Result<Box<dyn GraphTransaction>, StoreError> {
        Ok(Box::new(CapturingTransaction {
            inner: self.inner.begin(mode).await?,
            loads: Arc::clone(&self.loads),
            remaining_failures: Arc::clone(&self.remaining_failures),
            poison_after: Arc::clone(&self.poison_after),
        }))
    }
}

struct CapturingTransaction {
    inner: Box<dyn GraphTransaction>,
    loads: Arc<Mutex<Vec<(String, usize)>>>,
    remaining_failures: Arc<AtomicU32>,
    poison_after: Arc<AtomicU32>,
}

impl CapturingTransaction {
    fn take_scheduled_failure(&self) -> bool {
        let committed = self.loads.lock().unwrap().len() as u32;
        if committed >= self.poison_after.load(Ordering::SeqCst) {
            return true;
        }
        self.remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl GraphTransaction for CapturingTransaction {
    async fn execute_query(&mut self, op: &ReadOperation) -> Result<QueryOutcome, StoreError> {
        self.inner.execute_query(op).await
    }

    async fn execute_update(&mut self, op: &UpdateOperation) -> Result<(), StoreError> {
        if self.take_scheduled_failure() {
            return Err(injected());
        }
        self.inner.execute_update(op).await
    }

    async fn bulk_insert(&mut self, graph: &str, triples: &[Triple]) -> Result<(), StoreError> {
        if self.take_scheduled_failure() {
            return Err(injected());
        }
        self.loads
            .lock()
            .unwrap()
            .push((graph.to_string(), triples.len()));
        self.inner.bulk_insert(graph, triples).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.commit().await
    }

    async fn abort(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.abort().await
    }
}

fn injected() -> StoreError {
    StoreError::TransientStorage {
        reason: "injected failure".to_string(),
    }
}

/// Poll a condition until it holds or the deadline passes.
pub async fn wait_for<F>(mut condition: F, what: &str)
where
    F: FnMut() -> bool,
{
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        if condition() {
            return;
        }
        if std::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}

pub fn executor_for(engine: Arc<dyn GraphEngine>) -> Arc<TransactionalExecutor> {
    Arc::new(TransactionalExecutor::new(
        engine,
        ExecutorConfig {
            query_timeout: std::time::Duration::from_secs(5),
        },
    ))
}
