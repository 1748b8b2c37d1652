//! Transactional executor: one storage-engine transaction per operation.
//!
//! State machine per call: Idle -> TransactionOpen -> {Committed | Aborted}.
//! Reads open a read-mode transaction and race against a timer; writes open a
//! write-mode transaction and run to completion. The engine enforces
//! single-writer exclusion; this executor never holds two write handles.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use oxigraph::model::Triple;

use crate::classify::{ReadOperation, ReadShape, UpdateOperation};
use crate::engine::{GraphEngine, GraphTransaction, QueryOutcome, TxnMode};
use crate::error::{Result, StoreError};
use crate::format::{render, SparqlResult};

#[derive(Clone, Copy, Debug)]
pub struct ExecutorConfig {
    /// Upper bound on read execution, raced via a timer. Cancellation
    /// discards the in-flight result; the underlying engine call may still
    /// run to completion in the background.
    pub query_timeout: Duration,
}

pub struct TransactionalExecutor {
    engine: Arc<dyn GraphEngine>,
    config: ExecutorConfig,
}

impl TransactionalExecutor {
    pub fn new(engine: Arc<dyn GraphEngine>, config: ExecutorConfig) -> Self {
        Self { engine, config }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Execute a read operation and serialize its outcome against the
    /// requested content type.
    pub async fn read(&self, op: &ReadOperation, accept: Option<&str>) -> Result<SparqlResult> {
        let shape = op.shape().to_string();
        let started = Instant::now();
        let mut txn = self.engine.begin(TxnMode::Read).await?;

        let outcome = match tokio::time::timeout(self.config.query_timeout, txn.execute_query(op)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                abort_quietly(txn).await;
                counter!("sparql_query_total", "shape" => shape, "result" => "error").increment(1);
                return Err(e);
            }
            Err(_) => {
                abort_quietly(txn).await;
                counter!("sparql_query_total", "shape" => shape, "result" => "timeout").increment(1);
                return Err(StoreError::Timeout {
                    timeout: self.config.query_timeout,
                });
            }
        };

        txn.commit().await?;
        check_shape(op.shape(), &outcome)?;

        histogram!("sparql_query_duration_seconds", "shape" => shape.clone())
            .record(started.elapsed().as_secs_f64());
        counter!("sparql_query_total", "shape" => shape, "result" => "ok").increment(1);

        render(&outcome, op.shape(), accept)
    }

    /// Execute an update operation inside one write transaction.
    pub async fn write(&self, op: &UpdateOperation) -> Result<()> {
        let started = Instant::now();
        let mut txn = self.engine.begin(TxnMode::Write).await?;

        if let Err(e) = txn.execute_update(op).await {
            abort_quietly(txn).await;
            counter!("sparql_update_total", "result" => "error").increment(1);
            return Err(e);
        }

        txn.commit().await?;
        histogram!("sparql_update_duration_seconds").record(started.elapsed().as_secs_f64());
        counter!("sparql_update_total", "result" => "ok").increment(1);
        Ok(())
    }

    /// Bulk-insert one batch of triples into a named graph inside one write
    /// transaction.
    pub async fn load(&self, graph: &str, triples: &[Triple]) -> Result<()> {
        let started = Instant::now();
        let mut txn = self.engine.begin(TxnMode::Write).await?;

        if let Err(e) = txn.bulk_insert(graph, triples).await {
            abort_quietly(txn).await;
            counter!("sparql_load_total", "result" => "error").increment(1);
            return Err(e);
        }

        txn.commit().await?;
        histogram!("sparql_load_duration_seconds").record(started.elapsed().as_secs_f64());
        counter!("sparql_load_total", "result" => "ok").increment(1);
        Ok(())
    }
}

fn check_shape(shape: ReadShape, outcome: &QueryOutcome) -> Result<()> {
    let compatible = matches!(
        (shape, outcome),
        (ReadShape::Ask, QueryOutcome::Boolean(_))
            | (ReadShape::Select, QueryOutcome::Solutions { .. })
            | (ReadShape::Describe, QueryOutcome::Graph(_))
            | (ReadShape::Construct, QueryOutcome::Graph(_))
    );
    if compatible {
        Ok(())
    } else {
        Err(StoreError::UnsupportedOperationType {
            shape: format!("{shape} returning {}", outcome.shape_name()),
        })
    }
}

async fn abort_quietly(txn: Box<dyn GraphTransaction>) {
    if let Err(e) = txn.abort().await {
        tracing::warn!(error = %e, "failed to abort transaction");
    }
}
