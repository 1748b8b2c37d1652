use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use oxigraph::model::Triple;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::classify::{ReadOperation, UpdateOperation};
use crate::engine::{GraphEngine, GraphTransaction, QueryOutcome, TxnMode};
use crate::error::{Result, StoreError};

/// Engine double that enforces the single-writer contract with a mutex and
/// records the wall-clock open/close interval of every write transaction.
pub struct RecordingEngine {
    write_lock: Arc<Mutex<()>>,
    pub write_intervals: Arc<StdMutex<Vec<(Instant, Instant)>>>,
    pub commit_delay: Duration,
}

impl RecordingEngine {
    pub fn new(commit_delay: Duration) -> Self {
        Self {
            write_lock: Arc::new(Mutex::new(())),
            write_intervals: Arc::new(StdMutex::new(Vec::new())),
            commit_delay,
        }
    }
}

#[async_trait]
impl GraphEngine for RecordingEngine {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn begin(&self, mode: TxnMode) -> Result<Box<dyn GraphTransaction>> {
        let guard = match mode {
            TxnMode::Write => Some(Arc::clone(&self.write_lock).lock_owned().await),
            TxnMode::Read => None,
        };
        Ok(Box::new(RecordingTransaction {
            opened_at: Instant::now(),
            commit_delay: self.commit_delay,
            intervals: Arc::clone(&self.write_intervals),
            _guard: guard,
        }))
    }
}

struct RecordingTransaction {
    opened_at: Instant,
    commit_delay: Duration,
    intervals: Arc<StdMutex<Vec<(Instant, Instant)>>>,
    _guard: Option<OwnedMutexGuard<()>>,
}

#[async_trait]
impl GraphTransaction for RecordingTransaction {
    async fn execute_query(&mut self, _op: &ReadOperation) -> Result<QueryOutcome> {
        Ok(QueryOutcome::Boolean(true))
    }

    async fn execute_update(&mut self, _op: &UpdateOperation) -> Result<()> {
        Ok(())
    }

    async fn bulk_insert(&mut self, _graph: &str, _triples: &[Triple]) -> Result<()> {
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        tokio::time::sleep(self.commit_delay).await;
        if self._guard.is_some() {
            self.intervals
                .lock()
                .unwrap()
                .push((self.opened_at, Instant::now()));
        }
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Engine double whose transactions fail a configured number of times before
/// succeeding, and which flags whether an abort was observed.
pub struct FlakyEngine {
    pub remaining_failures: Arc<AtomicU32>,
    pub attempts: Arc<AtomicU32>,
    pub aborted: Arc<AtomicBool>,
    pub stall: Duration,
}

impl FlakyEngine {
    pub fn failing(times: u32) -> Self {
        Self {
            remaining_failures: Arc::new(AtomicU32::new(times)),
            attempts: Arc::new(AtomicU32::new(0)),
            aborted: Arc::new(AtomicBool::new(false)),
            stall: Duration::ZERO,
        }
    }

    pub fn stalling(stall: Duration) -> Self {
        let mut engine = Self::failing(0);
        engine.stall = stall;
        engine
    }
}

#[async_trait]
impl GraphEngine for FlakyEngine {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn begin(&self, _mode: TxnMode) -> Result<Box<dyn GraphTransaction>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FlakyTransaction {
            remaining_failures: Arc::clone(&self.remaining_failures),
            aborted: Arc::clone(&self.aborted),
            stall: self.stall,
        }))
    }
}

struct FlakyTransaction {
    remaining_failures: Arc<AtomicU32>,
    aborted: Arc<AtomicBool>,
    stall: Duration,
}

impl FlakyTransaction {
    fn fail_if_scheduled(&self) -> Result<()> {
        let scheduled = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scheduled {
            Err(StoreError::TransientStorage {
                reason: "injected failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl GraphTransaction for FlakyTransaction {
    async fn execute_query(&mut self, _op: &ReadOperation) -> Result<QueryOutcome> {
        if !self.stall.is_zero() {
            tokio::time::sleep(self.stall).await;
        }
        self.fail_if_scheduled()?;
        Ok(QueryOutcome::Boolean(true))
    }

    async fn execute_update(&mut self, _op: &UpdateOperation) -> Result<()> {
        self.fail_if_scheduled()
    }

    async fn bulk_insert(&mut self, _graph: &str, _triples: &[Triple]) -> Result<()> {
        self.fail_if_scheduled()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        self.aborted.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub fn sample_triple(n: u32) -> Triple {
    use oxigraph::model::NamedNode;
    Triple::new(
        NamedNode::new(format!("urn:s:{n}")).unwrap(),
        NamedNode::new("urn:p".to_string()).unwrap(),
        NamedNode::new(format!("urn:o:{n}")).unwrap(),
    )
}
