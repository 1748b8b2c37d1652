use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use oxigraph::io::{RdfFormat, RdfSerializer};
use oxigraph::model::{GraphName, NamedNode, Quad, Triple};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{GraphEngine, GraphTransaction, QueryOutcome, TxnMode};
use crate::classify::{ReadOperation, UpdateOperation};
use crate::error::{Result, StoreError};

/// Embedded Oxigraph storage engine
///
/// Reads run against the store's consistent snapshot and may overlap freely.
/// Write exclusion is enforced with a process-wide async mutex held for the
/// lifetime of each write transaction, so a second write cannot open before
/// the first commits or aborts.
pub struct OxigraphEngine {
    store: Store,
    write_lock: Arc<Mutex<()>>,
}

impl OxigraphEngine {
    /// Open an engine with persistent storage at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Store::open(&path).map_err(StoreError::engine)?;
        tracing::info!(path = %path.as_ref().display(), "opened persistent triple store");
        Ok(Self::with_store(store))
    }

    /// Open an in-memory engine (used by tests and ephemeral deployments).
    pub fn in_memory() -> Result<Self> {
        let store = Store::new().map_err(StoreError::engine)?;
        tracing::info!("created in-memory triple store");
        Ok(Self::with_store(store))
    }

    fn with_store(store: Store) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl GraphEngine for OxigraphEngine {
    fn name(&self) -> &'static str {
        "oxigraph"
    }

    async fn begin(&self, mode: TxnMode) -> Result<Box<dyn GraphTransaction>> {
        let write_guard = match mode {
            TxnMode::Write => Some(Arc::clone(&self.write_lock).lock_owned().await),
            TxnMode::Read => None,
        };
        Ok(Box::new(OxigraphTransaction {
            store: self.store.clone(),
            mode,
            pending: Vec::new(),
            _write_guard: write_guard,
        }))
    }
}

enum PendingWrite {
    Update(String),
    Insert {
        graph: NamedNode,
        triples: Vec<Triple>,
    },
}

/// One open transaction against the embedded store.
///
/// Writes are buffered and applied at commit while the write lock is still
/// held, so `abort` genuinely discards them. Reads execute immediately
/// against the snapshot.
struct OxigraphTransaction {
    store: Store,
    mode: TxnMode,
    pending: Vec<PendingWrite>,
    _write_guard: Option<OwnedMutexGuard<()>>,
}

impl OxigraphTransaction {
    fn require_write(&self) -> Result<()> {
        if self.mode != TxnMode::Write {
            return Err(StoreError::Engine {
                reason: "write issued inside a read transaction".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl GraphTransaction for OxigraphTransaction {
    async fn execute_query(&mut self, op: &ReadOperation) -> Result<QueryOutcome> {
        let store = self.store.clone();
        let text = op.text().to_string();

        // Query evaluation is CPU/disk bound; run it off the async runtime.
        // A caller racing this against a timer can discard the result, but
        // the blocking computation itself is not interrupted mid-flight.
        tokio::task::spawn_blocking(move || -> Result<QueryOutcome> {
            match store.query(text.as_str()).map_err(StoreError::engine)? {
                QueryResults::Boolean(value) => Ok(QueryOutcome::Boolean(value)),
                QueryResults::Solutions(solutions) => {
                    let variables = solutions.variables().to_vec();
                    let rows = solutions
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .map_err(StoreError::engine)?;
                    Ok(QueryOutcome::Solutions { variables, rows })
                }
                QueryResults::Graph(triples) => {
                    let triples = triples
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .map_err(StoreError::engine)?;
                    Ok(QueryOutcome::Graph(triples))
                }
            }
        })
        .await
        .map_err(|e| StoreError::Engine {
            reason: format!("task join error: {e}"),
        })?
    }

    async fn execute_update(&mut self, op: &UpdateOperation) -> Result<()> {
        self.require_write()?;
        self.pending.push(PendingWrite::Update(op.text().to_string()));
        Ok(())
    }

    async fn bulk_insert(&mut self, graph: &str, triples: &[Triple]) -> Result<()> {
        self.require_write()?;
        let graph = NamedNode::new(graph).map_err(|e| StoreError::Parse {
            reason: format!("invalid graph IRI <{graph}>: {e}"),
        })?;
        self.pending.push(PendingWrite::Insert {
            graph,
            triples: triples.to_vec(),
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self {
            store,
            pending,
            _write_guard,
            ..
        } = *self;
        if pending.is_empty() {
            return Ok(());
        }

        let applied = tokio::task::spawn_blocking(move || -> Result<()> {
            for write in pending {
                apply_write(&store, write)?;
            }
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Engine {
            reason: format!("task join error: {e}"),
        })?;

        drop(_write_guard);
        applied
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        // Buffered writes are simply discarded; the lock releases on drop.
        Ok(())
    }
}

fn apply_write(store: &Store, write: PendingWrite) -> Result<()> {
    match write {
        PendingWrite::Update(text) => store.update(text.as_str()).map_err(StoreError::engine),
        PendingWrite::Insert { graph, triples } => {
            let mut serializer = RdfSerializer::from_format(RdfFormat::NTriples).for_writer(Vec::new());
            for triple in triples {
                let quad = Quad::new(
                    triple.subject,
                    triple.predicate,
                    triple.object,
                    GraphName::DefaultGraph,
                );
                serializer
                    .serialize_quad(&quad)
                    .map_err(StoreError::serialization)?;
            }
            let data = serializer.finish().map_err(StoreError::serialization)?;
            let data = String::from_utf8(data).map_err(StoreError::serialization)?;
            let update = format!("INSERT DATA {{ GRAPH <{}> {{\n{data}}} }}", graph.as_str());
            store.update(update.as_str()).map_err(StoreError::engine)
        }
    }
}
