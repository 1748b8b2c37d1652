//! Storage engine contract.
//!
//! The graph-storage engine is an external collaborator consumed only
//! through this trait pair: begin a transaction in read or write mode, run
//! exactly one operation inside it, then commit or abort. Write transactions
//! are mutually exclusive system-wide; the engine enforces that exclusion and
//! the executor respects it by never holding two write handles at once.

mod oxigraph_engine;

use async_trait::async_trait;
use oxigraph::model::{Triple, Variable};
use oxigraph::sparql::QuerySolution;

pub use oxigraph_engine::OxigraphEngine;

use crate::classify::{ReadOperation, UpdateOperation};
use crate::error::Result;

/// Transaction mode requested from the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxnMode {
    Read,
    Write,
}

/// Materialized result of a read operation.
///
/// Results are fully materialized before serialization so that a failed
/// render attempt can be retried against the fallback serialization without
/// re-executing the query.
#[derive(Debug)]
pub enum QueryOutcome {
    Boolean(bool),
    Solutions {
        variables: Vec<Variable>,
        rows: Vec<QuerySolution>,
    },
    Graph(Vec<Triple>),
}

impl QueryOutcome {
    pub fn shape_name(&self) -> &'static str {
        match self {
            QueryOutcome::Boolean(_) => "boolean",
            QueryOutcome::Solutions { .. } => "solutions",
            QueryOutcome::Graph(_) => "graph",
        }
    }
}

/// Trait for graph storage engines
///
/// Implementations provide transactional SPARQL execution against a concrete
/// store (embedded Oxigraph here; an HTTP-backed store would fit the same
/// contract).
#[async_trait]
pub trait GraphEngine: Send + Sync {
    /// Engine name for logging/debugging
    fn name(&self) -> &'static str;

    /// Open a transaction. A write-mode transaction must not be granted
    /// while another write transaction is open anywhere in the process.
    async fn begin(&self, mode: TxnMode) -> Result<Box<dyn GraphTransaction>>;
}

/// A scoped transaction handle, exclusively owned by its executor for the
/// duration of one operation. Every path releases the handle: success via
/// `commit`, failure via `abort`.
#[async_trait]
pub trait GraphTransaction: Send {
    /// Execute a read operation and materialize its outcome.
    async fn execute_query(&mut self, op: &ReadOperation) -> Result<QueryOutcome>;

    /// Execute an update operation.
    async fn execute_update(&mut self, op: &UpdateOperation) -> Result<()>;

    /// Bulk-insert triples into the given named graph.
    async fn bulk_insert(&mut self, graph: &str, triples: &[Triple]) -> Result<()>;

    /// Commit the transaction, consuming the handle.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Abort the transaction, consuming the handle. Must be infallible from
    /// the caller's perspective wherever the engine allows it.
    async fn abort(self: Box<Self>) -> Result<()>;
}
