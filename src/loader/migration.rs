//! Bulk ingestion of graph snapshots and update scripts.
//!
//! Three payload kinds, decided by file extension: `*.graph` sidecars
//! declare the target graph for a same-named data file and touch only the
//! graph-name cache; `*.sparql` scripts run once through the executor's
//! write path; anything else resolves through the standard RDF extension
//! registry and is batch-loaded. A batch that exhausts its retries fails the
//! whole file, leaving already-committed batches in place.

use std::sync::Arc;

use gateway_triple_store::oxigraph::model::Triple;
use gateway_triple_store::{classify, rdf, Operation, StoreError, TransactionalExecutor};
use metrics::counter;
use uuid::Uuid;

use super::graph_cache::GraphNameCache;
use crate::config::{MigrationConfig, TripleStoreConfig};
use crate::error::GatewayError;

pub const GRAPH_SIDECAR_EXTENSION: &str = "graph";
pub const UPDATE_SCRIPT_EXTENSION: &str = "sparql";

/// What an ingested file turned out to be.
#[derive(Debug)]
pub enum IngestOutcome {
    SidecarCached,
    ScriptExecuted {
        correlation_id: Uuid,
    },
    GraphLoaded {
        graph: String,
        triples: usize,
        batches: usize,
        correlation_id: Uuid,
    },
}

pub struct MigrationLoader {
    executor: Arc<TransactionalExecutor>,
    cache: GraphNameCache,
    default_graph: String,
    batch_size: usize,
    max_retry: u32,
}

impl MigrationLoader {
    pub fn new(
        executor: Arc<TransactionalExecutor>,
        migration: &MigrationConfig,
        triple_store: &TripleStoreConfig,
    ) -> Self {
        Self {
            executor,
            cache: GraphNameCache::default(),
            default_graph: migration.default_graph.clone(),
            batch_size: triple_store.batch_size.max(1),
            max_retry: triple_store.max_retry,
        }
    }

    pub fn cache(&self) -> &GraphNameCache {
        &self.cache
    }

    /// Ingest one file's payload.
    pub async fn ingest(&self, file_name: &str, payload: &[u8]) -> Result<IngestOutcome, GatewayError> {
        match extension(file_name) {
            Some(ext) if ext.eq_ignore_ascii_case(GRAPH_SIDECAR_EXTENSION) => {
                self.cache_sidecar(file_name, payload)
            }
            Some(ext) if ext.eq_ignore_ascii_case(UPDATE_SCRIPT_EXTENSION) => {
                self.execute_script(file_name, payload).await
            }
            _ => self.load_graph_payload(file_name, payload).await,
        }
    }

    fn cache_sidecar(&self, file_name: &str, payload: &[u8]) -> Result<IngestOutcome, GatewayError> {
        let graph = text_payload(file_name, payload)?.trim().to_string();
        if graph.is_empty() {
            return Err(StoreError::Parse {
                reason: format!("sidecar {file_name} declares no graph"),
            }
            .into());
        }
        tracing::info!(file = file_name, graph = %graph, "cached sidecar graph declaration");
        self.cache.put(base_name(file_name), graph);
        Ok(IngestOutcome::SidecarCached)
    }

    async fn execute_script(&self, file_name: &str, payload: &[u8]) -> Result<IngestOutcome, GatewayError> {
        let text = text_payload(file_name, payload)?;
        let op = match classify(text)? {
            Operation::Update(op) => op,
            Operation::Read(_) => {
                return Err(StoreError::Parse {
                    reason: format!("migration script {file_name} is not an update"),
                }
                .into());
            }
        };
        self.executor.write(&op).await?;
        counter!("migration_scripts_executed_total").increment(1);
        Ok(IngestOutcome::ScriptExecuted {
            correlation_id: Uuid::new_v4(),
        })
    }

    async fn load_graph_payload(
        &self,
        file_name: &str,
        payload: &[u8],
    ) -> Result<IngestOutcome, GatewayError> {
        let format = rdf::format_for_file(file_name).ok_or_else(|| StoreError::Parse {
            reason: format!("no RDF serialization registered for {file_name}"),
        })?;
        let triples = rdf::dedupe_triples(rdf::parse_triples(format, payload)?);

        let base = base_name(file_name);
        let graph = self
            .cache
            .get(base)
            .unwrap_or_else(|| self.default_graph.clone());

        let batches = partition(&triples, self.batch_size);
        tracing::info!(
            file = file_name,
            graph = %graph,
            triples = triples.len(),
            batches = batches.len(),
            batch_size = self.batch_size,
            "running triple import"
        );

        let batch_count = batches.len();
        for batch in batches {
            self.insert_batch_or_retry(&graph, batch).await?;
        }

        counter!("migration_triples_loaded_total").increment(triples.len() as u64);
        Ok(IngestOutcome::GraphLoaded {
            graph,
            triples: triples.len(),
            batches: batch_count,
            correlation_id: Uuid::new_v4(),
        })
    }

    /// Insert one batch, retrying transient storage failures up to the
    /// configured bound (`max_retry` + 1 attempts in total).
    async fn insert_batch_or_retry(&self, graph: &str, batch: &[Triple]) -> Result<(), StoreError> {
        let mut last_reason = String::new();
        for attempt in 0..=self.max_retry {
            match self.executor.load(graph, batch).await {
                Ok(()) => {
                    if attempt > 0 {
                        tracing::debug!(attempt, "batch insert succeeded after retry");
                    }
                    return Ok(());
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_retry = self.max_retry,
                        error = %e,
                        "batch insert failed"
                    );
                    last_reason = e.to_string();
                }
            }
        }
        counter!("migration_batches_exhausted_total").increment(1);
        Err(StoreError::ExhaustedRetries {
            attempts: self.max_retry + 1,
            reason: last_reason,
        })
    }
}

/// Slice a deduplicated triple list into fixed-size batches. Disjoint by
/// construction; their union is the input, exactly once.
pub fn partition(triples: &[Triple], batch_size: usize) -> Vec<&[Triple]> {
    triples.chunks(batch_size.max(1)).collect()
}

pub fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map(|(base, _)| base)
        .unwrap_or(file_name)
}

fn extension(file_name: &str) -> Option<&str> {
    file_name.rsplit_once('.').map(|(_, ext)| ext)
}

fn text_payload<'a>(file_name: &str, payload: &'a [u8]) -> Result<&'a str, GatewayError> {
    std::str::from_utf8(payload).map_err(|e| {
        GatewayError::Store(StoreError::Parse {
            reason: format!("{file_name} is not valid UTF-8: {e}"),
        })
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use gateway_triple_store::oxigraph::model::NamedNode;

    use super::*;

    fn triples(n: usize) -> Vec<Triple> {
        (0..n)
            .map(|i| {
                Triple::new(
                    NamedNode::new(format!("urn:s:{i}")).unwrap(),
                    NamedNode::new("urn:p").unwrap(),
                    NamedNode::new(format!("urn:o:{i}")).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn partition_produces_ceil_n_over_b_batches() {
        for (n, b, expected) in [(250, 100, 3), (100, 100, 1), (1, 100, 1), (0, 100, 0), (7, 3, 3)]
        {
            assert_eq!(partition(&triples(n), b).len(), expected, "n={n} b={b}");
        }
    }

    #[test]
    fn partition_is_a_disjoint_exact_cover() {
        let input = triples(250);
        let batches = partition(&input, 100);

        let mut seen: HashSet<&Triple> = HashSet::new();
        for batch in &batches {
            for triple in *batch {
                assert!(seen.insert(triple), "triple appears in two batches");
            }
        }
        assert_eq!(seen.len(), input.len());
        assert!(input.iter().all(|t| seen.contains(t)));
    }

    #[test]
    fn base_name_strips_only_the_last_extension() {
        assert_eq!(base_name("people.graph"), "people");
        assert_eq!(base_name("people.snapshot.ttl"), "people.snapshot");
        assert_eq!(base_name("noext"), "noext");
    }
}
