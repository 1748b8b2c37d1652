//! RDF payload helpers for bulk ingestion.

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::Triple;

use crate::error::{Result, StoreError};

/// Resolve an RDF serialization from a file name's extension, via the
/// standard extension registry.
pub fn format_for_file(file_name: &str) -> Option<RdfFormat> {
    let extension = file_name.rsplit_once('.').map(|(_, ext)| ext)?;
    RdfFormat::from_extension(extension)
}

/// Parse a payload into its triple set. Quad-capable serializations are
/// accepted; graph names inside the payload are dropped, since the target
/// graph is resolved per file by the loader.
pub fn parse_triples(format: RdfFormat, payload: &[u8]) -> Result<Vec<Triple>> {
    let mut triples = Vec::new();
    for parsed in RdfParser::from_format(format).for_reader(payload) {
        let quad = parsed.map_err(|e| StoreError::Parse {
            reason: format!("invalid {} payload: {e}", format.media_type()),
        })?;
        triples.push(Triple::new(quad.subject, quad.predicate, quad.object));
    }
    Ok(triples)
}

/// Deduplicate a triple list, keeping the first occurrence of each triple so
/// downstream partitioning is deterministic.
pub fn dedupe_triples(triples: Vec<Triple>) -> Vec<Triple> {
    let mut seen = std::collections::HashSet::with_capacity(triples.len());
    triples
        .into_iter()
        .filter(|triple| seen.insert(triple.clone()))
        .collect()
}
