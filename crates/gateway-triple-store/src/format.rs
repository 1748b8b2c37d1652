//! Content negotiation and response rendering.
//!
//! The requested content type is looked up among the registered tabular and
//! RDF serializations. Rendering with the negotiated serialization may fail
//! at engine level (a tabular serialization requested for a graph result, or
//! the reverse); in that case rendering falls back exactly once to a fixed
//! default per result shape: ASK/SELECT to SPARQL-Results-JSON, DESCRIBE/
//! CONSTRUCT to Turtle. A failure of the fallback itself propagates.

use oxigraph::io::{RdfFormat, RdfSerializer};
use oxigraph::model::{GraphName, Quad, Triple};
use oxigraph::sparql::results::{QueryResultsFormat, QueryResultsSerializer};

use crate::classify::ReadShape;
use crate::engine::QueryOutcome;
use crate::error::{Result, StoreError};

/// A negotiated serialization: either a tabular results format or an RDF
/// graph format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseFormat {
    Results(QueryResultsFormat),
    Graph(RdfFormat),
}

impl ResponseFormat {
    pub fn media_type(&self) -> &'static str {
        match self {
            ResponseFormat::Results(f) => f.media_type(),
            ResponseFormat::Graph(f) => f.media_type(),
        }
    }
}

/// A serialized response: content type plus body bytes.
#[derive(Clone, Debug)]
pub struct SparqlResult {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Look up a requested content type among the registered serializations.
///
/// Media type parameters (`;charset=...`) are ignored. Returns `None` for
/// content types with no registered serialization.
pub fn resolve_format(content_type: &str) -> Option<ResponseFormat> {
    let media_type = content_type.split(';').next().unwrap_or("").trim();
    if media_type.is_empty() {
        return None;
    }
    QueryResultsFormat::from_media_type(media_type)
        .map(ResponseFormat::Results)
        .or_else(|| RdfFormat::from_media_type(media_type).map(ResponseFormat::Graph))
}

/// Fixed per-shape default used as the single fallback level.
pub fn default_format(shape: ReadShape) -> ResponseFormat {
    match shape {
        ReadShape::Ask | ReadShape::Select => ResponseFormat::Results(QueryResultsFormat::Json),
        ReadShape::Describe | ReadShape::Construct => ResponseFormat::Graph(RdfFormat::Turtle),
    }
}

/// Render a query outcome, negotiating against the requested content type.
///
/// Deterministic for a given (content type, shape) pair: the requested
/// serialization is attempted when registered, the per-shape default is used
/// otherwise or when the first attempt fails, and a fallback failure is
/// propagated rather than cascading further.
pub fn render(outcome: &QueryOutcome, shape: ReadShape, accept: Option<&str>) -> Result<SparqlResult> {
    let fallback = default_format(shape);
    let requested = accept.and_then(resolve_format);

    match requested {
        Some(format) if format != fallback => match render_with(outcome, format) {
            Ok(result) => Ok(result),
            Err(first_err) => {
                tracing::debug!(
                    requested = format.media_type(),
                    fallback = fallback.media_type(),
                    error = %first_err,
                    "requested serialization failed, falling back to shape default"
                );
                render_with(outcome, fallback)
            }
        },
        _ => render_with(outcome, fallback),
    }
}

fn render_with(outcome: &QueryOutcome, format: ResponseFormat) -> Result<SparqlResult> {
    let body = match (outcome, format) {
        (QueryOutcome::Boolean(value), ResponseFormat::Results(f)) => {
            QueryResultsSerializer::from_format(f)
                .serialize_boolean_to_writer(Vec::new(), *value)
                .map_err(StoreError::serialization)?
        }
        (QueryOutcome::Solutions { variables, rows }, ResponseFormat::Results(f)) => {
            let mut serializer = QueryResultsSerializer::from_format(f)
                .serialize_solutions_to_writer(Vec::new(), variables.clone())
                .map_err(StoreError::serialization)?;
            for row in rows {
                serializer
                    .serialize(row.iter().map(|(var, term)| (var.as_ref(), term.as_ref())))
                    .map_err(StoreError::serialization)?;
            }
            serializer.finish().map_err(StoreError::serialization)?
        }
        (QueryOutcome::Graph(triples), ResponseFormat::Graph(f)) => {
            let mut serializer = RdfSerializer::from_format(f).for_writer(Vec::new());
            for triple in triples {
                serializer
                    .serialize_quad(&default_graph_quad(triple.clone()))
                    .map_err(StoreError::serialization)?;
            }
            serializer.finish().map_err(StoreError::serialization)?
        }
        // Tabular serialization of a graph result or RDF serialization of a
        // bindings result is an engine-level incompatibility.
        (outcome, format) => {
            return Err(StoreError::Serialization {
                reason: format!(
                    "{} result is not serializable as {}",
                    outcome.shape_name(),
                    format.media_type()
                ),
            });
        }
    };

    Ok(SparqlResult {
        content_type: format.media_type().to_string(),
        body,
    })
}

fn default_graph_quad(triple: Triple) -> Quad {
    Quad::new(
        triple.subject,
        triple.predicate,
        triple.object,
        GraphName::DefaultGraph,
    )
}
