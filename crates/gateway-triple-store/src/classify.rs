//! Two-stage operation classification.
//!
//! Inbound text is tried against the read grammar first
//! (SELECT/ASK/DESCRIBE/CONSTRUCT), then against the update grammar
//! (INSERT/DELETE/...). Exactly one of the two must accept; text accepted by
//! neither is rejected with the last parser diagnostic. Classification is a
//! pure function over the input text.

use crate::error::{Result, StoreError};

/// Result shape of a read operation, driving serialization dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadShape {
    Ask,
    Select,
    Describe,
    Construct,
}

impl std::fmt::Display for ReadShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReadShape::Ask => "ASK",
            ReadShape::Select => "SELECT",
            ReadShape::Describe => "DESCRIBE",
            ReadShape::Construct => "CONSTRUCT",
        };
        f.write_str(name)
    }
}

/// A parsed read operation, immutable once classified.
#[derive(Clone, Debug)]
pub struct ReadOperation {
    text: String,
    shape: ReadShape,
}

impl ReadOperation {
    /// Canonical text of the operation, re-serialized from the parsed AST so
    /// engines receive normalized SPARQL regardless of inbound formatting.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn shape(&self) -> ReadShape {
        self.shape
    }
}

/// A parsed update operation, immutable once classified.
#[derive(Clone, Debug)]
pub struct UpdateOperation {
    text: String,
}

impl UpdateOperation {
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// An inbound operation classified as exactly one of read or update.
#[derive(Clone, Debug)]
pub enum Operation {
    Read(ReadOperation),
    Update(UpdateOperation),
}

/// Classify raw operation text as a read or an update.
///
/// Two-stage disjoint-try, not a heuristic: the read grammar is attempted
/// first, the update grammar second, and failure of both is a terminal
/// `ParseError`. Malformed text never silently becomes a no-op.
pub fn classify(text: &str) -> Result<Operation> {
    match parse_read(text) {
        Ok(read) => Ok(Operation::Read(read)),
        Err(_) => match spargebra::Update::parse(text, None) {
            Ok(ast) => Ok(Operation::Update(UpdateOperation {
                text: ast.to_string(),
            })),
            Err(update_err) => Err(StoreError::Parse {
                reason: update_err.to_string(),
            }),
        },
    }
}

/// Classify in force-read mode: only the read grammar is attempted, and a
/// failed read parse is terminal even when the text is a valid update. Used
/// by the public endpoint, which must never dispatch writes.
pub fn classify_read_only(text: &str) -> Result<ReadOperation> {
    parse_read(text)
}

fn parse_read(text: &str) -> Result<ReadOperation> {
    let ast = spargebra::Query::parse(text, None).map_err(|e| StoreError::Parse {
        reason: e.to_string(),
    })?;
    let shape = match &ast {
        spargebra::Query::Ask { .. } => ReadShape::Ask,
        spargebra::Query::Select { .. } => ReadShape::Select,
        spargebra::Query::Describe { .. } => ReadShape::Describe,
        spargebra::Query::Construct { .. } => ReadShape::Construct,
    };
    Ok(ReadOperation {
        text: ast.to_string(),
        shape,
    })
}
