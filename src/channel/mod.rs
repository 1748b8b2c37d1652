//! Asynchronous channels between the dispatch boundary and the workers.

pub mod failure_store;
pub mod read_mirror;
pub mod update_channel;

pub use failure_store::FailureStore;
pub use read_mirror::ReadMirror;
pub use update_channel::{UpdateMessage, UpdateScheduler, UpdateWorker};

/// Logical queue names, kept stable for logs and metrics.
pub const QUEUE_SPARQL_READ: &str = "sparql-read";
pub const QUEUE_SPARQL_UPDATE: &str = "sparql-update";
pub const QUEUE_SPARQL_UPDATE_FAILURE: &str = "sparql-update-failure";
