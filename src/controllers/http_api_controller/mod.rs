pub mod middleware;
pub mod router;
pub mod sparql_controller;

pub use router::{build_router, HttpApiRouter};
