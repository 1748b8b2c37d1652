pub mod http_api_controller;

pub use http_api_controller::{build_router, HttpApiRouter};
