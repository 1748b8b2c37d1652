#![allow(clippy::unwrap_used)]

mod executor;
mod support;
