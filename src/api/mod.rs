//! API module for the HTTP surface
//!
//! Ingest, replay lookups, log statistics, the aggregated summary and
//! time-window queries, all served by one axum router.

pub mod http;
pub mod rest;
pub mod state;

pub use http::create_router;
pub use state::AppState;
