//! HTTP server for the gaugeline metrics pipeline.
//!
//! Receives pushed metrics from agents, verifies their integrity tags,
//! applies them to the configured storage backend, and answers point and
//! listing queries. This crate contains the service layer, API error
//! mapping, route definitions, and the periodic snapshot task.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod schema;
pub mod service;
pub mod snapshot;
pub mod state;
