//! HTTP handler modules for the gaugeline API.
//!
//! Each sub-module implements thin handlers that extract path segments or
//! the raw body, delegate to [`MetricService`](crate::service::MetricService),
//! and shape the response. No business logic lives in handlers.

pub mod health;
pub mod listing;
pub mod update;
pub mod value;
