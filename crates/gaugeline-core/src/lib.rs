//! Core metric data model for the gaugeline pipeline.
//!
//! Everything that crosses a layer boundary lives here: the [`Metric`]
//! itself, its JSON wire shape ([`MetricPayload`]), and the keyed integrity
//! tag ([`SigningKey`], [`Tag`]) shared by the agent and the server.
//! [`duration`] holds the interval syntax both command lines accept.

pub mod duration;
pub mod error;
pub mod integrity;
pub mod metric;
pub mod payload;

// Re-export commonly used types
pub use error::CoreError;
pub use integrity::{SigningKey, Tag};
pub use metric::{Metric, MetricKind, MetricValue};
pub use payload::MetricPayload;
