//! Metrics agent for the gaugeline pipeline.
//!
//! Samples process measurements on a poll timer into a local
//! [`MemoryStore`](gaugeline_storage::MemoryStore) and pushes them to the
//! server on a report timer. The sampling source and the delivery channel
//! are traits ([`Sampler`], [`Transport`]) so the scheduler can be driven
//! without an OS or a network.

pub mod config;
pub mod error;
pub mod sampler;
pub mod scheduler;
pub mod transport;

pub use error::{AgentError, TransportError};
pub use sampler::{ProcessSampler, Sampler};
pub use scheduler::{Agent, AgentSettings, POLL_COUNT};
pub use transport::{ContentType, Delivery, HttpTransport, Transport};
