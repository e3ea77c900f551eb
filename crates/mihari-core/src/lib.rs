//! Core types: search queries, message summaries, tracing setup

pub mod message;
pub mod tracing;

pub use message::{MessageSummary, SearchQuery};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
