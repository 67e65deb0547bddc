//! Ingestion pipeline: feed candidates flow through the Normalizer,
//! Similarity Resolver, Decision Engine, and Story Aggregate Manager under
//! the Pipeline Coordinator. The decision step is the streaming
//! entity-resolution core; everything around it is plumbing to and from
//! the external feed reader, text-intelligence service, and record store.

pub mod aggregate;
pub mod classify;
pub mod decision;
pub mod embedder;
pub mod feed;
pub mod normalize;
pub mod pipeline;
pub mod resolver;
pub mod stats;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use decision::{decide, ClusterDecision};
pub use pipeline::{BatchContext, IngestPipeline};
pub use stats::IngestStats;
