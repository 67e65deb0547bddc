//! Record-store boundary: the `ArticleStore` trait the pipeline writes
//! through, a Postgres implementation, and an in-memory implementation for
//! tests (behind the `test-support` feature).

mod migrate;
mod postgres;
mod store;

#[cfg(feature = "test-support")]
pub mod memory;
#[cfg(feature = "test-support")]
pub use memory::MemoryStore;

pub use migrate::migrate;
pub use postgres::PgStore;
pub use store::{ArticleStore, ArticleUpdate, InsertOutcome};
