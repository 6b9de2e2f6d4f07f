//! Document store abstraction and its implementations

pub mod memory;
pub mod mongo;

pub use memory::{CollectionProfile, InMemoryStore};
pub use mongo::MongoStore;

use crate::{
    error::ItemResult,
    models::{IndexSpec, Query},
    profiler::explain::ExplainRequest,
};
use async_trait::async_trait;
use mongodb::bson::Document;

/// The three database capabilities the profiler relies on
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short name used in logs and reports
    fn name(&self) -> &str;

    /// Create the index described by `spec` under its configured name
    async fn create_index(&self, spec: &IndexSpec) -> ItemResult<()>;

    /// Drop the named index from `collection`
    async fn drop_index(&self, collection: &str, index: &str) -> ItemResult<()>;

    /// Execute the query, drain all results and return how many documents
    /// were fetched
    async fn run_query(&self, collection: &str, query: &Query) -> ItemResult<u64>;

    /// Run an explain command and return its raw output
    async fn explain(&self, request: &ExplainRequest) -> ItemResult<Document>;
}
