use crate::{IndexEntry, RetrievalCandidate, SearchError};
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn ensure_collection(&self, collection: &str) -> Result<(), SearchError>;

    async fn upsert(&self, collection: &str, entries: &[IndexEntry]) -> Result<(), SearchError>;

    /// Fails with [`SearchError::CollectionNotFound`] when the collection was never created.
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<RetrievalCandidate>, SearchError>;

    async fn collection_exists(&self, collection: &str) -> Result<bool, SearchError>;

    async fn count(&self, collection: &str) -> Result<usize, SearchError>;

    async fn delete_collection(&self, collection: &str) -> Result<bool, SearchError>;
}
