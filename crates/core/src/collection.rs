use crate::models::ChunkingStrategy;
use crate::traits::VectorIndex;
use crate::SearchError;

pub const STANDARD_COLLECTION: &str = "file_embeddings";
pub const STRUCTURAL_COLLECTION: &str = "file_embeddings_unstructured";

pub struct CollectionName;

impl CollectionName {
    pub fn for_strategy(strategy: ChunkingStrategy) -> String {
        match strategy {
            ChunkingStrategy::Standard => STANDARD_COLLECTION.to_string(),
            ChunkingStrategy::Structural => STRUCTURAL_COLLECTION.to_string(),
        }
    }

    pub fn for_notebook(notebook_id: i64, strategy: ChunkingStrategy) -> String {
        let suffix = match strategy {
            ChunkingStrategy::Standard => "standard",
            ChunkingStrategy::Structural => "unstructured",
        };
        format!("notebook_{notebook_id}_{suffix}")
    }

    pub fn resolve(notebook_id: Option<i64>, strategy: ChunkingStrategy) -> String {
        match notebook_id {
            Some(id) => Self::for_notebook(id, strategy),
            None => Self::for_strategy(strategy),
        }
    }

    pub fn notebook_collections(notebook_id: i64) -> [String; 2] {
        [
            Self::for_notebook(notebook_id, ChunkingStrategy::Standard),
            Self::for_notebook(notebook_id, ChunkingStrategy::Structural),
        ]
    }
}

pub async fn delete_notebook_collections(
    index: &dyn VectorIndex,
    notebook_id: i64,
) -> Result<Vec<String>, SearchError> {
    let mut deleted = Vec::new();
    for name in CollectionName::notebook_collections(notebook_id) {
        if index.delete_collection(&name).await? {
            deleted.push(name);
        }
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::{delete_notebook_collections, CollectionName};
    use crate::models::ChunkingStrategy;
    use crate::stores::InMemoryVectorStore;
    use crate::traits::VectorIndex;

    #[test]
    fn strategies_map_to_distinct_namespaces() {
        assert_eq!(CollectionName::for_strategy(ChunkingStrategy::Standard), "file_embeddings");
        assert_eq!(
            CollectionName::for_strategy(ChunkingStrategy::Structural),
            "file_embeddings_unstructured"
        );
    }

    #[test]
    fn notebook_collections_are_per_strategy() {
        assert_eq!(
            CollectionName::resolve(Some(7), ChunkingStrategy::Structural),
            "notebook_7_unstructured"
        );
        assert_eq!(
            CollectionName::notebook_collections(3),
            ["notebook_3_standard".to_string(), "notebook_3_unstructured".to_string()]
        );
    }

    #[tokio::test]
    async fn deleting_a_notebook_ignores_missing_collections() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("notebook_9_standard").await.unwrap();
        store.ensure_collection("notebook_10_standard").await.unwrap();

        let deleted = delete_notebook_collections(&store, 9).await.unwrap();
        assert_eq!(deleted, vec!["notebook_9_standard".to_string()]);
        assert!(store.collection_exists("notebook_10_standard").await.unwrap());
    }
}
