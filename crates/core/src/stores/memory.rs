use crate::traits::VectorIndex;
use crate::{IndexEntry, RetrievalCandidate, SearchError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, BTreeMap<String, IndexEntry>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn squared_l2(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right.iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum()
}

#[async_trait]
impl VectorIndex for InMemoryVectorStore {
    async fn ensure_collection(&self, collection: &str) -> Result<(), SearchError> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default();
        Ok(())
    }

    async fn upsert(&self, collection: &str, entries: &[IndexEntry]) -> Result<(), SearchError> {
        let mut collections = self.collections.write().await;
        let rows = collections.entry(collection.to_string()).or_default();

        if let Some(expected) = rows.values().next().map(|entry| entry.embedding.len()) {
            if let Some(bad) = entries.iter().find(|entry| entry.embedding.len() != expected) {
                return Err(SearchError::Request(format!(
                    "embedding dimension {} != {} for id {}",
                    bad.embedding.len(),
                    expected,
                    bad.id
                )));
            }
        }

        for entry in entries {
            rows.insert(entry.id.clone(), entry.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<RetrievalCandidate>, SearchError> {
        let collections = self.collections.read().await;
        let rows = collections
            .get(collection)
            .ok_or_else(|| SearchError::CollectionNotFound(collection.to_string()))?;

        let mut scored = rows
            .values()
            .map(|entry| (squared_l2(&entry.embedding, embedding), entry))
            .collect::<Vec<_>>();
        scored.sort_by(|(left, left_entry), (right, right_entry)| {
            left.total_cmp(right).then_with(|| left_entry.id.cmp(&right_entry.id))
        });

        Ok(scored
            .into_iter()
            .take(n_results)
            .map(|(distance, entry)| RetrievalCandidate {
                text: entry.document.clone(),
                metadata: entry.metadata.clone(),
                distance,
                score: None,
            })
            .collect())
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, SearchError> {
        Ok(self.collections.read().await.contains_key(collection))
    }

    async fn count(&self, collection: &str) -> Result<usize, SearchError> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(BTreeMap::len)
            .ok_or_else(|| SearchError::CollectionNotFound(collection.to_string()))
    }

    async fn delete_collection(&self, collection: &str) -> Result<bool, SearchError> {
        Ok(self.collections.write().await.remove(collection).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryVectorStore;
    use crate::traits::VectorIndex;
    use crate::{IndexEntry, Metadata, SearchError};

    fn entry(id: &str, embedding: Vec<f32>, text: &str) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            embedding,
            document: text.to_string(),
            metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let store = InMemoryVectorStore::new();
        store
            .upsert("c", &[entry("a", vec![0.0, 1.0], "old"), entry("b", vec![1.0, 0.0], "b")])
            .await
            .unwrap();
        store.upsert("c", &[entry("a", vec![0.0, 1.0], "new")]).await.unwrap();

        assert_eq!(store.count("c").await.unwrap(), 2);
        let hits = store.query("c", &[0.0, 1.0], 1).await.unwrap();
        assert_eq!(hits[0].text, "new");
        assert_eq!(hits[0].distance, 0.0);
    }

    #[tokio::test]
    async fn query_orders_by_ascending_distance() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(
                "c",
                &[
                    entry("far", vec![3.0, 0.0], "far"),
                    entry("near", vec![1.0, 0.0], "near"),
                    entry("mid", vec![2.0, 0.0], "mid"),
                ],
            )
            .await
            .unwrap();

        let hits = store.query("c", &[0.0, 0.0], 10).await.unwrap();
        let texts: Vec<_> = hits.iter().map(|hit| hit.text.as_str()).collect();
        assert_eq!(texts, vec!["near", "mid", "far"]);
        assert_eq!(hits[2].distance, 9.0);
    }

    #[tokio::test]
    async fn unknown_collection_is_reported_missing() {
        let store = InMemoryVectorStore::new();
        let result = store.query("never-indexed", &[0.0], 3).await;
        assert!(matches!(result, Err(SearchError::CollectionNotFound(name)) if name == "never-indexed"));
        assert!(!store.collection_exists("never-indexed").await.unwrap());
    }

    #[tokio::test]
    async fn mismatched_dimensions_are_rejected() {
        let store = InMemoryVectorStore::new();
        store.upsert("c", &[entry("a", vec![0.0, 1.0], "a")]).await.unwrap();
        assert!(store.upsert("c", &[entry("b", vec![1.0], "b")]).await.is_err());
    }

    #[tokio::test]
    async fn delete_collection_reports_whether_it_existed() {
        let store = InMemoryVectorStore::new();
        store.upsert("c", &[entry("a", vec![1.0], "a")]).await.unwrap();
        assert!(store.delete_collection("c").await.unwrap());
        assert!(!store.delete_collection("c").await.unwrap());
    }
}
