use crate::traits::VectorIndex;
use crate::{IndexEntry, SearchError};
use tracing::debug;

pub const DEFAULT_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Empty,
    Filling(usize),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub batches_flushed: usize,
    pub entries_flushed: usize,
}

/// Not transactional: a failed flush leaves earlier batches written.
pub struct BatchIndexer<'a> {
    index: &'a dyn VectorIndex,
    collection: String,
    batch_size: usize,
    buffer: Vec<IndexEntry>,
    stats: BatchStats,
}

impl<'a> BatchIndexer<'a> {
    pub fn new(index: &'a dyn VectorIndex, collection: impl Into<String>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            index,
            collection: collection.into(),
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            stats: BatchStats::default(),
        }
    }

    pub fn state(&self) -> BatchState {
        if self.buffer.is_empty() {
            BatchState::Empty
        } else {
            BatchState::Filling(self.buffer.len())
        }
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    pub async fn add(&mut self, entry: IndexEntry) -> Result<(), SearchError> {
        self.buffer.push(entry);
        if self.buffer.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), SearchError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let batch = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.batch_size));
        self.index.upsert(&self.collection, &batch).await?;

        self.stats.batches_flushed += 1;
        self.stats.entries_flushed += batch.len();
        debug!(
            collection = %self.collection,
            batch_len = batch.len(),
            batches = self.stats.batches_flushed,
            "flushed index batch"
        );
        Ok(())
    }

    pub async fn finish(mut self) -> Result<BatchStats, SearchError> {
        self.flush().await?;
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::{BatchIndexer, BatchState, BatchStats};
    use crate::traits::VectorIndex;
    use crate::{IndexEntry, Metadata, RetrievalCandidate, SearchError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingIndex {
        batches: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl VectorIndex for RecordingIndex {
        async fn ensure_collection(&self, _collection: &str) -> Result<(), SearchError> {
            Ok(())
        }

        async fn upsert(&self, _collection: &str, entries: &[IndexEntry]) -> Result<(), SearchError> {
            let ids = entries.iter().map(|entry| entry.id.clone()).collect();
            self.batches.lock().unwrap().push(ids);
            Ok(())
        }

        async fn query(
            &self,
            _collection: &str,
            _embedding: &[f32],
            _n_results: usize,
        ) -> Result<Vec<RetrievalCandidate>, SearchError> {
            Ok(Vec::new())
        }

        async fn collection_exists(&self, _collection: &str) -> Result<bool, SearchError> {
            Ok(true)
        }

        async fn count(&self, _collection: &str) -> Result<usize, SearchError> {
            Ok(0)
        }

        async fn delete_collection(&self, _collection: &str) -> Result<bool, SearchError> {
            Ok(false)
        }
    }

    fn entry(id: usize) -> IndexEntry {
        IndexEntry {
            id: format!("id-{id}"),
            embedding: vec![0.0],
            document: String::new(),
            metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn flushes_full_batches_and_the_remainder() {
        let index = RecordingIndex::default();
        let mut indexer = BatchIndexer::new(&index, "c", 32);

        for id in 0..70 {
            indexer.add(entry(id)).await.unwrap();
        }
        assert_eq!(indexer.state(), BatchState::Filling(6));

        let stats = indexer.finish().await.unwrap();
        assert_eq!(
            stats,
            BatchStats {
                batches_flushed: 3,
                entries_flushed: 70
            }
        );

        let sizes: Vec<_> = index.batches.lock().unwrap().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![32, 32, 6]);
    }

    #[tokio::test]
    async fn empty_buffer_never_calls_the_index() {
        let index = RecordingIndex::default();
        let mut indexer = BatchIndexer::new(&index, "c", 4);
        assert_eq!(indexer.state(), BatchState::Empty);
        indexer.flush().await.unwrap();
        assert_eq!(indexer.finish().await.unwrap(), BatchStats::default());
        assert!(index.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn state_returns_to_empty_after_a_full_batch() {
        let index = RecordingIndex::default();
        let mut indexer = BatchIndexer::new(&index, "c", 2);
        indexer.add(entry(0)).await.unwrap();
        assert_eq!(indexer.state(), BatchState::Filling(1));
        indexer.add(entry(1)).await.unwrap();
        assert_eq!(indexer.state(), BatchState::Empty);
        assert_eq!(indexer.stats().batches_flushed, 1);
    }
}
