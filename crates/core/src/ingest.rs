use crate::chunking::Chunker;
use crate::embeddings::Embedder;
use crate::extractor::{file_extension, DocumentReader, FileDocumentReader};
use crate::indexer::BatchIndexer;
use crate::traits::VectorIndex;
use crate::{IndexEntry, IndexingOptions, IngestError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::{Id, JoinSet};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_files(
    root: &Path,
    recursive: bool,
    extensions: &[String],
    reader: &dyn DocumentReader,
) -> Vec<PathBuf> {
    let allowed: Vec<String> = extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect();

    let walker = if recursive {
        WalkDir::new(root)
    } else {
        WalkDir::new(root).max_depth(1)
    };

    let mut files = Vec::new();
    for entry in walker.into_iter().filter_map(|item| item.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        let accepted = file_extension(entry.path()).is_some_and(|ext| {
            if allowed.is_empty() {
                reader.supports(&ext)
            } else {
                allowed.contains(&ext)
            }
        });

        if accepted {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub collection: String,
    pub files_seen: usize,
    pub documents: usize,
    pub chunks: usize,
    pub entries_indexed: usize,
    pub batches_flushed: usize,
    pub skipped_files: Vec<SkippedFile>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

struct PreparedFile {
    path: PathBuf,
    documents: usize,
    entries: Vec<IndexEntry>,
}

pub struct Ingestor {
    reader: Arc<dyn DocumentReader>,
    chunker: Arc<Chunker>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        options: IndexingOptions,
    ) -> Result<Self, IngestError> {
        let chunker = Chunker::new(options.strategy, options.chunking, options.hash_prefix_chars)?;
        Ok(Self {
            reader: Arc::new(FileDocumentReader::default()),
            chunker: Arc::new(chunker),
            embedder,
            index,
            batch_size: options.batch_size,
        })
    }

    pub fn with_reader(mut self, reader: Arc<dyn DocumentReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = Arc::new(chunker);
        self
    }

    pub async fn index_path(
        &self,
        root: &Path,
        recursive: bool,
        extensions: &[String],
        collection: &str,
    ) -> Result<IngestionReport, IngestError> {
        if !root.exists() {
            return Err(IngestError::InvalidArgument(format!(
                "path does not exist: {}",
                root.display()
            )));
        }

        let files = discover_files(root, recursive, extensions, self.reader.as_ref());
        if files.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "no matching files found in {}",
                root.display()
            )));
        }

        info!(root = %root.display(), files = files.len(), collection, "indexing folder");
        self.index_files(files, collection).await
    }

    pub async fn index_files(
        &self,
        files: Vec<PathBuf>,
        collection: &str,
    ) -> Result<IngestionReport, IngestError> {
        let started_at = Utc::now();
        self.index.ensure_collection(collection).await?;

        let files_seen = files.len();
        let mut tasks = JoinSet::new();
        let mut task_paths: HashMap<Id, PathBuf> = HashMap::new();
        for path in files {
            let reader = Arc::clone(&self.reader);
            let chunker = Arc::clone(&self.chunker);
            let embedder = Arc::clone(&self.embedder);
            let task_path = path.clone();
            let handle = tasks.spawn(async move {
                prepare_file(reader, chunker, embedder, &task_path).await
            });
            task_paths.insert(handle.id(), path);
        }

        let mut indexer = BatchIndexer::new(self.index.as_ref(), collection, self.batch_size);
        let mut skipped_files = Vec::new();
        let mut documents = 0usize;
        let mut chunks = 0usize;

        while let Some(joined) = tasks.join_next_with_id().await {
            let (path, outcome) = match joined {
                Ok((id, outcome)) => (task_paths.remove(&id).unwrap_or_default(), outcome),
                Err(error) => {
                    let path = task_paths.remove(&error.id()).unwrap_or_default();
                    warn!(path = %path.display(), %error, "ingestion task aborted");
                    skipped_files.push(SkippedFile {
                        path,
                        reason: IngestError::Task(error.to_string()).to_string(),
                    });
                    continue;
                }
            };

            match outcome {
                Ok(prepared) => {
                    documents += prepared.documents;
                    chunks += prepared.entries.len();
                    info!(
                        path = %prepared.path.display(),
                        chunks = prepared.entries.len(),
                        "file prepared"
                    );
                    for entry in prepared.entries {
                        indexer.add(entry).await?;
                    }
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping file");
                    skipped_files.push(SkippedFile {
                        path,
                        reason: error.to_string(),
                    });
                }
            }
        }

        let stats = indexer.finish().await?;
        skipped_files.sort_by(|left, right| left.path.cmp(&right.path));

        info!(
            collection,
            files = files_seen,
            chunks,
            batches = stats.batches_flushed,
            skipped = skipped_files.len(),
            "indexing finished"
        );

        Ok(IngestionReport {
            collection: collection.to_string(),
            files_seen,
            documents,
            chunks,
            entries_indexed: stats.entries_flushed,
            batches_flushed: stats.batches_flushed,
            skipped_files,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

async fn prepare_file(
    reader: Arc<dyn DocumentReader>,
    chunker: Arc<Chunker>,
    embedder: Arc<dyn Embedder>,
    path: &Path,
) -> Result<PreparedFile, IngestError> {
    let owned = path.to_path_buf();
    let (documents, chunks) = tokio::task::spawn_blocking(move || {
        let documents = reader.read(&owned)?;
        let chunks = chunker.chunk(&documents)?;
        Ok::<_, IngestError>((documents.len(), chunks))
    })
    .await
    .map_err(|error| IngestError::Task(error.to_string()))??;

    let mut entries = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let embedding = embedder.embed(&chunk.text).await?;
        entries.push(chunk.into_entry(embedding));
    }

    Ok(PreparedFile {
        path: path.to_path_buf(),
        documents,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::ChunkingStrategy;
    use crate::stores::InMemoryVectorStore;
    use crate::SearchError;
    use async_trait::async_trait;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    fn ingestor(store: Arc<InMemoryVectorStore>, options: IndexingOptions) -> Ingestor {
        Ingestor::new(Arc::new(CharacterNgramEmbedder::default()), store, options).unwrap()
    }

    #[test]
    fn discovery_honours_recursion_and_extensions() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.txt")).and_then(|mut file| file.write_all(b"a"))?;
        File::create(base.join("b.MD")).and_then(|mut file| file.write_all(b"b"))?;
        File::create(base.join("c.png")).and_then(|mut file| file.write_all(b"c"))?;
        File::create(nested.join("d.txt")).and_then(|mut file| file.write_all(b"d"))?;

        let reader = FileDocumentReader::default();
        assert_eq!(discover_files(base, true, &[], &reader).len(), 3);
        assert_eq!(discover_files(base, false, &[], &reader).len(), 2);

        let only_txt = discover_files(base, true, &[".TXT".to_string()], &reader);
        assert_eq!(only_txt.len(), 2);
        assert!(only_txt.windows(2).all(|pair| pair[0] <= pair[1]));
        Ok(())
    }

    #[tokio::test]
    async fn reindexing_unchanged_corpus_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("pump.txt"),
            "Pumps move fluid.\n\nMaximum pressure is 200 bar.\n\nService every 500 hours.",
        )?;
        fs::write(dir.path().join("valve.md"), "# Valves\n\nValves regulate flow.")?;

        let store = Arc::new(InMemoryVectorStore::new());
        let ingestor = ingestor(store.clone(), IndexingOptions::default());

        let first = ingestor.index_path(dir.path(), true, &[], "docs").await?;
        let count_after_first = store.count("docs").await?;
        let second = ingestor.index_path(dir.path(), true, &[], "docs").await?;

        assert_eq!(first.chunks, 5);
        assert_eq!(first.entries_indexed, second.entries_indexed);
        assert_eq!(count_after_first, 5);
        assert_eq!(store.count("docs").await?, count_after_first);
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_files_are_skipped_and_the_run_continues(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("broken.pdf"), b"%PDF-1.4\n%broken")?;
        fs::write(dir.path().join("good.txt"), "Readable text.")?;

        let store = Arc::new(InMemoryVectorStore::new());
        let report = ingestor(store.clone(), IndexingOptions::default())
            .index_path(dir.path(), false, &[], "docs")
            .await?;

        assert_eq!(report.files_seen, 2);
        assert_eq!(report.entries_indexed, 1);
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(
            report.skipped_files[0].path.file_name().and_then(|name| name.to_str()),
            Some("broken.pdf")
        );
        assert_eq!(store.count("docs").await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn batches_are_flushed_at_the_configured_size() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let paragraphs: Vec<String> = (0..70).map(|i| format!("Paragraph number {i}.")).collect();
        fs::write(dir.path().join("long.txt"), paragraphs.join("\n\n"))?;

        let store = Arc::new(InMemoryVectorStore::new());
        let report = ingestor(store, IndexingOptions::default())
            .index_path(dir.path(), false, &[], "docs")
            .await?;

        assert_eq!(report.entries_indexed, 70);
        assert_eq!(report.batches_flushed, 3);
        Ok(())
    }

    #[tokio::test]
    async fn structural_strategy_indexes_title_sections() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("guide.md"),
            "# Install\n\nRun the installer.\n\n# Configure\n\nEdit the config file.",
        )?;

        let store = Arc::new(InMemoryVectorStore::new());
        let options = IndexingOptions {
            strategy: ChunkingStrategy::Structural,
            ..IndexingOptions::default()
        };
        let report = ingestor(store, options)
            .index_files(vec![dir.path().join("guide.md")], "structural")
            .await?;

        assert_eq!(report.chunks, 2);
        Ok(())
    }

    #[tokio::test]
    async fn missing_root_and_empty_folders_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let ingestor = ingestor(Arc::new(InMemoryVectorStore::new()), IndexingOptions::default());

        assert!(ingestor
            .index_path(&dir.path().join("missing"), true, &[], "docs")
            .await
            .is_err());
        assert!(ingestor.index_path(dir.path(), true, &[], "docs").await.is_err());
        Ok(())
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn dimensions(&self) -> usize {
            4
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, SearchError> {
            Err(SearchError::Embedding("service unavailable".to_string()))
        }
    }

    struct PanickingEmbedder;

    #[async_trait]
    impl Embedder for PanickingEmbedder {
        fn dimensions(&self) -> usize {
            4
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, SearchError> {
            panic!("embedder crashed");
        }
    }

    #[tokio::test]
    async fn crashed_task_is_reported_with_its_path() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("crash.txt");
        fs::write(&file_path, "Some text.")?;

        let store = Arc::new(InMemoryVectorStore::new());
        let report = Ingestor::new(Arc::new(PanickingEmbedder), store, IndexingOptions::default())?
            .index_files(vec![file_path.clone()], "docs")
            .await?;

        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(report.skipped_files[0].path, file_path);
        assert!(report.skipped_files[0].reason.starts_with("ingestion task failed"));
        Ok(())
    }

    #[tokio::test]
    async fn embedding_failure_is_reported_per_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.txt"), "Some text.")?;

        let store = Arc::new(InMemoryVectorStore::new());
        let report = Ingestor::new(Arc::new(FailingEmbedder), store.clone(), IndexingOptions::default())?
            .index_path(dir.path(), false, &[], "docs")
            .await?;

        assert_eq!(report.skipped_files.len(), 1);
        assert!(report.skipped_files[0].reason.contains("service unavailable"));
        assert_eq!(store.count("docs").await?, 0);
        Ok(())
    }
}
