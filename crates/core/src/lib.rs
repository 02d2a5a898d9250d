pub mod chunk_id;
pub mod chunking;
pub mod collection;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod generation;
pub mod indexer;
pub mod ingest;
pub mod layout;
pub mod metadata;
pub mod models;
pub mod orchestrator;
pub mod rerank;
pub mod stores;
pub mod traits;

pub use chunk_id::{identify, identify_with_prefix};
pub use chunking::{
    assemble_chunks, chunk_by_paragraph, chunk_structural_elements, normalize_whitespace,
    split_paragraphs, Chunker, ChunkingConfig, SentenceSplitter,
};
pub use collection::{delete_notebook_collections, CollectionName};
pub use embeddings::{CharacterNgramEmbedder, Embedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IngestError, SearchError};
pub use extractor::{DocumentReader, FileDocumentReader, LopdfExtractor, PageText, PdfExtractor};
pub use filter::{dedup_key, deduplicate, margin_filter};
pub use generation::{
    ChatCompletionGenerator, GenerationRequest, PromptTemplate, TextGenerator,
    DEFAULT_PROMPT_TEMPLATE,
};
pub use indexer::{BatchIndexer, BatchState, BatchStats, DEFAULT_BATCH_SIZE};
pub use ingest::{discover_files, IngestionReport, Ingestor, SkippedFile};
pub use layout::{LayoutParser, TextLayoutParser};
pub use metadata::normalize_metadata;
pub use models::{
    Chunk, ChunkText, ChunkingStrategy, Document, ElementCategory, IndexEntry, IndexingOptions,
    LayoutElement, Metadata, QueryResponse, RetrievalCandidate, RetrievalOptions,
    NO_RELEVANT_DOCUMENTS,
};
pub use orchestrator::{compose_response, SearchCoordinator, SearchRequest};
pub use rerank::{rerank_candidates, HttpReranker, Reranker, TermOverlapReranker};
pub use stores::{ChromaStore, InMemoryVectorStore};
pub use traits::VectorIndex;
