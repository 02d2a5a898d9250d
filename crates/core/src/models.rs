use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::chunking::ChunkingConfig;
use crate::error::IngestError;

pub type Metadata = serde_json::Map<String, Value>;

pub const UNKNOWN: &str = "Unknown";
pub const FILE_PATH_KEY: &str = "file_path";
pub const PAGE_NUMBER_KEY: &str = "page_number";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>, file_path: impl Into<String>, page_label: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(FILE_PATH_KEY.to_string(), Value::String(file_path.into()));
        metadata.insert("page_label".to_string(), Value::String(page_label.into()));
        Self {
            text: text.into(),
            metadata,
        }
    }

    pub fn file_path(&self) -> &str {
        metadata_str(&self.metadata, FILE_PATH_KEY).unwrap_or(UNKNOWN)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ElementCategory {
    Title,
    Table,
    NarrativeText,
    ListItem,
}

impl ElementCategory {
    pub fn is_boundary(self) -> bool {
        matches!(self, ElementCategory::Title | ElementCategory::Table)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ElementCategory::Title => "Title",
            ElementCategory::Table => "Table",
            ElementCategory::NarrativeText => "NarrativeText",
            ElementCategory::ListItem => "ListItem",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutElement {
    pub text: String,
    pub category: ElementCategory,
    pub file_path: String,
    pub page: u32,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkText {
    pub text: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub sequence_index: u64,
}

impl Chunk {
    pub fn file_path(&self) -> &str {
        metadata_str(&self.metadata, FILE_PATH_KEY).unwrap_or(UNKNOWN)
    }

    pub fn page_number(&self) -> &str {
        metadata_str(&self.metadata, PAGE_NUMBER_KEY).unwrap_or(UNKNOWN)
    }

    pub fn into_entry(self, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            id: self.id,
            embedding,
            document: self.text,
            metadata: self.metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub embedding: Vec<f32>,
    pub document: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalCandidate {
    pub text: String,
    pub metadata: Metadata,
    pub distance: f32,
    pub score: Option<f32>,
}

impl RetrievalCandidate {
    pub fn source_path(&self) -> &str {
        metadata_str(&self.metadata, FILE_PATH_KEY).unwrap_or(UNKNOWN)
    }
}

pub const NO_RELEVANT_DOCUMENTS: &str = "No relevant documents found.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub answer: String,
    pub source: Option<Metadata>,
    pub supporting: Vec<RetrievalCandidate>,
}

impl QueryResponse {
    pub fn no_relevant_documents() -> Self {
        Self {
            answer: NO_RELEVANT_DOCUMENTS.to_string(),
            source: None,
            supporting: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.supporting.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    #[default]
    Standard,
    Structural,
}

impl fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkingStrategy::Standard => f.write_str("standard"),
            ChunkingStrategy::Structural => f.write_str("structural"),
        }
    }
}

impl FromStr for ChunkingStrategy {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(ChunkingStrategy::Standard),
            "structural" | "advanced" | "unstructured" => Ok(ChunkingStrategy::Structural),
            other => Err(IngestError::InvalidArgument(format!(
                "unknown chunking strategy: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexingOptions {
    pub strategy: ChunkingStrategy,
    pub chunking: ChunkingConfig,
    pub batch_size: usize,
    pub hash_prefix_chars: usize,
}

impl Default for IndexingOptions {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::Standard,
            chunking: ChunkingConfig::default(),
            batch_size: 32,
            hash_prefix_chars: crate::chunk_id::DEFAULT_HASH_PREFIX_CHARS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub top_k: usize,
    pub distance_margin: f32,
    pub dedup_prefix_chars: usize,
    pub rerank_pool_multiplier: usize,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            distance_margin: 0.05,
            dedup_prefix_chars: 50,
            rerank_pool_multiplier: 4,
        }
    }
}

pub(crate) fn metadata_str<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(Value::as_str)
}
