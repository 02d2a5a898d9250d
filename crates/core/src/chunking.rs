use crate::chunk_id::identify_with_prefix;
use crate::error::IngestError;
use crate::layout::{LayoutParser, TextLayoutParser};
use crate::metadata::normalize_metadata;
use crate::models::{
    Chunk, ChunkText, ChunkingStrategy, Document, LayoutElement, Metadata, FILE_PATH_KEY,
    PAGE_NUMBER_KEY,
};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub structural_max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 512,
            overlap_chars: 50,
            structural_max_chars: 1_500,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 || self.structural_max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk sizes must be greater than zero".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk size {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn split_paragraphs(text: &str) -> Result<Vec<String>, IngestError> {
    let blank_line = Regex::new(r"\n[ \t\r]*\n")?;
    Ok(blank_line
        .split(&text.replace("\r\n", "\n"))
        .map(normalize_whitespace)
        .filter(|paragraph| !paragraph.is_empty())
        .collect())
}

#[derive(Debug, Clone, Copy)]
pub struct SentenceSplitter {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl SentenceSplitter {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap: overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let text = normalize_whitespace(text);
        if text.is_empty() {
            return Vec::new();
        }
        if char_len(&text) <= self.chunk_size {
            return vec![text];
        }

        let pieces = split_sentences(&text)
            .into_iter()
            .flat_map(|sentence| split_oversized(&sentence, self.chunk_size))
            .collect::<Vec<_>>();

        let mut chunks = Vec::new();
        let mut window: Vec<String> = Vec::new();

        for piece in pieces {
            if !window.is_empty() && joined_len(&window) + 1 + char_len(&piece) > self.chunk_size {
                chunks.push(window.join(" "));
                window = self.carry_overlap(&window);
                while !window.is_empty()
                    && joined_len(&window) + 1 + char_len(&piece) > self.chunk_size
                {
                    window.remove(0);
                }
            }
            window.push(piece);
        }

        if !window.is_empty() {
            chunks.push(window.join(" "));
        }

        chunks
    }

    fn carry_overlap(&self, window: &[String]) -> Vec<String> {
        let mut carried: Vec<String> = Vec::new();
        for piece in window.iter().rev() {
            let extra = char_len(piece) + usize::from(!carried.is_empty());
            if joined_len(&carried) + extra > self.overlap {
                break;
            }
            carried.insert(0, piece.clone());
        }
        carried
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn joined_len(pieces: &[String]) -> usize {
    if pieces.is_empty() {
        return 0;
    }
    pieces.iter().map(|piece| char_len(piece)).sum::<usize>() + pieces.len() - 1
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let terminal = matches!(c, '.' | '!' | '?' | ';');
        if terminal && chars.peek().map_or(true, |next| next.is_whitespace()) {
            let sentence = current.trim().to_string();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            current.clear();
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

fn split_oversized(sentence: &str, limit: usize) -> Vec<String> {
    if char_len(sentence) <= limit {
        return vec![sentence.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    for word in sentence.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        if chars.len() > limit {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            parts.extend(chars.chunks(limit).map(|slice| slice.iter().collect::<String>()));
            continue;
        }
        let needed = if current.is_empty() {
            chars.len()
        } else {
            char_len(&current) + 1 + chars.len()
        };
        if needed > limit {
            parts.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

pub fn chunk_by_paragraph(
    document: &Document,
    splitter: &SentenceSplitter,
) -> Result<Vec<ChunkText>, IngestError> {
    let mut chunks = Vec::new();
    for paragraph in split_paragraphs(&document.text)? {
        for text in splitter.split(&paragraph) {
            chunks.push(ChunkText {
                text,
                metadata: document.metadata.clone(),
            });
        }
    }
    Ok(chunks)
}

pub fn chunk_structural_elements(elements: &[LayoutElement], max_chars: usize) -> Vec<ChunkText> {
    let mut by_file: BTreeMap<&str, Vec<&LayoutElement>> = BTreeMap::new();
    for element in elements {
        if element.text.trim().is_empty() {
            continue;
        }
        by_file.entry(element.file_path.as_str()).or_default().push(element);
    }

    let mut chunks = Vec::new();
    for (_, mut file_elements) in by_file {
        file_elements.sort_by_key(|element| (element.page, element.position));

        let mut open: Vec<&LayoutElement> = Vec::new();
        let mut open_len = 0usize;

        for element in file_elements {
            let element_len = char_len(&element.text);
            let overflow = !open.is_empty() && open_len + 2 + element_len > max_chars;
            if !open.is_empty() && (element.category.is_boundary() || overflow) {
                chunks.push(structural_chunk(&open));
                open.clear();
                open_len = 0;
            }
            open_len += if open.is_empty() { element_len } else { element_len + 2 };
            open.push(element);
        }

        if !open.is_empty() {
            chunks.push(structural_chunk(&open));
        }
    }
    chunks
}

fn structural_chunk(elements: &[&LayoutElement]) -> ChunkText {
    let text = elements
        .iter()
        .map(|element| element.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let first = elements[0];
    let mut metadata = Metadata::new();
    metadata.insert(FILE_PATH_KEY.to_string(), Value::String(first.file_path.clone()));
    metadata.insert(PAGE_NUMBER_KEY.to_string(), Value::String(first.page.to_string()));
    metadata.insert(
        "category".to_string(),
        Value::String(first.category.as_str().to_string()),
    );
    metadata.insert("element_count".to_string(), Value::from(elements.len()));

    ChunkText { text, metadata }
}

/// The sequence index counts chunks within one page of one file, so edits on
/// one page leave the ids of other pages untouched.
pub fn assemble_chunks(texts: Vec<ChunkText>, hash_prefix_chars: usize) -> Vec<Chunk> {
    let mut positions: BTreeMap<(String, String), u64> = BTreeMap::new();

    texts
        .into_iter()
        .map(|chunk| {
            let metadata = normalize_metadata(chunk.metadata);
            let mut assembled = Chunk {
                id: String::new(),
                text: chunk.text,
                metadata,
                sequence_index: 0,
            };
            let page_key = (
                assembled.file_path().to_string(),
                assembled.page_number().to_string(),
            );
            let position = positions.entry(page_key).or_insert(0);
            assembled.sequence_index = *position;
            *position += 1;
            assembled.id = identify_with_prefix(
                assembled.file_path(),
                assembled.page_number(),
                &assembled.text,
                assembled.sequence_index,
                hash_prefix_chars,
            );
            assembled
        })
        .collect()
}

#[derive(Clone)]
pub struct Chunker {
    strategy: ChunkingStrategy,
    config: ChunkingConfig,
    hash_prefix_chars: usize,
    layout: Arc<dyn LayoutParser>,
}

impl Chunker {
    pub fn new(
        strategy: ChunkingStrategy,
        config: ChunkingConfig,
        hash_prefix_chars: usize,
    ) -> Result<Self, IngestError> {
        config.validate()?;
        Ok(Self {
            strategy,
            config,
            hash_prefix_chars,
            layout: Arc::new(TextLayoutParser::default()),
        })
    }

    pub fn with_layout_parser(mut self, layout: Arc<dyn LayoutParser>) -> Self {
        self.layout = layout;
        self
    }

    pub fn strategy(&self) -> ChunkingStrategy {
        self.strategy
    }

    pub fn chunk(&self, documents: &[Document]) -> Result<Vec<Chunk>, IngestError> {
        let texts = match self.strategy {
            ChunkingStrategy::Standard => {
                let splitter = SentenceSplitter::new(self.config.max_chars, self.config.overlap_chars);
                let mut texts = Vec::new();
                for document in documents {
                    texts.extend(chunk_by_paragraph(document, &splitter)?);
                }
                texts
            }
            ChunkingStrategy::Structural => {
                let elements = documents
                    .iter()
                    .flat_map(|document| self.layout.parse(document))
                    .collect::<Vec<_>>();
                chunk_structural_elements(&elements, self.config.structural_max_chars)
            }
        };

        Ok(assemble_chunks(texts, self.hash_prefix_chars))
    }
}
