use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("service call failed: {0}")]
    Service(#[from] SearchError),

    #[error("ingestion task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("collection `{0}` not found; index documents into it first")]
    CollectionNotFound(String),

    #[error("query is empty")]
    EmptyQuery,

    #[error("embedding service failed: {0}")]
    Embedding(String),

    #[error("rerank service failed: {0}")]
    Rerank(String),

    #[error("generation service failed: {0}")]
    Generation(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
