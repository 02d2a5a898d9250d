use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use grounded_search_core::{
    delete_notebook_collections, CharacterNgramEmbedder, ChatCompletionGenerator, ChromaStore,
    ChunkingStrategy, CollectionName, Embedder, HttpEmbedder, HttpReranker, IndexingOptions,
    Ingestor, PromptTemplate, Reranker, RetrievalCandidate, SearchCoordinator, SearchError,
    SearchRequest, TermOverlapReranker, VectorIndex, NO_RELEVANT_DOCUMENTS,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "grounded-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Chroma base URL
    #[arg(long, env = "CHROMA_URL", default_value = "http://localhost:8000")]
    chroma_url: String,

    /// OpenAI-compatible embeddings base URL; the local n-gram embedder is used when unset
    #[arg(long, env = "EMBEDDING_URL")]
    embedding_url: Option<String>,

    /// Embedding model name
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "all-MiniLM-L6-v2")]
    embedding_model: String,

    /// Embedding API key
    #[arg(long, env = "EMBEDDING_API_KEY", hide_env_values = true)]
    embedding_api_key: Option<String>,

    /// Embedding vector dimensions
    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value = "384")]
    embedding_dimensions: usize,

    /// Rerank service base URL; a term-overlap reranker is used when unset
    #[arg(long, env = "RERANK_URL")]
    rerank_url: Option<String>,

    /// Rerank model name
    #[arg(long, env = "RERANK_MODEL", default_value = "cross-encoder/ms-marco-MiniLM-L-6-v2")]
    rerank_model: String,

    /// Rerank API key
    #[arg(long, env = "RERANK_API_KEY", hide_env_values = true)]
    rerank_api_key: Option<String>,

    /// OpenAI-compatible chat completions base URL
    #[arg(long, env = "LLM_URL", default_value = "http://localhost:11434/v1")]
    llm_url: String,

    /// Chat model name
    #[arg(long, env = "LLM_MODEL", default_value = "llama3:latest")]
    llm_model: String,

    /// Chat API key
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    llm_api_key: Option<String>,
}

#[derive(Args, Clone, Copy)]
struct Namespace {
    /// Use the structural (layout-aware) collection
    #[arg(long, default_value_t = false)]
    structural: bool,

    /// Notebook whose collections are addressed
    #[arg(long)]
    notebook: Option<i64>,
}

impl Namespace {
    fn strategy(self) -> ChunkingStrategy {
        if self.structural {
            ChunkingStrategy::Structural
        } else {
            ChunkingStrategy::Standard
        }
    }

    fn collection(self) -> String {
        CollectionName::resolve(self.notebook, self.strategy())
    }
}

#[derive(Subcommand)]
enum Command {
    /// Index every matching file under a folder.
    Index {
        /// Folder to scan.
        #[arg(long)]
        root: PathBuf,
        /// Descend into sub-folders.
        #[arg(long, default_value_t = false)]
        recursive: bool,
        /// Semicolon-separated extension allow-list, e.g. "txt;md;pdf".
        #[arg(long, default_value = "")]
        exts: String,
        #[command(flatten)]
        namespace: Namespace,
    },
    /// Index an explicit list of files into a notebook.
    IndexFiles {
        #[arg(long)]
        notebook: i64,
        #[arg(long, default_value_t = false)]
        structural: bool,
        /// Files to index.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Retrieve passages and answer from the best one.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// Number of passages to return.
        #[arg(long, default_value = "5")]
        top_k: usize,
        /// Rerank a wider candidate pool instead of applying the distance margin.
        #[arg(long, default_value_t = false)]
        rerank: bool,
        /// File holding a prompt template with {query} and {context} placeholders.
        #[arg(long)]
        prompt_file: Option<PathBuf>,
        /// Print passages only, without calling the chat model.
        #[arg(long, default_value_t = false)]
        no_answer: bool,
        #[command(flatten)]
        namespace: Namespace,
    },
    /// Delete both collections of a notebook.
    DeleteNotebook {
        #[arg(long)]
        notebook: i64,
    },
}

fn build_embedder(cli: &Cli) -> Arc<dyn Embedder> {
    match &cli.embedding_url {
        Some(url) => Arc::new(HttpEmbedder::new(
            url,
            cli.embedding_model.clone(),
            cli.embedding_api_key.clone(),
            cli.embedding_dimensions,
        )),
        None => Arc::new(CharacterNgramEmbedder::default()),
    }
}

fn build_reranker(cli: &Cli) -> Arc<dyn Reranker> {
    match &cli.rerank_url {
        Some(url) => Arc::new(HttpReranker::new(
            url,
            cli.rerank_model.clone(),
            cli.rerank_api_key.clone(),
        )),
        None => Arc::new(TermOverlapReranker),
    }
}

fn not_indexed(error: SearchError) -> anyhow::Error {
    match error {
        SearchError::CollectionNotFound(name) => {
            anyhow::anyhow!("collection {name} has not been indexed yet")
        }
        other => other.into(),
    }
}

fn print_passage(label: &str, candidate: &RetrievalCandidate) {
    let page = candidate
        .metadata
        .get("page_number")
        .and_then(|value| value.as_str())
        .unwrap_or("Unknown");
    match candidate.score {
        Some(score) => println!(
            "[{label}] score={score:.4} distance={:.4} source={} page={page}",
            candidate.distance,
            candidate.source_path()
        ),
        None => println!(
            "[{label}] distance={:.4} source={} page={page}",
            candidate.distance,
            candidate.source_path()
        ),
    }
    println!("{}\n", candidate.text);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let embedder = build_embedder(&cli);
    let index: Arc<dyn VectorIndex> = Arc::new(ChromaStore::new(&cli.chroma_url)?);

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "grounded-search boot"
    );

    match &cli.command {
        Command::Index {
            root,
            recursive,
            exts,
            namespace,
        } => {
            let extensions: Vec<String> = exts
                .split(';')
                .map(str::trim)
                .filter(|ext| !ext.is_empty())
                .map(str::to_string)
                .collect();
            let options = IndexingOptions {
                strategy: namespace.strategy(),
                ..IndexingOptions::default()
            };
            let collection = namespace.collection();
            let report = Ingestor::new(embedder, index, options)?
                .index_path(root, *recursive, &extensions, &collection)
                .await?;

            for skipped in &report.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
            }
            println!(
                "{} chunks from {} files indexed into {} ({} skipped) at {}",
                report.entries_indexed,
                report.files_seen.saturating_sub(report.skipped_files.len()),
                report.collection,
                report.skipped_files.len(),
                report.finished_at.to_rfc3339()
            );
        }
        Command::IndexFiles {
            notebook,
            structural,
            paths,
        } => {
            let namespace = Namespace {
                structural: *structural,
                notebook: Some(*notebook),
            };
            let options = IndexingOptions {
                strategy: namespace.strategy(),
                ..IndexingOptions::default()
            };
            let collection = namespace.collection();
            let report = Ingestor::new(embedder, index, options)?
                .index_files(paths.clone(), &collection)
                .await?;

            for skipped in &report.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
            }
            println!(
                "{} chunks indexed into {} ({} skipped)",
                report.entries_indexed,
                report.collection,
                report.skipped_files.len()
            );
        }
        Command::Search {
            query,
            top_k,
            rerank,
            prompt_file,
            no_answer,
            namespace,
        } => {
            let prompt_template = match prompt_file {
                Some(path) => {
                    let raw = tokio::fs::read_to_string(path).await?;
                    Some(PromptTemplate::new(raw)?)
                }
                None => None,
            };

            let generator = Arc::new(ChatCompletionGenerator::new(
                &cli.llm_url,
                cli.llm_model.clone(),
                cli.llm_api_key.clone(),
            ));
            let coordinator =
                SearchCoordinator::new(embedder, index, generator).with_reranker(build_reranker(&cli));

            let request = SearchRequest {
                query: query.clone(),
                collection: namespace.collection(),
                top_k: *top_k,
                rerank: *rerank,
                prompt_template,
            };

            if *no_answer {
                let passages = coordinator.search(&request).await.map_err(not_indexed)?;
                println!("query: {}", request.query);
                if passages.is_empty() {
                    println!("{}", NO_RELEVANT_DOCUMENTS);
                }
                for (rank, passage) in passages.iter().enumerate() {
                    print_passage(&(rank + 1).to_string(), passage);
                }
                return Ok(());
            }

            let response = coordinator.answer(&request).await.map_err(not_indexed)?;

            println!("query: {}", request.query);
            println!("answer:\n{}\n", response.answer);
            match &response.source {
                Some(source) => println!(
                    "source: {} page={}",
                    source
                        .get("file_path")
                        .and_then(|value| value.as_str())
                        .unwrap_or("Unknown"),
                    source
                        .get("page_number")
                        .and_then(|value| value.as_str())
                        .unwrap_or("Unknown")
                ),
                None => println!("source: none"),
            }
            for (rank, passage) in response.supporting.iter().enumerate() {
                print_passage(&format!("supporting {}", rank + 1), passage);
            }
        }
        Command::DeleteNotebook { notebook } => {
            let deleted = delete_notebook_collections(index.as_ref(), *notebook).await?;
            if deleted.is_empty() {
                println!("notebook {notebook} had no collections");
            } else {
                println!("deleted collections: {}", deleted.join(", "));
            }
        }
    }

    Ok(())
}
