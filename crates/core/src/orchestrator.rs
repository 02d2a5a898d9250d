use crate::embeddings::Embedder;
use crate::filter::{deduplicate, margin_filter};
use crate::generation::{GenerationRequest, PromptTemplate, TextGenerator};
use crate::rerank::{rerank_candidates, Reranker};
use crate::traits::VectorIndex;
use crate::{QueryResponse, RetrievalCandidate, RetrievalOptions, SearchError};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub collection: String,
    pub top_k: usize,
    pub rerank: bool,
    pub prompt_template: Option<PromptTemplate>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            collection: collection.into(),
            top_k: RetrievalOptions::default().top_k,
            rerank: false,
            prompt_template: None,
        }
    }
}

pub struct SearchCoordinator {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn TextGenerator>,
    reranker: Option<Arc<dyn Reranker>>,
    options: RetrievalOptions,
}

impl SearchCoordinator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            embedder,
            index,
            generator,
            reranker: None,
            options: RetrievalOptions::default(),
        }
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_options(mut self, options: RetrievalOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn retrieve(
        &self,
        query: &str,
        collection: &str,
        top_k: usize,
        rerank: bool,
    ) -> Result<Vec<RetrievalCandidate>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if !self.index.collection_exists(collection).await? {
            return Err(SearchError::CollectionNotFound(collection.to_string()));
        }

        let embedding = self.embedder.embed(query).await?;
        let n_results = if rerank {
            top_k.saturating_mul(self.options.rerank_pool_multiplier.max(1))
        } else {
            top_k
        };

        self.index.query(collection, &embedding, n_results).await
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<RetrievalCandidate>, SearchError> {
        let top_k = request.top_k.max(1);
        let pool = self
            .retrieve(&request.query, &request.collection, top_k, request.rerank)
            .await?;
        let retrieved = pool.len();

        let ranked = if request.rerank {
            let reranker = self
                .reranker
                .as_deref()
                .ok_or_else(|| SearchError::Rerank("no reranker configured".to_string()))?;
            rerank_candidates(
                reranker,
                &request.query,
                pool,
                top_k,
                self.options.dedup_prefix_chars,
            )
            .await?
        } else {
            deduplicate(
                margin_filter(pool, self.options.distance_margin),
                self.options.dedup_prefix_chars,
            )
        };

        debug!(
            collection = %request.collection,
            retrieved,
            kept = ranked.len(),
            rerank = request.rerank,
            "filtered retrieval candidates"
        );
        Ok(ranked)
    }

    pub async fn answer(&self, request: &SearchRequest) -> Result<QueryResponse, SearchError> {
        let candidates = self.search(request).await?;
        let template = request.prompt_template.clone().unwrap_or_default();
        compose_response(self.generator.as_ref(), &request.query, candidates, &template).await
    }
}

pub async fn compose_response(
    generator: &dyn TextGenerator,
    query: &str,
    candidates: Vec<RetrievalCandidate>,
    template: &PromptTemplate,
) -> Result<QueryResponse, SearchError> {
    let mut remaining = candidates.into_iter();
    let Some(primary) = remaining.next() else {
        return Ok(QueryResponse::no_relevant_documents());
    };

    let answer = generator
        .generate(&GenerationRequest {
            context: &primary.text,
            query,
            template,
        })
        .await?;

    Ok(QueryResponse {
        answer,
        source: Some(primary.metadata),
        supporting: remaining.collect(),
    })
}
