use crate::error::SearchError;
use crate::filter::dedup_key;
use crate::RetrievalCandidate;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[async_trait]
pub trait Reranker: Send + Sync {
    async fn score(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>, SearchError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TermOverlapReranker;

fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl Reranker for TermOverlapReranker {
    async fn score(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>, SearchError> {
        let query_terms: HashSet<String> = terms(query).into_iter().collect();
        if query_terms.is_empty() {
            return Ok(vec![0.0; documents.len()]);
        }

        Ok(documents
            .iter()
            .map(|document| {
                let document_terms: HashSet<String> = terms(document).into_iter().collect();
                let matched = query_terms.intersection(&document_terms).count();
                matched as f32 / query_terms.len() as f32
            })
            .collect())
    }
}

#[derive(Clone)]
pub struct HttpReranker {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [&'a str],
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

impl HttpReranker {
    pub fn new(base_url: impl AsRef<str>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/rerank", base_url.as_ref().trim_end_matches('/')),
            model: model.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn score(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>, SearchError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(&self.endpoint).json(&RerankRequest {
            model: &self.model,
            query,
            documents,
        });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SearchError::Rerank(format!(
                "{} returned {}",
                self.endpoint,
                response.status()
            )));
        }

        let parsed: RerankResponse = response.json().await?;
        scores_by_index(parsed.results, documents.len())
    }
}

fn scores_by_index(results: Vec<RerankResult>, expected: usize) -> Result<Vec<f32>, SearchError> {
    let mut scores = vec![None; expected];
    for result in results {
        let slot = scores.get_mut(result.index).ok_or_else(|| {
            SearchError::Rerank(format!("score index {} out of range", result.index))
        })?;
        *slot = Some(result.relevance_score);
    }
    scores
        .into_iter()
        .enumerate()
        .map(|(index, score)| {
            score.ok_or_else(|| SearchError::Rerank(format!("no score for document {index}")))
        })
        .collect()
}

pub async fn rerank_candidates(
    reranker: &dyn Reranker,
    query: &str,
    pool: Vec<RetrievalCandidate>,
    top_k: usize,
    dedup_prefix_chars: usize,
) -> Result<Vec<RetrievalCandidate>, SearchError> {
    if pool.is_empty() {
        return Ok(pool);
    }

    let documents: Vec<&str> = pool.iter().map(|candidate| candidate.text.as_str()).collect();
    let scores = reranker.score(query, &documents).await?;
    if scores.len() != pool.len() {
        return Err(SearchError::Rerank(format!(
            "{} scores for {} documents",
            scores.len(),
            pool.len()
        )));
    }

    let mut scored: Vec<RetrievalCandidate> = pool
        .into_iter()
        .zip(scores)
        .map(|(mut candidate, score)| {
            candidate.score = Some(score);
            candidate
        })
        .collect();
    scored.sort_by(|left, right| {
        let left = left.score.unwrap_or(f32::MIN);
        let right = right.score.unwrap_or(f32::MIN);
        right.total_cmp(&left)
    });

    let mut seen = HashSet::new();
    Ok(scored
        .into_iter()
        .filter(|candidate| seen.insert(dedup_key(candidate, dedup_prefix_chars)))
        .take(top_k)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Metadata;
    use serde_json::Value;

    struct FixedScores(Vec<f32>);

    #[async_trait]
    impl Reranker for FixedScores {
        async fn score(&self, _query: &str, _documents: &[&str]) -> Result<Vec<f32>, SearchError> {
            Ok(self.0.clone())
        }
    }

    fn candidate(path: &str, text: &str) -> RetrievalCandidate {
        let mut metadata = Metadata::new();
        metadata.insert("file_path".to_string(), Value::from(path));
        RetrievalCandidate {
            text: text.to_string(),
            metadata,
            distance: 0.5,
            score: None,
        }
    }

    #[tokio::test]
    async fn output_is_sorted_deduplicated_and_truncated() {
        let pool = vec![
            candidate("/a", "low"),
            candidate("/a", "dup"),
            candidate("/a", "dup"),
            candidate("/b", "high"),
            candidate("/c", "mid"),
        ];
        let reranker = FixedScores(vec![0.1, 0.7, 0.6, 0.9, 0.5]);

        let ranked = rerank_candidates(&reranker, "q", pool, 3, 50).await.unwrap();
        let texts: Vec<_> = ranked.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["high", "dup", "mid"]);
        assert!(ranked
            .windows(2)
            .all(|pair| pair[0].score.unwrap_or_default() >= pair[1].score.unwrap_or_default()));
        assert_eq!(ranked[1].score, Some(0.7));
    }

    #[tokio::test]
    async fn length_is_bounded_by_the_deduplicated_pool() {
        let pool = vec![candidate("/a", "same"), candidate("/a", "same")];
        let ranked = rerank_candidates(&FixedScores(vec![0.2, 0.3]), "q", pool, 5, 50)
            .await
            .unwrap();
        assert_eq!(ranked.len(), 1);
    }

    #[tokio::test]
    async fn score_count_mismatch_is_an_error() {
        let pool = vec![candidate("/a", "one")];
        let result = rerank_candidates(&FixedScores(Vec::new()), "q", pool, 5, 50).await;
        assert!(matches!(result, Err(SearchError::Rerank(_))));
    }

    #[tokio::test]
    async fn term_overlap_prefers_documents_sharing_query_terms() {
        let scores = TermOverlapReranker
            .score("pump pressure", &["the pump pressure is high", "unrelated text", "pump only"])
            .await
            .unwrap();
        assert_eq!(scores, vec![1.0, 0.0, 0.5]);
    }

    #[test]
    fn http_scores_are_mapped_back_to_document_order() {
        let results = vec![
            RerankResult {
                index: 1,
                relevance_score: 0.9,
            },
            RerankResult {
                index: 0,
                relevance_score: 0.2,
            },
        ];
        assert_eq!(scores_by_index(results, 2).unwrap(), vec![0.2, 0.9]);
        assert!(scores_by_index(Vec::new(), 1).is_err());
    }
}
