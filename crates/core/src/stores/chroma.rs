use crate::traits::VectorIndex;
use crate::{IndexEntry, Metadata, RetrievalCandidate, SearchError};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use url::Url;

const BACKEND: &str = "chroma";

pub struct ChromaStore {
    endpoint: Url,
    client: Client,
}

impl ChromaStore {
    pub fn new(endpoint: impl AsRef<str>) -> Result<Self, SearchError> {
        let mut endpoint = Url::parse(endpoint.as_ref())?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        Ok(Self {
            endpoint,
            client: Client::new(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, SearchError> {
        Ok(self.endpoint.join(&format!("api/v1/{path}"))?)
    }

    async fn collection_id(&self, collection: &str) -> Result<Option<String>, SearchError> {
        let response = self
            .client
            .get(self.url(&format!("collections/{collection}"))?)
            .send()
            .await?;

        if response.status().is_success() {
            let body: Value = response.json().await?;
            return parse_collection_id(&body).map(Some);
        }

        let status = response.status();
        let details = response.text().await.unwrap_or_default();
        if is_missing_collection(status, &details) {
            return Ok(None);
        }
        Err(SearchError::BackendResponse {
            backend: BACKEND.to_string(),
            details: format!("{status}: {details}"),
        })
    }

    async fn require_collection_id(&self, collection: &str) -> Result<String, SearchError> {
        self.collection_id(collection)
            .await?
            .ok_or_else(|| SearchError::CollectionNotFound(collection.to_string()))
    }

    async fn get_or_create(&self, collection: &str) -> Result<String, SearchError> {
        let response = self
            .client
            .post(self.url("collections")?)
            .json(&json!({ "name": collection, "get_or_create": true }))
            .send()
            .await?;
        let body = success_json(response).await?;
        parse_collection_id(&body)
    }
}

async fn success_json(response: Response) -> Result<Value, SearchError> {
    if !response.status().is_success() {
        let status = response.status();
        let details = response.text().await.unwrap_or_default();
        return Err(SearchError::BackendResponse {
            backend: BACKEND.to_string(),
            details: format!("{status}: {details}"),
        });
    }
    Ok(response.json().await?)
}

fn is_missing_collection(status: StatusCode, details: &str) -> bool {
    status == StatusCode::NOT_FOUND || details.contains("does not exist")
}

fn parse_collection_id(body: &Value) -> Result<String, SearchError> {
    body.pointer("/id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SearchError::BackendResponse {
            backend: BACKEND.to_string(),
            details: "collection response has no id".to_string(),
        })
}

pub(crate) fn parse_query_response(body: &Value) -> Result<Vec<RetrievalCandidate>, SearchError> {
    let first = |key: &str| -> Vec<Value> {
        body.pointer(&format!("/{key}/0"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    };

    let documents = first("documents");
    let metadatas = first("metadatas");
    let distances = first("distances");

    if documents.len() != distances.len() {
        return Err(SearchError::BackendResponse {
            backend: BACKEND.to_string(),
            details: format!(
                "{} documents but {} distances",
                documents.len(),
                distances.len()
            ),
        });
    }

    Ok(documents
        .into_iter()
        .zip(distances)
        .enumerate()
        .map(|(index, (document, distance))| RetrievalCandidate {
            text: document.as_str().unwrap_or_default().to_string(),
            metadata: metadatas
                .get(index)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_else(Metadata::new),
            distance: distance.as_f64().unwrap_or(f64::MAX) as f32,
            score: None,
        })
        .collect())
}

#[async_trait]
impl VectorIndex for ChromaStore {
    async fn ensure_collection(&self, collection: &str) -> Result<(), SearchError> {
        self.get_or_create(collection).await.map(|_| ())
    }

    async fn upsert(&self, collection: &str, entries: &[IndexEntry]) -> Result<(), SearchError> {
        if entries.is_empty() {
            return Ok(());
        }

        let collection_id = self.get_or_create(collection).await?;
        let payload = json!({
            "ids": entries.iter().map(|entry| entry.id.as_str()).collect::<Vec<_>>(),
            "embeddings": entries.iter().map(|entry| &entry.embedding).collect::<Vec<_>>(),
            "documents": entries.iter().map(|entry| entry.document.as_str()).collect::<Vec<_>>(),
            "metadatas": entries.iter().map(|entry| &entry.metadata).collect::<Vec<_>>(),
        });

        let response = self
            .client
            .post(self.url(&format!("collections/{collection_id}/upsert"))?)
            .json(&payload)
            .send()
            .await?;
        success_json(response).await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<RetrievalCandidate>, SearchError> {
        let collection_id = self.require_collection_id(collection).await?;
        let response = self
            .client
            .post(self.url(&format!("collections/{collection_id}/query"))?)
            .json(&json!({
                "query_embeddings": [embedding],
                "n_results": n_results,
                "include": ["documents", "metadatas", "distances"],
            }))
            .send()
            .await?;

        let body = success_json(response).await?;
        parse_query_response(&body)
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, SearchError> {
        Ok(self.collection_id(collection).await?.is_some())
    }

    async fn count(&self, collection: &str) -> Result<usize, SearchError> {
        let collection_id = self.require_collection_id(collection).await?;
        let response = self
            .client
            .get(self.url(&format!("collections/{collection_id}/count"))?)
            .send()
            .await?;
        let body = success_json(response).await?;
        body.as_u64()
            .map(|count| count as usize)
            .ok_or_else(|| SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("count is not an integer: {body}"),
            })
    }

    async fn delete_collection(&self, collection: &str) -> Result<bool, SearchError> {
        if self.collection_id(collection).await?.is_none() {
            return Ok(false);
        }
        let response = self
            .client
            .delete(self.url(&format!("collections/{collection}"))?)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(true)
    }
}
