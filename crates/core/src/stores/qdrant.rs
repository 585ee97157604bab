use crate::error::StoreError;
use crate::models::{CollectionInfo, RetrievedDocument};
use crate::stores::{batch_ranges, check_insert_arity};
use crate::traits::VectorStore;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    Cosine,
    Dot,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
            Distance::Dot => "Dot",
        }
    }
}

impl FromStr for Distance {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Distance::Cosine),
            "dot" => Ok(Distance::Dot),
            other => Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: format!("unsupported distance metric: {other}"),
            }),
        }
    }
}

/// Qdrant REST backend. Record payloads carry the chunk text under `text`
/// and the caller's metadata object under `metadata`.
pub struct QdrantStore {
    endpoint: String,
    client: Client,
    distance: Distance,
}

impl QdrantStore {
    pub fn new(endpoint: impl Into<String>, distance: Distance) -> Self {
        let endpoint = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: Client::new(),
            distance,
        }
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        let response = self
            .client
            .get(format!("{}/collections/{}", self.endpoint, name))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: status.to_string(),
            }),
        }
    }

    fn point_id(record_ids: Option<&[u64]>, index: usize) -> Value {
        match record_ids {
            Some(ids) => json!(ids[index]),
            None => json!(Uuid::new_v4().to_string()),
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn create_collection(
        &self,
        name: &str,
        embedding_size: usize,
        reset: bool,
    ) -> Result<bool, StoreError> {
        if reset {
            self.delete_collection(name).await?;
        } else if self.collection_exists(name).await? {
            return Ok(false);
        }

        let response = self
            .client
            .put(format!("{}/collections/{}", self.endpoint, name))
            .json(&json!({
                "vectors": {
                    "size": embedding_size,
                    "distance": self.distance.as_str(),
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(true)
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, StoreError> {
        let response = self
            .client
            .delete(format!("{}/collections/{}", self.endpoint, name))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let parsed: Value = response.json().await?;
                Ok(parsed
                    .pointer("/result")
                    .and_then(Value::as_bool)
                    .unwrap_or(true))
            }
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: status.to_string(),
            }),
        }
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo, StoreError> {
        let response = self
            .client
            .get(format!("{}/collections/{}", self.endpoint, name))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::MissingCollection(name.to_string()));
        }
        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let result = parsed.pointer("/result").cloned().unwrap_or(Value::Null);

        Ok(CollectionInfo {
            status: result
                .pointer("/status")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            points_count: result
                .pointer("/points_count")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            vectors_size: result
                .pointer("/config/params/vectors/size")
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize,
            distance: result
                .pointer("/config/params/vectors/distance")
                .and_then(Value::as_str)
                .unwrap_or(self.distance.as_str())
                .to_string(),
        })
    }

    async fn insert_many(
        &self,
        name: &str,
        texts: &[String],
        vectors: &[Vec<f32>],
        metadata: &[Value],
        record_ids: Option<&[u64]>,
        batch_size: usize,
    ) -> Result<(), StoreError> {
        check_insert_arity(
            texts.len(),
            vectors.len(),
            metadata.len(),
            record_ids.map(<[u64]>::len),
        )?;

        for range in batch_ranges(texts.len(), batch_size) {
            let points: Vec<Value> = range
                .map(|index| {
                    json!({
                        "id": Self::point_id(record_ids, index),
                        "vector": vectors[index],
                        "payload": {
                            "text": texts[index],
                            "metadata": metadata[index],
                        },
                    })
                })
                .collect();

            let response = self
                .client
                .put(format!(
                    "{}/collections/{}/points?wait=true",
                    self.endpoint, name
                ))
                .json(&json!({ "points": points }))
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(StoreError::BackendResponse {
                    backend: "qdrant".to_string(),
                    details: response.status().to_string(),
                });
            }
        }

        Ok(())
    }

    async fn search_by_vector(
        &self,
        name: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>, StoreError> {
        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.endpoint, name
            ))
            .json(&json!({
                "vector": query_vector,
                "limit": limit,
                "with_payload": true,
            }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::MissingCollection(name.to_string()));
        }
        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut documents = Vec::new();
        for hit in hits {
            documents.push(RetrievedDocument {
                text: hit
                    .pointer("/payload/text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                metadata: hit
                    .pointer("/payload/metadata")
                    .cloned()
                    .unwrap_or(Value::Null),
                score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0),
            });
        }

        Ok(documents)
    }
}
