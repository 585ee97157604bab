use crate::error::StoreError;
use crate::models::{CollectionInfo, RetrievedDocument};
use crate::stores::check_insert_arity;
use crate::traits::VectorStore;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

struct MemoryPoint {
    text: String,
    vector: Vec<f32>,
    metadata: Value,
}

struct MemoryCollection {
    embedding_size: usize,
    points: HashMap<String, MemoryPoint>,
}

/// Dependency-free vector backend: named collections over a map, cosine
/// scoring. Useful for local runs and as the store fixture in tests.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let left_norm: f32 = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm: f32 = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    f64::from(dot / (left_norm * right_norm))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(
        &self,
        name: &str,
        embedding_size: usize,
        reset: bool,
    ) -> Result<bool, StoreError> {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if collections.contains_key(name) && !reset {
            return Ok(false);
        }

        collections.insert(
            name.to_string(),
            MemoryCollection {
                embedding_size,
                points: HashMap::new(),
            },
        );
        Ok(true)
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, StoreError> {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(collections.remove(name).is_some())
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo, StoreError> {
        let collections = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let collection = collections
            .get(name)
            .ok_or_else(|| StoreError::MissingCollection(name.to_string()))?;

        Ok(CollectionInfo {
            status: "green".to_string(),
            points_count: collection.points.len() as u64,
            vectors_size: collection.embedding_size,
            distance: "Cosine".to_string(),
        })
    }

    async fn insert_many(
        &self,
        name: &str,
        texts: &[String],
        vectors: &[Vec<f32>],
        metadata: &[Value],
        record_ids: Option<&[u64]>,
        _batch_size: usize,
    ) -> Result<(), StoreError> {
        check_insert_arity(
            texts.len(),
            vectors.len(),
            metadata.len(),
            record_ids.map(<[u64]>::len),
        )?;

        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| StoreError::MissingCollection(name.to_string()))?;

        for (index, vector) in vectors.iter().enumerate() {
            if vector.len() != collection.embedding_size {
                return Err(StoreError::BackendResponse {
                    backend: "memory".to_string(),
                    details: format!(
                        "vector length {} does not match collection size {}",
                        vector.len(),
                        collection.embedding_size
                    ),
                });
            }

            let id = match record_ids {
                Some(ids) => ids[index].to_string(),
                None => Uuid::new_v4().to_string(),
            };
            collection.points.insert(
                id,
                MemoryPoint {
                    text: texts[index].clone(),
                    vector: vector.clone(),
                    metadata: metadata[index].clone(),
                },
            );
        }

        Ok(())
    }

    async fn search_by_vector(
        &self,
        name: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>, StoreError> {
        let collections = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let collection = collections
            .get(name)
            .ok_or_else(|| StoreError::MissingCollection(name.to_string()))?;

        let mut scored: Vec<RetrievedDocument> = collection
            .points
            .values()
            .map(|point| RetrievedDocument {
                text: point.text.clone(),
                metadata: point.metadata.clone(),
                score: cosine_similarity(&point.vector, query_vector),
            })
            .collect();

        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(limit);
        Ok(scored)
    }
}
