use crate::error::{IndexAborted, PipelineError};
use crate::models::{EmbedPurpose, IndexOutcome};
use crate::traits::{ChunkSource, ModelProvider, VectorStore};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

/// Result of driving one page through the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStep {
    Inserted(usize),
    Done,
}

/// One paginated indexing run, modeled as an explicit cursor rather than a
/// free-form loop: pull a page, embed it as a single batch, upsert it under
/// record ids that continue the running counter, advance. Pages run
/// strictly sequentially so record ids and reported progress stay monotonic
/// and reproducible.
pub struct IndexRun<'a, C, S>
where
    C: ChunkSource,
    S: VectorStore,
{
    source: &'a C,
    store: &'a S,
    embedding: &'a dyn ModelProvider,
    collection: &'a str,
    project_id: &'a str,
    page_size: usize,
    insert_batch_size: usize,
    page_no: usize,
    next_record_id: u64,
    inserted: usize,
    pages: usize,
}

impl<'a, C, S> IndexRun<'a, C, S>
where
    C: ChunkSource,
    S: VectorStore,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: &'a C,
        store: &'a S,
        embedding: &'a dyn ModelProvider,
        collection: &'a str,
        project_id: &'a str,
        page_size: usize,
        insert_batch_size: usize,
    ) -> Self {
        Self {
            source,
            store,
            embedding,
            collection,
            project_id,
            page_size,
            insert_batch_size,
            page_no: 1,
            next_record_id: 0,
            inserted: 0,
            pages: 0,
        }
    }

    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Process the next page. Returns [`IndexStep::Done`] on the first
    /// empty page.
    pub async fn step(&mut self) -> Result<IndexStep, PipelineError> {
        let page = self
            .source
            .chunks_page(self.project_id, self.page_no, self.page_size)
            .await?;

        if page.is_empty() {
            return Ok(IndexStep::Done);
        }

        let texts: Vec<String> = page.iter().map(|chunk| chunk.text.clone()).collect();
        let metadata: Vec<Value> = page.iter().map(|chunk| chunk.metadata.clone()).collect();

        let vectors = self
            .embedding
            .embed_batch(&texts, EmbedPurpose::Document)
            .await?;

        let record_ids: Vec<u64> = (0..page.len() as u64)
            .map(|offset| self.next_record_id + offset)
            .collect();

        self.store
            .insert_many(
                self.collection,
                &texts,
                &vectors,
                &metadata,
                Some(&record_ids),
                self.insert_batch_size,
            )
            .await?;

        self.next_record_id += page.len() as u64;
        self.inserted += page.len();
        self.pages += 1;
        debug!(
            project_id = self.project_id,
            page_no = self.page_no,
            page_len = page.len(),
            inserted = self.inserted,
            "page indexed"
        );
        self.page_no += 1;

        Ok(IndexStep::Inserted(page.len()))
    }

    /// Drive the run to its terminal state. Any page failure aborts
    /// immediately, carrying the count inserted so far; nothing is skipped
    /// silently.
    pub async fn run(mut self) -> Result<IndexOutcome, IndexAborted> {
        loop {
            match self.step().await {
                Ok(IndexStep::Inserted(_)) => {}
                Ok(IndexStep::Done) => {
                    info!(
                        project_id = self.project_id,
                        collection = self.collection,
                        inserted = self.inserted,
                        pages = self.pages,
                        "indexing run finished"
                    );
                    return Ok(IndexOutcome {
                        inserted: self.inserted,
                        pages: self.pages,
                        finished_at: Utc::now(),
                    });
                }
                Err(source) => {
                    return Err(IndexAborted {
                        inserted: self.inserted,
                        source,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::IndexRun;
    use crate::error::StoreError;
    use crate::models::{Chunk, CollectionInfo, RetrievedDocument};
    use crate::test_support::FakeProvider;
    use crate::traits::{ChunkSource, VectorStore};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct ScriptedChunkSource {
        pages: Vec<Vec<Chunk>>,
    }

    impl ScriptedChunkSource {
        fn with_page_sizes(sizes: &[usize]) -> Self {
            let mut order = 0u64;
            let pages = sizes
                .iter()
                .map(|size| {
                    (0..*size)
                        .map(|_| {
                            let chunk = Chunk {
                                text: format!("chunk body {order}"),
                                metadata: json!({ "order": order }),
                                order,
                                project_id: "p1".to_string(),
                                external_id: None,
                            };
                            order += 1;
                            chunk
                        })
                        .collect()
                })
                .collect();
            Self { pages }
        }
    }

    #[async_trait]
    impl ChunkSource for ScriptedChunkSource {
        async fn chunks_page(
            &self,
            _project_id: &str,
            page_no: usize,
            _page_size: usize,
        ) -> Result<Vec<Chunk>, StoreError> {
            Ok(self.pages.get(page_no - 1).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        record_ids: Mutex<Vec<u64>>,
        insert_calls: Mutex<usize>,
        fail_on_call: Option<usize>,
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        async fn create_collection(
            &self,
            _name: &str,
            _embedding_size: usize,
            _reset: bool,
        ) -> Result<bool, StoreError> {
            Ok(true)
        }

        async fn delete_collection(&self, _name: &str) -> Result<bool, StoreError> {
            Ok(true)
        }

        async fn collection_info(&self, name: &str) -> Result<CollectionInfo, StoreError> {
            Err(StoreError::MissingCollection(name.to_string()))
        }

        async fn insert_many(
            &self,
            _name: &str,
            _texts: &[String],
            _vectors: &[Vec<f32>],
            _metadata: &[Value],
            record_ids: Option<&[u64]>,
            _batch_size: usize,
        ) -> Result<(), StoreError> {
            let mut calls = self.insert_calls.lock().unwrap();
            *calls += 1;
            if self.fail_on_call == Some(*calls) {
                return Err(StoreError::BackendResponse {
                    backend: "recording".to_string(),
                    details: "injected failure".to_string(),
                });
            }
            self.record_ids
                .lock()
                .unwrap()
                .extend_from_slice(record_ids.unwrap_or_default());
            Ok(())
        }

        async fn search_by_vector(
            &self,
            _name: &str,
            _query_vector: &[f32],
            _limit: usize,
        ) -> Result<Vec<RetrievedDocument>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn record_ids_are_monotonic_across_uneven_pages() {
        let source = ScriptedChunkSource::with_page_sizes(&[3, 5, 2]);
        let store = RecordingStore::default();
        let provider = FakeProvider::with_size(8);

        let outcome = IndexRun::new(&source, &store, &provider, "c", "p1", 5, 50)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 10);
        assert_eq!(outcome.pages, 3);
        let ids = store.record_ids.lock().unwrap().clone();
        assert_eq!(ids, (0..10).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn a_failing_page_aborts_with_the_partial_count() {
        let source = ScriptedChunkSource::with_page_sizes(&[3, 5, 2]);
        let store = RecordingStore {
            fail_on_call: Some(2),
            ..RecordingStore::default()
        };
        let provider = FakeProvider::with_size(8);

        let error = IndexRun::new(&source, &store, &provider, "c", "p1", 5, 50)
            .run()
            .await
            .unwrap_err();

        assert_eq!(error.inserted, 3);
    }

    #[tokio::test]
    async fn an_empty_source_finishes_with_zero_inserted() {
        let source = ScriptedChunkSource { pages: Vec::new() };
        let store = RecordingStore::default();
        let provider = FakeProvider::with_size(8);

        let outcome = IndexRun::new(&source, &store, &provider, "c", "p1", 5, 50)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 0);
        assert_eq!(outcome.pages, 0);
    }
}
