use crate::error::{IndexAborted, PipelineError, ProviderError};
use crate::indexer::IndexRun;
use crate::models::{
    AnswerBundle, ChatRole, CollectionHandle, CollectionInfo, EmbedPurpose, GenerationOptions,
    IndexOutcome, RetrievalOutcome,
};
use crate::traits::{ChunkSource, ModelProvider, TemplateRenderer, VectorStore};
use tracing::{info, warn};

pub const DEFAULT_INSERT_BATCH_SIZE: usize = 50;

/// Ties the pipeline together: paginated indexing, query-time retrieval,
/// and grounded answer assembly over whichever chunk source, vector store,
/// and model backends it was built with.
pub struct RagCoordinator<C, S>
where
    C: ChunkSource,
    S: VectorStore,
{
    chunks: C,
    store: S,
    generation: Box<dyn ModelProvider>,
    embedding: Box<dyn ModelProvider>,
    templates: Box<dyn TemplateRenderer>,
    insert_batch_size: usize,
}

impl<C, S> RagCoordinator<C, S>
where
    C: ChunkSource + Send + Sync,
    S: VectorStore + Send + Sync,
{
    pub fn new(
        chunks: C,
        store: S,
        generation: Box<dyn ModelProvider>,
        embedding: Box<dyn ModelProvider>,
        templates: Box<dyn TemplateRenderer>,
    ) -> Self {
        Self {
            chunks,
            store,
            generation,
            embedding,
            templates,
            insert_batch_size: DEFAULT_INSERT_BATCH_SIZE,
        }
    }

    pub fn with_insert_batch_size(mut self, batch_size: usize) -> Self {
        self.insert_batch_size = batch_size.max(1);
        self
    }

    fn embedding_size(&self) -> Result<usize, PipelineError> {
        self.embedding
            .embedding_size()
            .ok_or_else(|| {
                ProviderError::Configuration {
                    backend: self.embedding.backend().to_string(),
                    details: "embedding model is not set".to_string(),
                }
                .into()
            })
    }

    /// Deterministic collection handle for a project under the currently
    /// configured embedding dimensionality.
    pub fn collection_handle(&self, project_id: &str) -> Result<CollectionHandle, PipelineError> {
        Ok(CollectionHandle::for_project(
            self.embedding_size()?,
            project_id,
        ))
    }

    /// Run one paginated indexing pass for a project. The collection is
    /// created lazily here, honoring `reset`; pages then flow through
    /// [`IndexRun`] strictly in order. Failure carries the count inserted
    /// before the abort.
    pub async fn index(
        &self,
        project_id: &str,
        reset: bool,
        page_size: usize,
    ) -> Result<IndexOutcome, IndexAborted> {
        let aborted = |source: PipelineError| IndexAborted {
            inserted: 0,
            source,
        };

        let embedding_size = self.embedding_size().map_err(aborted)?;
        let handle = CollectionHandle::for_project(embedding_size, project_id);

        self.store
            .create_collection(handle.as_str(), embedding_size, reset)
            .await
            .map_err(|error| aborted(error.into()))?;

        info!(
            project_id,
            collection = %handle,
            reset,
            page_size,
            "indexing run started"
        );

        IndexRun::new(
            &self.chunks,
            &self.store,
            self.embedding.as_ref(),
            handle.as_str(),
            project_id,
            page_size,
            self.insert_batch_size,
        )
        .run()
        .await
    }

    /// Embed the query and search the project collection. Backend "no
    /// data" conditions come back as [`RetrievalOutcome::NoResults`];
    /// only genuine failures (misconfiguration, transport, store errors)
    /// surface as `Err`.
    pub async fn search(
        &self,
        project_id: &str,
        query_text: &str,
        limit: usize,
    ) -> Result<RetrievalOutcome, PipelineError> {
        let handle = self.collection_handle(project_id)?;

        let vector = match self
            .embedding
            .embed_text(query_text, EmbedPurpose::Query)
            .await
        {
            Ok(vector) => vector,
            Err(error @ ProviderError::Configuration { .. }) => return Err(error.into()),
            Err(error) => {
                warn!(project_id, %error, "query embedding unavailable");
                return Ok(RetrievalOutcome::NoResults);
            }
        };

        if vector.is_empty() {
            warn!(project_id, "query embedding came back empty");
            return Ok(RetrievalOutcome::NoResults);
        }

        let hits = self
            .store
            .search_by_vector(handle.as_str(), &vector, limit)
            .await?;

        if hits.is_empty() {
            return Ok(RetrievalOutcome::NoResults);
        }
        Ok(RetrievalOutcome::Hits(hits))
    }

    /// Retrieve context and generate a grounded answer. With no retrieved
    /// context this returns an empty bundle and never calls the generation
    /// backend; otherwise the bundle carries the exact prompt and chat
    /// history used, for audit and replay.
    pub async fn answer(
        &self,
        project_id: &str,
        query_text: &str,
        limit: usize,
    ) -> Result<AnswerBundle, PipelineError> {
        let documents = match self.search(project_id, query_text, limit).await? {
            RetrievalOutcome::Hits(documents) => documents,
            RetrievalOutcome::NoResults => {
                warn!(project_id, "no relevant context retrieved, skipping generation");
                return Ok(AnswerBundle::empty());
            }
        };

        let system_prompt = self.templates.render("rag", "system_prompt", &[])?;

        let mut document_sections = Vec::with_capacity(documents.len());
        for (index, document) in documents.iter().enumerate() {
            let doc_num = (index + 1).to_string();
            let chunk_text = self.generation.process_text(&document.text);
            document_sections.push(self.templates.render(
                "rag",
                "document_prompt",
                &[
                    ("doc_num", doc_num.as_str()),
                    ("chunk_text", chunk_text.as_str()),
                ],
            )?);
        }
        let documents_prompt = document_sections.join("\n");
        let footer_prompt = self
            .templates
            .render("rag", "footer_prompt", &[("query", query_text)])?;
        let full_prompt = [documents_prompt, footer_prompt].join("\n\n");

        let mut chat_history = vec![self
            .generation
            .construct_prompt(&system_prompt, ChatRole::System)];

        let answer = self
            .generation
            .generate_text(
                &full_prompt,
                &mut chat_history,
                Some(&system_prompt),
                &GenerationOptions::default(),
            )
            .await?;

        Ok(AnswerBundle {
            answer: Some(answer),
            prompt: Some(full_prompt),
            chat_history,
        })
    }

    pub async fn collection_info(&self, project_id: &str) -> Result<CollectionInfo, PipelineError> {
        let handle = self.collection_handle(project_id)?;
        Ok(self.store.collection_info(handle.as_str()).await?)
    }

    /// Drop and recreate the project collection, leaving it empty. Returns
    /// whether a collection existed before the reset.
    pub async fn reset_collection(&self, project_id: &str) -> Result<bool, PipelineError> {
        let embedding_size = self.embedding_size()?;
        let handle = CollectionHandle::for_project(embedding_size, project_id);

        let existed = self.store.delete_collection(handle.as_str()).await?;
        self.store
            .create_collection(handle.as_str(), embedding_size, false)
            .await?;
        info!(project_id, collection = %handle, existed, "collection reset");
        Ok(existed)
    }
}
