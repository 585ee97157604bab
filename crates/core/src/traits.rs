use crate::error::{ProviderError, StoreError, TemplateError};
use crate::models::{
    ChatMessage, ChatRole, Chunk, CollectionInfo, EmbedPurpose, GenerationOptions,
    RetrievedDocument,
};
use async_trait::async_trait;

/// Capability contract every model backend must satisfy, for generation,
/// embedding, or both. The pipeline stays backend-agnostic by consuming
/// only this trait; new backends are added by implementing it, never by
/// branching inside the pipeline.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Stable backend name used in errors and log events.
    fn backend(&self) -> &str;

    /// Select the remote generation model. Must be called before
    /// [`ModelProvider::generate_text`].
    fn set_generation_model(&mut self, model_id: &str);

    /// Select the remote embedding model and the dimensionality it is
    /// expected to produce. Must be called before embedding.
    fn set_embedding_model(&mut self, model_id: &str, embedding_size: usize);

    /// Configured embedding dimensionality, if any.
    fn embedding_size(&self) -> Option<usize>;

    /// Trim and truncate input to the configured character budget.
    /// Truncation logs a warning; it is never an error.
    fn process_text(&self, text: &str) -> String;

    /// Embed a single text. Fails with
    /// [`ProviderError::EmbeddingUnavailable`] when the backend returns
    /// nothing usable.
    async fn embed_text(
        &self,
        text: &str,
        purpose: EmbedPurpose,
    ) -> Result<Vec<f32>, ProviderError>;

    /// Embed a batch in one backend round trip, preserving input order.
    async fn embed_batch(
        &self,
        texts: &[String],
        purpose: EmbedPurpose,
    ) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Append a user-role message built from `prompt` to `chat_history`,
    /// invoke the backend, and return the first completion's text. The
    /// history is the caller's own, freshly built per answer cycle.
    async fn generate_text(
        &self,
        prompt: &str,
        chat_history: &mut Vec<ChatMessage>,
        system_prompt: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError>;

    /// Build a role-tagged message. Purely structural; providers convert
    /// to their native wire shape only when a request is built.
    fn construct_prompt(&self, text: &str, role: ChatRole) -> ChatMessage {
        ChatMessage {
            role,
            content: text.to_string(),
        }
    }
}

/// Capability contract for a vector-index backend: collection lifecycle,
/// batched upsert, similarity search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotent creation. Returns `true` when a collection was actually
    /// created; calling again with the same name and `reset = false` is a
    /// no-op success. `reset = true` deletes and recreates.
    async fn create_collection(
        &self,
        name: &str,
        embedding_size: usize,
        reset: bool,
    ) -> Result<bool, StoreError>;

    /// Idempotent deletion. Returns `true` when a collection existed.
    async fn delete_collection(&self, name: &str) -> Result<bool, StoreError>;

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo, StoreError>;

    /// Insert records in batches of at most `batch_size`. `record_ids`,
    /// when supplied, pins each vector to a caller-assigned id so
    /// re-indexing the same logical chunk overwrites instead of
    /// duplicating. Texts, vectors, and metadata (and record ids when
    /// present) must have equal length.
    async fn insert_many(
        &self,
        name: &str,
        texts: &[String],
        vectors: &[Vec<f32>],
        metadata: &[serde_json::Value],
        record_ids: Option<&[u64]>,
        batch_size: usize,
    ) -> Result<(), StoreError>;

    /// At most `limit` hits ordered by descending relevance. An empty
    /// collection, or nothing close enough under the backend's threshold
    /// policy, yields an empty Vec, not an error.
    async fn search_by_vector(
        &self,
        name: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedDocument>, StoreError>;
}

/// External chunk store, consumed one page at a time. Pages are 1-based;
/// an empty page terminates the indexing run.
#[async_trait]
pub trait ChunkSource: Send + Sync {
    async fn chunks_page(
        &self,
        project_id: &str,
        page_no: usize,
        page_size: usize,
    ) -> Result<Vec<Chunk>, StoreError>;
}

/// Pure function from `(group, name, variables)` to rendered prompt text.
pub trait TemplateRenderer: Send + Sync {
    fn render(
        &self,
        group: &str,
        name: &str,
        vars: &[(&str, &str)],
    ) -> Result<String, TemplateError>;
}
