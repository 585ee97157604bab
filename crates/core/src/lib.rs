pub mod chunking;
pub mod error;
pub mod indexer;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod stores;
pub mod templates;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

pub use chunking::{chunk_by_paragraph, normalize_whitespace, ChunkingConfig};
pub use error::{
    IndexAborted, IngestError, PipelineError, ProviderError, StoreError, TemplateError,
};
pub use indexer::{IndexRun, IndexStep};
pub use ingest::{
    discover_text_files, load_folder_chunks, FolderIngestReport, InMemoryChunkSource, SkippedFile,
};
pub use models::{
    AnswerBundle, ChatMessage, ChatRole, Chunk, CollectionHandle, CollectionInfo, EmbedPurpose,
    GenerationOptions, IndexOutcome, RetrievalOutcome, RetrievedDocument,
};
pub use orchestrator::{RagCoordinator, DEFAULT_INSERT_BATCH_SIZE};
pub use providers::{
    CohereProvider, GoogleGenAiProvider, OpenAiProvider, ProviderConfig, ProviderFactory,
    ProviderKind, ProviderLimits,
};
pub use stores::{Distance, InMemoryVectorStore, QdrantStore};
pub use templates::PromptCatalog;
pub use traits::{ChunkSource, ModelProvider, TemplateRenderer, VectorStore};
