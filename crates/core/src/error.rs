use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider backend: {0}")]
    UnknownProvider(String),

    #[error("{backend} provider is not configured: {details}")]
    Configuration { backend: String, details: String },

    #[error("{backend} returned no usable embedding")]
    EmbeddingUnavailable { backend: String },

    #[error("{backend} returned no usable completion")]
    GenerationUnavailable { backend: String },

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bulk insert arity mismatch: {details}")]
    ArityMismatch { details: String },

    #[error("collection does not exist: {0}")]
    MissingCollection(String),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("no template registered for {group}/{name}")]
    MissingTemplate { group: String, name: String },
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Indexing-run failure carrying how far the run got before aborting.
#[derive(Debug, Error)]
#[error("indexing aborted after {inserted} inserted records: {source}")]
pub struct IndexAborted {
    pub inserted: usize,
    #[source]
    pub source: PipelineError,
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
