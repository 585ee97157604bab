use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One bounded span of document text, the unit of embedding and retrieval.
/// Produced by an external chunk store; the pipeline receives chunks by
/// value and never mutates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: Value,
    pub order: u64,
    pub project_id: String,
    pub external_id: Option<String>,
}

/// Distinguishes indexing-time from query-time embedding requests. Some
/// backends apply different instructions for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbedPurpose {
    Document,
    Query,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Per-call generation overrides. Provider defaults apply for any field
/// left unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationOptions {
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Read-only projection returned by vector search, ordered by descending
/// relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub text: String,
    pub metadata: Value,
    pub score: f64,
}

/// Outcome of a retrieval pass. `NoResults` is a first-class empty outcome,
/// distinct from any failure: it covers both "the query produced no usable
/// vector" and "nothing in the collection was close enough".
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalOutcome {
    Hits(Vec<RetrievedDocument>),
    NoResults,
}

impl RetrievalOutcome {
    pub fn is_no_results(&self) -> bool {
        matches!(self, RetrievalOutcome::NoResults)
    }

    pub fn hits(&self) -> &[RetrievedDocument] {
        match self {
            RetrievalOutcome::Hits(hits) => hits,
            RetrievalOutcome::NoResults => &[],
        }
    }
}

/// Answer plus the exact materials used to produce it. When retrieval came
/// back empty, `answer` and `prompt` are `None` and the history is empty.
#[derive(Debug, Clone)]
pub struct AnswerBundle {
    pub answer: Option<String>,
    pub prompt: Option<String>,
    pub chat_history: Vec<ChatMessage>,
}

impl AnswerBundle {
    pub fn empty() -> Self {
        Self {
            answer: None,
            prompt: None,
            chat_history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub status: String,
    pub points_count: u64,
    pub vectors_size: usize,
    pub distance: String,
}

#[derive(Debug, Clone)]
pub struct IndexOutcome {
    pub inserted: usize,
    pub pages: usize,
    pub finished_at: DateTime<Utc>,
}

/// Deterministic collection name scoped to one project and one embedding
/// dimensionality. Two projects never share a name, and changing the
/// embedding backend's output size changes the name, so a stale collection
/// can never be reused with mismatched vectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionHandle(String);

impl CollectionHandle {
    pub fn for_project(embedding_size: usize, project_id: &str) -> Self {
        Self(format!("collection_{}_{}", embedding_size, project_id.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_handle_is_scoped_to_project_and_size() {
        let first = CollectionHandle::for_project(768, "alpha");
        let second = CollectionHandle::for_project(768, "beta");
        let resized = CollectionHandle::for_project(1536, "alpha");

        assert_eq!(first.as_str(), "collection_768_alpha");
        assert_ne!(first, second);
        assert_ne!(first, resized);
    }

    #[test]
    fn collection_handle_trims_project_id() {
        let handle = CollectionHandle::for_project(32, "  spaced  ");
        assert_eq!(handle.as_str(), "collection_32_spaced");
    }

    #[test]
    fn no_results_has_no_hits() {
        let outcome = RetrievalOutcome::NoResults;
        assert!(outcome.is_no_results());
        assert!(outcome.hits().is_empty());
    }
}
