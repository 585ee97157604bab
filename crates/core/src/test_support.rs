use crate::error::ProviderError;
use crate::models::{ChatMessage, ChatRole, EmbedPurpose, GenerationOptions};
use crate::traits::ModelProvider;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Deterministic character-trigram embedding: hash each trigram into a
/// bucket, then L2-normalize. Identical texts embed identically, so
/// exact-text queries rank their own chunk first under cosine scoring.
pub(crate) fn ngram_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = vec![0f32; dimensions.max(1)];
    let lowered = text.to_lowercase();
    let chars: Vec<char> = lowered.chars().collect();

    if chars.is_empty() {
        return vector;
    }

    for window in chars.windows(3) {
        let token = window.iter().collect::<String>();
        let mut hash = 1469598103934665603u64;
        for byte in token.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(1099511628211);
        }
        let bucket = (hash % vector.len() as u64) as usize;
        vector[bucket] += 1.0;
    }

    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in &mut vector {
            *value /= magnitude;
        }
    }

    vector
}

/// Offline stand-in for a model backend: trigram-hash embeddings, scripted
/// completions, and a shared call counter tests can hold after the provider
/// moves into the coordinator.
pub(crate) struct FakeProvider {
    embedding_size: Option<usize>,
    output_dimensions: Option<usize>,
    answer: String,
    fail_embedding: bool,
    generation_calls: Arc<AtomicUsize>,
}

impl FakeProvider {
    pub(crate) fn with_size(embedding_size: usize) -> Self {
        Self {
            embedding_size: Some(embedding_size),
            output_dimensions: None,
            answer: "fake answer".to_string(),
            fail_embedding: false,
            generation_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn unconfigured() -> Self {
        Self {
            embedding_size: None,
            output_dimensions: None,
            answer: "fake answer".to_string(),
            fail_embedding: false,
            generation_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with_answer(mut self, answer: &str) -> Self {
        self.answer = answer.to_string();
        self
    }

    pub(crate) fn failing_embeddings(mut self) -> Self {
        self.fail_embedding = true;
        self
    }

    /// Emit vectors of this length regardless of the configured size.
    pub(crate) fn with_output_dimensions(mut self, dimensions: usize) -> Self {
        self.output_dimensions = Some(dimensions);
        self
    }

    pub(crate) fn generation_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.generation_calls)
    }

    fn dimensions(&self) -> Result<usize, ProviderError> {
        let configured = self
            .embedding_size
            .ok_or_else(|| ProviderError::Configuration {
                backend: "fake".to_string(),
                details: "embedding model is not set".to_string(),
            })?;
        Ok(self.output_dimensions.unwrap_or(configured))
    }
}

#[async_trait]
impl ModelProvider for FakeProvider {
    fn backend(&self) -> &str {
        "fake"
    }

    fn set_generation_model(&mut self, _model_id: &str) {}

    fn set_embedding_model(&mut self, _model_id: &str, embedding_size: usize) {
        self.embedding_size = Some(embedding_size);
    }

    fn embedding_size(&self) -> Option<usize> {
        self.embedding_size
    }

    fn process_text(&self, text: &str) -> String {
        text.trim().to_string()
    }

    async fn embed_text(
        &self,
        text: &str,
        _purpose: EmbedPurpose,
    ) -> Result<Vec<f32>, ProviderError> {
        if self.fail_embedding {
            return Err(ProviderError::EmbeddingUnavailable {
                backend: "fake".to_string(),
            });
        }
        Ok(ngram_embedding(&self.process_text(text), self.dimensions()?))
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        purpose: EmbedPurpose,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_text(text, purpose).await?);
        }
        Ok(vectors)
    }

    async fn generate_text(
        &self,
        prompt: &str,
        chat_history: &mut Vec<ChatMessage>,
        _system_prompt: Option<&str>,
        _options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        self.generation_calls.fetch_add(1, Ordering::SeqCst);
        chat_history.push(self.construct_prompt(prompt, ChatRole::User));
        Ok(self.answer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{ngram_embedding, FakeProvider};
    use crate::models::EmbedPurpose;
    use crate::traits::ModelProvider;

    #[test]
    fn embedding_is_deterministic() {
        let first = ngram_embedding("hydraulic pressure and flow", 32);
        let second = ngram_embedding("hydraulic pressure and flow", 32);
        assert_eq!(first, second);
        assert_eq!(first.len(), 32);
    }

    #[tokio::test]
    async fn mismatched_dimensions_still_return_a_vector() {
        let provider = FakeProvider::with_size(16).with_output_dimensions(8);
        let vector = provider
            .embed_text("text", EmbedPurpose::Document)
            .await
            .unwrap();
        assert_eq!(vector.len(), 8);
        assert_eq!(provider.embedding_size(), Some(16));
    }
}
