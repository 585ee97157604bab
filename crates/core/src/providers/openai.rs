use crate::error::ProviderError;
use crate::models::{ChatMessage, ChatRole, EmbedPurpose, GenerationOptions};
use crate::providers::{note_dimension_mismatch, process_text, vector_from_json, ProviderLimits};
use crate::traits::ModelProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

pub const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1";

const BACKEND: &str = "openai";

/// OpenAI-compatible chat/embeddings backend. The base URL is configurable
/// so Azure-style and self-hosted compatible endpoints work unchanged.
pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    limits: ProviderLimits,
    generation_model_id: Option<String>,
    embedding_model_id: Option<String>,
    embedding_size: Option<usize>,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(api_key: String, api_url: Option<String>, limits: ProviderLimits) -> Self {
        let base_url = api_url.unwrap_or_else(|| DEFAULT_OPENAI_API_URL.to_string());
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            limits,
            generation_model_id: None,
            embedding_model_id: None,
            embedding_size: None,
            client: Client::new(),
        }
    }

    fn generation_model(&self) -> Result<&str, ProviderError> {
        self.generation_model_id
            .as_deref()
            .ok_or_else(|| ProviderError::Configuration {
                backend: BACKEND.to_string(),
                details: "generation model is not set".to_string(),
            })
    }

    fn embedding_model(&self) -> Result<(&str, usize), ProviderError> {
        match (self.embedding_model_id.as_deref(), self.embedding_size) {
            (Some(model), Some(size)) => Ok((model, size)),
            _ => Err(ProviderError::Configuration {
                backend: BACKEND.to_string(),
                details: "embedding model is not set".to_string(),
            }),
        }
    }

    fn native_role(role: ChatRole) -> &'static str {
        match role {
            ChatRole::System => "system",
            ChatRole::User => "user",
        }
    }

    fn parse_completion(body: &Value) -> Option<String> {
        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }

    fn parse_embeddings(body: &Value) -> Option<Vec<Vec<f32>>> {
        let data = body.pointer("/data")?.as_array()?;
        if data.is_empty() {
            return None;
        }

        let mut indexed = Vec::with_capacity(data.len());
        for item in data {
            let index = item
                .pointer("/index")
                .and_then(Value::as_u64)
                .unwrap_or(indexed.len() as u64);
            let vector = vector_from_json(item.pointer("/embedding")?)?;
            indexed.push((index, vector));
        }

        indexed.sort_by_key(|(index, _)| *index);
        Some(indexed.into_iter().map(|(_, vector)| vector).collect())
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn backend(&self) -> &str {
        BACKEND
    }

    fn set_generation_model(&mut self, model_id: &str) {
        self.generation_model_id = Some(model_id.to_string());
        info!(backend = BACKEND, model = model_id, "generation model selected");
    }

    fn set_embedding_model(&mut self, model_id: &str, embedding_size: usize) {
        self.embedding_model_id = Some(model_id.to_string());
        self.embedding_size = Some(embedding_size);
        info!(
            backend = BACKEND,
            model = model_id,
            size = embedding_size,
            "embedding model selected"
        );
    }

    fn embedding_size(&self) -> Option<usize> {
        self.embedding_size
    }

    fn process_text(&self, text: &str) -> String {
        process_text(text, self.limits.input_max_characters, BACKEND)
    }

    async fn embed_text(
        &self,
        text: &str,
        purpose: EmbedPurpose,
    ) -> Result<Vec<f32>, ProviderError> {
        let vectors = self.embed_batch(&[text.to_string()], purpose).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::EmbeddingUnavailable {
                backend: BACKEND.to_string(),
            })
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        _purpose: EmbedPurpose,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let (model, expected_size) = self.embedding_model()?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inputs: Vec<String> = texts.iter().map(|text| self.process_text(text)).collect();
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": model, "input": inputs }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        let body: Value = response.json().await?;
        let vectors =
            Self::parse_embeddings(&body).ok_or_else(|| ProviderError::EmbeddingUnavailable {
                backend: BACKEND.to_string(),
            })?;

        if vectors.len() != texts.len() {
            return Err(ProviderError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
            });
        }

        for vector in &vectors {
            note_dimension_mismatch(BACKEND, expected_size, vector.len());
        }

        Ok(vectors)
    }

    async fn generate_text(
        &self,
        prompt: &str,
        chat_history: &mut Vec<ChatMessage>,
        system_prompt: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let model = self.generation_model()?;
        let max_tokens = options
            .max_output_tokens
            .unwrap_or(self.limits.generation_max_output_tokens);
        let temperature = options
            .temperature
            .unwrap_or(self.limits.generation_temperature);

        chat_history.push(self.construct_prompt(prompt, ChatRole::User));

        let mut messages: Vec<Value> = Vec::with_capacity(chat_history.len() + 1);
        let history_has_system = chat_history
            .iter()
            .any(|message| message.role == ChatRole::System);
        if let (Some(system), false) = (system_prompt, history_has_system) {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.extend(chat_history.iter().map(|message| {
            json!({
                "role": Self::native_role(message.role),
                "content": message.content,
            })
        }));

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": model,
                "messages": messages,
                "max_tokens": max_tokens,
                "temperature": temperature,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        let body: Value = response.json().await?;
        Self::parse_completion(&body).ok_or_else(|| ProviderError::GenerationUnavailable {
            backend: BACKEND.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::OpenAiProvider;
    use crate::error::ProviderError;
    use crate::models::EmbedPurpose;
    use crate::providers::ProviderLimits;
    use crate::traits::ModelProvider;
    use serde_json::json;

    fn provider() -> OpenAiProvider {
        OpenAiProvider::new("key".to_string(), None, ProviderLimits::default())
    }

    #[test]
    fn completion_text_is_extracted_from_the_first_choice() {
        let body = json!({
            "choices": [
                { "message": { "role": "assistant", "content": "the answer" } },
                { "message": { "role": "assistant", "content": "unused" } },
            ]
        });
        assert_eq!(
            OpenAiProvider::parse_completion(&body).as_deref(),
            Some("the answer")
        );
    }

    #[test]
    fn empty_choices_yield_nothing() {
        assert!(OpenAiProvider::parse_completion(&json!({ "choices": [] })).is_none());
        assert!(OpenAiProvider::parse_completion(&json!({})).is_none());
    }

    #[test]
    fn embeddings_are_reordered_by_index() {
        let body = json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] },
            ]
        });
        let vectors = OpenAiProvider::parse_embeddings(&body).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn empty_embedding_data_yields_nothing() {
        assert!(OpenAiProvider::parse_embeddings(&json!({ "data": [] })).is_none());
    }

    #[tokio::test]
    async fn embedding_without_configuration_fails_without_side_effects() {
        let provider = provider();
        let result = provider.embed_text("hello", EmbedPurpose::Query).await;
        assert!(matches!(result, Err(ProviderError::Configuration { .. })));
    }

    #[tokio::test]
    async fn generation_without_configuration_leaves_history_untouched() {
        let provider = provider();
        let mut history = Vec::new();
        let result = provider
            .generate_text("prompt", &mut history, None, &Default::default())
            .await;
        assert!(matches!(result, Err(ProviderError::Configuration { .. })));
        assert!(history.is_empty());
    }

    #[test]
    fn custom_base_url_is_normalized() {
        let provider = OpenAiProvider::new(
            "key".to_string(),
            Some("http://localhost:1234/v1/".to_string()),
            ProviderLimits::default(),
        );
        assert_eq!(provider.base_url, "http://localhost:1234/v1");
    }
}
