use crate::error::ProviderError;
use crate::models::{ChatMessage, ChatRole, EmbedPurpose, GenerationOptions};
use crate::providers::{note_dimension_mismatch, process_text, vector_from_json, ProviderLimits};
use crate::traits::ModelProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

pub const DEFAULT_COHERE_API_URL: &str = "https://api.cohere.com/v1";

const BACKEND: &str = "cohere";

/// Cohere chat/embed backend. Embedding requests carry an `input_type`
/// derived from the embed purpose, which is why the purpose tag exists in
/// the provider contract at all.
pub struct CohereProvider {
    api_key: String,
    base_url: String,
    limits: ProviderLimits,
    generation_model_id: Option<String>,
    embedding_model_id: Option<String>,
    embedding_size: Option<usize>,
    client: Client,
}

impl CohereProvider {
    pub fn new(api_key: String, api_url: Option<String>, limits: ProviderLimits) -> Self {
        let base_url = api_url.unwrap_or_else(|| DEFAULT_COHERE_API_URL.to_string());
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
            ChatRole::System => "SYSTEM",
            ChatRole::User => "USER",
        }
    }

    fn input_type(purpose: EmbedPurpose) -> &'static str {
        match purpose {
            EmbedPurpose::Document => "search_document",
            EmbedPurpose::Query => "search_query",
        }
    }

    fn parse_chat_text(body: &Value) -> Option<String> {
        body.pointer("/text")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }

    fn parse_embeddings(body: &Value) -> Option<Vec<Vec<f32>>> {
        let rows = body.pointer("/embeddings")?.as_array()?;
        if rows.is_empty() {
            return None;
        }
        rows.iter().map(vector_from_json).collect()
    }
}

#[async_trait]
impl ModelProvider for CohereProvider {
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
        purpose: EmbedPurpose,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let (model, expected_size) = self.embedding_model()?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inputs: Vec<String> = texts.iter().map(|text| self.process_text(text)).collect();
        let response = self
            .client
            .post(format!("{}/embed", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": model,
                "texts": inputs,
                "input_type": Self::input_type(purpose),
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

        // The latest user turn travels in `message`; everything before it
        // goes through `chat_history`.
        let prior = &chat_history[..chat_history.len() - 1];
        let history: Vec<Value> = prior
            .iter()
            .map(|message| {
                json!({
                    "role": Self::native_role(message.role),
                    "message": message.content,
                })
            })
            .collect();

        let mut request = json!({
            "model": model,
            "message": prompt,
            "chat_history": history,
            "max_tokens": max_tokens,
            "temperature": temperature,
        });
        let history_has_system = prior.iter().any(|message| message.role == ChatRole::System);
        if let (Some(system), false) = (system_prompt, history_has_system) {
            request["preamble"] = json!(system);
        }

        let response = self
            .client
            .post(format!("{}/chat", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        let body: Value = response.json().await?;
        Self::parse_chat_text(&body).ok_or_else(|| ProviderError::GenerationUnavailable {
            backend: BACKEND.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::CohereProvider;
    use crate::models::{ChatRole, EmbedPurpose};

    #[test]
    fn purpose_maps_to_input_type() {
        assert_eq!(
            CohereProvider::input_type(EmbedPurpose::Document),
            "search_document"
        );
        assert_eq!(
            CohereProvider::input_type(EmbedPurpose::Query),
            "search_query"
        );
    }

    #[test]
    fn roles_map_to_cohere_names() {
        assert_eq!(CohereProvider::native_role(ChatRole::System), "SYSTEM");
        assert_eq!(CohereProvider::native_role(ChatRole::User), "USER");
    }

    #[test]
    fn chat_text_is_extracted() {
        let body = serde_json::json!({ "text": "grounded answer" });
        assert_eq!(
            CohereProvider::parse_chat_text(&body).as_deref(),
            Some("grounded answer")
        );
        assert!(CohereProvider::parse_chat_text(&serde_json::json!({ "text": "" })).is_none());
    }

    #[test]
    fn embedding_rows_parse_in_order() {
        let body = serde_json::json!({ "embeddings": [[1.0, 0.0], [0.0, 1.0]] });
        let vectors = CohereProvider::parse_embeddings(&body).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vec![1.0, 0.0]);
    }
}
