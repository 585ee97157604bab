use crate::error::ProviderError;
use crate::models::{ChatMessage, ChatRole, EmbedPurpose, GenerationOptions};
use crate::providers::{note_dimension_mismatch, process_text, vector_from_json, ProviderLimits};
use crate::traits::ModelProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

pub const DEFAULT_GOOGLE_GENAI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta";

const BACKEND: &str = "google-genai";

/// Google Gemini backend. Gemini has no system role in `contents`, so
/// system text travels through `systemInstruction`; embedding requests
/// carry a retrieval task type derived from the embed purpose.
pub struct GoogleGenAiProvider {
    api_key: String,
    base_url: String,
    limits: ProviderLimits,
    generation_model_id: Option<String>,
    embedding_model_id: Option<String>,
    embedding_size: Option<usize>,
    client: Client,
}

impl GoogleGenAiProvider {
    pub fn new(api_key: String, api_url: Option<String>, limits: ProviderLimits) -> Self {
        let base_url = api_url.unwrap_or_else(|| DEFAULT_GOOGLE_GENAI_API_URL.to_string());
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

    fn task_type(purpose: EmbedPurpose) -> &'static str {
        match purpose {
            EmbedPurpose::Document => "RETRIEVAL_DOCUMENT",
            EmbedPurpose::Query => "RETRIEVAL_QUERY",
        }
    }

    fn parse_candidate_text(body: &Value) -> Option<String> {
        body.pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }

    fn parse_batch_embeddings(body: &Value) -> Option<Vec<Vec<f32>>> {
        let rows = body.pointer("/embeddings")?.as_array()?;
        if rows.is_empty() {
            return None;
        }
        rows.iter()
            .map(|row| vector_from_json(row.pointer("/values")?))
            .collect()
    }

    /// Gemini `contents` cannot carry system turns; split them out for the
    /// `systemInstruction` field instead.
    fn split_contents(
        chat_history: &[ChatMessage],
        system_prompt: Option<&str>,
    ) -> (Vec<Value>, Option<String>) {
        let contents: Vec<Value> = chat_history
            .iter()
            .filter(|message| message.role != ChatRole::System)
            .map(|message| {
                json!({
                    "role": "user",
                    "parts": [{ "text": message.content }],
                })
            })
            .collect();

        let system = system_prompt.map(str::to_string).or_else(|| {
            chat_history
                .iter()
                .find(|message| message.role == ChatRole::System)
                .map(|message| message.content.clone())
        });

        (contents, system)
    }
}

#[async_trait]
impl ModelProvider for GoogleGenAiProvider {
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
        let (model, expected_size) = self.embedding_model()?;

        let response = self
            .client
            .post(format!("{}/models/{}:embedContent", self.base_url, model))
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "model": format!("models/{model}"),
                "content": { "parts": [{ "text": self.process_text(text) }] },
                "taskType": Self::task_type(purpose),
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
        let vector = body
            .pointer("/embedding/values")
            .and_then(vector_from_json)
            .ok_or_else(|| ProviderError::EmbeddingUnavailable {
                backend: BACKEND.to_string(),
            })?;

        note_dimension_mismatch(BACKEND, expected_size, vector.len());
        Ok(vector)
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

        let requests: Vec<Value> = texts
            .iter()
            .map(|text| {
                json!({
                    "model": format!("models/{model}"),
                    "content": { "parts": [{ "text": self.process_text(text) }] },
                    "taskType": Self::task_type(purpose),
                })
            })
            .collect();

        let response = self
            .client
            .post(format!(
                "{}/models/{}:batchEmbedContents",
                self.base_url, model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "requests": requests }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        let body: Value = response.json().await?;
        let vectors = Self::parse_batch_embeddings(&body).ok_or_else(|| {
            ProviderError::EmbeddingUnavailable {
                backend: BACKEND.to_string(),
            }
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
        let (contents, system) = Self::split_contents(chat_history, system_prompt);

        let mut request = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": max_tokens,
                "temperature": temperature,
            },
        });
        if let Some(system) = system {
            request["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, model
            ))
            .query(&[("key", self.api_key.as_str())])
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
        Self::parse_candidate_text(&body).ok_or_else(|| ProviderError::GenerationUnavailable {
            backend: BACKEND.to_string(),
        })
    }
}
