mod cohere;
mod google;
mod openai;

pub use cohere::CohereProvider;
pub use google::GoogleGenAiProvider;
pub use openai::OpenAiProvider;

use crate::error::ProviderError;
use crate::traits::ModelProvider;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Closed set of recognized model backends. Selection happens once, at
/// construction time; the pipeline never inspects which variant it got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Cohere,
    GoogleGenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Cohere => "cohere",
            ProviderKind::GoogleGenAi => "google-genai",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "cohere" => Ok(ProviderKind::Cohere),
            "google-genai" => Ok(ProviderKind::GoogleGenAi),
            _ => Err(ProviderError::UnknownProvider(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProviderLimits {
    pub input_max_characters: usize,
    pub generation_max_output_tokens: u32,
    pub generation_temperature: f32,
}

impl Default for ProviderLimits {
    fn default() -> Self {
        Self {
            input_max_characters: 1_024,
            generation_max_output_tokens: 1_000,
            generation_temperature: 0.1,
        }
    }
}

/// Credentials and shared limits for every recognized backend. Unset keys
/// only matter for the backend actually selected.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub openai_api_key: Option<String>,
    pub openai_api_url: Option<String>,
    pub cohere_api_key: Option<String>,
    pub cohere_api_url: Option<String>,
    pub google_genai_api_key: Option<String>,
    pub google_genai_api_url: Option<String>,
    pub limits: ProviderLimits,
}

/// Resolves a configured backend name to a concrete provider. An
/// unrecognized name fails with [`ProviderError::UnknownProvider`]; there
/// is no silent fallback to a default backend.
pub struct ProviderFactory {
    config: ProviderConfig,
}

impl ProviderFactory {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    pub fn create(&self, backend: &str) -> Result<Box<dyn ModelProvider>, ProviderError> {
        let kind = backend.parse::<ProviderKind>()?;

        Ok(match kind {
            ProviderKind::OpenAi => Box::new(OpenAiProvider::new(
                require_key(kind, self.config.openai_api_key.as_deref())?,
                self.config.openai_api_url.clone(),
                self.config.limits,
            )),
            ProviderKind::Cohere => Box::new(CohereProvider::new(
                require_key(kind, self.config.cohere_api_key.as_deref())?,
                self.config.cohere_api_url.clone(),
                self.config.limits,
            )),
            ProviderKind::GoogleGenAi => Box::new(GoogleGenAiProvider::new(
                require_key(kind, self.config.google_genai_api_key.as_deref())?,
                self.config.google_genai_api_url.clone(),
                self.config.limits,
            )),
        })
    }
}

fn require_key(kind: ProviderKind, key: Option<&str>) -> Result<String, ProviderError> {
    key.filter(|value| !value.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Configuration {
            backend: kind.as_str().to_string(),
            details: "api key is not set".to_string(),
        })
}

pub(crate) fn process_text(text: &str, max_chars: usize, backend: &str) -> String {
    let trimmed = text.trim();
    let length = trimmed.chars().count();
    if length <= max_chars {
        return trimmed.to_string();
    }

    warn!(
        backend,
        limit = max_chars,
        length,
        "input text exceeds character budget, truncating"
    );
    trimmed
        .chars()
        .take(max_chars)
        .collect::<String>()
        .trim_end()
        .to_string()
}

pub(crate) fn vector_from_json(value: &Value) -> Option<Vec<f32>> {
    let numbers = value.as_array()?;
    let mut vector = Vec::with_capacity(numbers.len());
    for number in numbers {
        vector.push(number.as_f64()? as f32);
    }
    Some(vector)
}

/// Dimension disagreement is reported, never fatal: the vector still goes
/// back to the caller, which decides.
pub(crate) fn note_dimension_mismatch(backend: &str, expected: usize, got: usize) {
    if expected != got {
        warn!(
            backend,
            expected, got, "embedding dimensionality disagrees with configured size"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{process_text, vector_from_json, ProviderConfig, ProviderFactory, ProviderKind};
    use crate::error::ProviderError;
    use crate::traits::ModelProvider;
    use serde_json::json;

    #[test]
    fn backend_names_parse_into_the_closed_set() {
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("COHERE".parse::<ProviderKind>().unwrap(), ProviderKind::Cohere);
        assert_eq!(
            "google_genai".parse::<ProviderKind>().unwrap(),
            ProviderKind::GoogleGenAi
        );
    }

    #[test]
    fn unknown_backend_never_falls_back() {
        let factory = ProviderFactory::new(ProviderConfig::default());
        let result = factory.create("anthropic");
        assert!(matches!(result, Err(ProviderError::UnknownProvider(name)) if name == "anthropic"));
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let factory = ProviderFactory::new(ProviderConfig::default());
        let result = factory.create("openai");
        assert!(matches!(result, Err(ProviderError::Configuration { .. })));
    }

    #[test]
    fn configured_backend_is_constructed() {
        let factory = ProviderFactory::new(ProviderConfig {
            cohere_api_key: Some("key".to_string()),
            ..ProviderConfig::default()
        });
        let provider = factory.create("cohere").unwrap();
        assert_eq!(provider.backend(), "cohere");
    }

    #[test]
    fn process_text_trims_and_truncates() {
        assert_eq!(process_text("  short  ", 32, "test"), "short");

        let truncated = process_text("0123456789", 4, "test");
        assert_eq!(truncated, "0123");
    }

    #[test]
    fn vectors_parse_from_json_arrays() {
        assert_eq!(
            vector_from_json(&json!([0.25, -1.0])),
            Some(vec![0.25, -1.0])
        );
        assert_eq!(vector_from_json(&json!(["bad"])), None);
        assert_eq!(vector_from_json(&json!({})), None);
    }
}
