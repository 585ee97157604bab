use crate::error::TemplateError;
use crate::traits::TemplateRenderer;
use std::collections::HashMap;

/// In-memory prompt template catalog keyed by `(group, name)`. Placeholders
/// use `{name}` syntax; unknown placeholders are left verbatim so a missing
/// variable shows up in the rendered prompt instead of vanishing.
#[derive(Debug, Clone, Default)]
pub struct PromptCatalog {
    templates: HashMap<(String, String), String>,
}

impl PromptCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-loaded with the `rag` prompt group used by the answer
    /// assembler.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.insert(
            "rag",
            "system_prompt",
            "You are an assistant that generates a response for the user. \
             You will be provided with a set of documents associated with the user's query. \
             Generate a response based on the documents provided, and ignore documents that \
             are not relevant to the query. Apologize if you are unable to generate an answer. \
             Respond in the same language as the user's query. Be precise and concise, and \
             avoid unnecessary information.",
        );
        catalog.insert(
            "rag",
            "document_prompt",
            "## Document No: {doc_num}\n### Content: {chunk_text}",
        );
        catalog.insert(
            "rag",
            "footer_prompt",
            "Based only on the above documents, please generate an answer for the user.\n\
             ## Question:\n{query}\n\n## Answer:",
        );
        catalog
    }

    pub fn insert(
        &mut self,
        group: impl Into<String>,
        name: impl Into<String>,
        body: impl Into<String>,
    ) {
        self.templates
            .insert((group.into(), name.into()), body.into());
    }
}

impl TemplateRenderer for PromptCatalog {
    fn render(
        &self,
        group: &str,
        name: &str,
        vars: &[(&str, &str)],
    ) -> Result<String, TemplateError> {
        let body = self
            .templates
            .get(&(group.to_string(), name.to_string()))
            .ok_or_else(|| TemplateError::MissingTemplate {
                group: group.to_string(),
                name: name.to_string(),
            })?;

        let mut rendered = body.clone();
        for (key, value) in vars {
            rendered = rendered.replace(&format!("{{{key}}}"), value);
        }
        Ok(rendered)
    }
}
