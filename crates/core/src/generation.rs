use crate::error::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
You are a search assistant. Your task is to find and extract the most relevant passages \
from the provided text to answer the user's query.
Do not synthesize or generate new answers. Your response should consist only of direct quotes from the text.
If no relevant passages are found, simply state that.

**Query:** {query}

**Context:**
---
{context}
---

**Citations:**";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, SearchError> {
        let template = template.into();
        if !template.contains("{context}") {
            return Err(SearchError::Request(
                "prompt template must contain a {context} placeholder".to_string(),
            ));
        }
        Ok(Self { template })
    }

    pub fn render(&self, query: &str, context: &str) -> String {
        self.template
            .replace("{query}", query)
            .replace("{context}", context)
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

pub struct GenerationRequest<'a> {
    pub context: &'a str,
    pub query: &'a str,
    pub template: &'a PromptTemplate,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, SearchError>;
}

#[derive(Clone)]
pub struct ChatCompletionGenerator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Value,
}

impl ChatCompletionGenerator {
    pub fn new(base_url: impl AsRef<str>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/chat/completions", base_url.as_ref().trim_end_matches('/')),
            model: model.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, SearchError> {
        let prompt = request.template.render(request.query, request.context);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: self.temperature,
        };

        let mut http = self.client.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            http = http.bearer_auth(api_key);
        }

        let response = http.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let details = response.text().await.unwrap_or_default();
            return Err(SearchError::Generation(format!("{status}: {details}")));
        }

        let parsed: ChatResponse = response.json().await?;
        first_choice_text(parsed)
    }
}

fn first_choice_text(response: ChatResponse) -> Result<String, SearchError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| {
            choice
                .message
                .get("content")
                .and_then(Value::as_str)
                .map(|text| text.trim().to_string())
        })
        .ok_or_else(|| SearchError::Generation("response contained no message content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::{first_choice_text, ChatResponse, PromptTemplate};
    use serde_json::json;

    #[test]
    fn default_template_renders_query_and_context() {
        let prompt = PromptTemplate::default().render("What pressure?", "Max 200 bar.");
        assert!(prompt.contains("**Query:** What pressure?"));
        assert!(prompt.contains("---\nMax 200 bar.\n---"));
        assert!(!prompt.contains("{context}"));
    }

    #[test]
    fn custom_template_requires_context_placeholder() {
        assert!(PromptTemplate::new("Question: {query}").is_err());
        let template = PromptTemplate::new("Q: {query}\nText: {context}").unwrap();
        assert_eq!(template.render("a", "b"), "Q: a\nText: b");
    }

    #[test]
    fn first_choice_content_is_extracted() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "role": "assistant", "content": "  quoted answer \n" } }]
        }))
        .unwrap();
        assert_eq!(first_choice_text(response).unwrap(), "quoted answer");

        let empty: ChatResponse = serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(first_choice_text(empty).is_err());
    }
}
