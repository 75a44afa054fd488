//! Client for the generative-AI provider behind `/api/generate-bit` and
//! `/api/chat`.
//!
//! Handlers only see the [`GenerativeModel`] trait; [`GeminiClient`] talks to
//! the provider's `generateContent` REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::config::Config;
use crate::content::Difficulty;

pub const GENERATE_SYSTEM_PROMPT: &str = "\
You write short technical lessons called Bits for SYNAPSE, a learning platform \
for developers and network engineers. Give each Bit a catchy technical title, a \
one sentence summary, a step-by-step explanation under 150 words, a working code \
example, and an honest difficulty rating.";

pub const CHAT_SYSTEM_PROMPT: &str = "\
You are Vibe Assistant, a concise coding companion on the SYNAPSE platform. \
Answer technical questions briefly and put code in fenced blocks. Keep the vibe chill.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("Provider request failed: {0}")]
    Transport(String),

    #[error("Provider answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Provider returned no text")]
    EmptyResponse,

    #[error("Provider output is not the expected JSON: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Transport(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPart {
    pub text: String,
}

/// One message of a chat transcript in the provider's shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// `user` or `model`
    pub role: String,
    #[serde(default)]
    pub parts: Vec<ChatPart>,
}

impl ChatTurn {
    pub fn new(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![ChatPart { text: text.into() }],
        }
    }
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Asks for a JSON document, optionally constrained by a response schema.
    async fn generate_json(
        &self,
        system: &str,
        prompt: &str,
        schema: Option<Value>,
    ) -> Result<Value, LlmError>;

    /// Continues a conversation and returns the model's reply text.
    async fn chat(
        &self,
        system: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String, LlmError>;
}

/// A lesson drafted by the model, ready for review before publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedBit {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub code_snippet: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub fn bit_prompt(topic: &str) -> String {
    format!("Create a technical tutorial Bit about: \"{}\".", topic.trim())
}

/// The user's message, prefixed with a note about the lesson on screen.
pub fn chat_message(message: &str, context: Option<&str>) -> String {
    match context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(title) => format!(
            "[System: User is now viewing a tutorial titled: \"{title}\". \
             If their next question is vague like \"explain this\", refer to this topic.]\n\n{message}"
        ),
        None => message.to_string(),
    }
}

/// Response schema for [`GeneratedBit`].
pub fn bit_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "summary": { "type": "STRING" },
            "content": { "type": "STRING" },
            "codeSnippet": { "type": "STRING" },
            "language": { "type": "STRING" },
            "difficulty": {
                "type": "STRING",
                "enum": ["Beginner", "Intermediate", "Advanced"]
            },
            "tags": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": ["title", "summary", "content", "codeSnippet", "language", "difficulty", "tags"]
    })
}

/// Concatenated text of the first candidate in a `generateContent` reply.
pub fn extract_text(response: &Value) -> Result<String, LlmError> {
    let parts = response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or(LlmError::EmptyResponse)?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text)
}

/// Parses model output as JSON, tolerating a surrounding markdown fence.
pub fn parse_json_text(text: &str) -> Result<Value, LlmError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(body.trim()).map_err(|e| LlmError::Malformed(e.to_string()))
}

pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// A client when an API key is configured, `None` otherwise.
    pub fn from_config(config: &Config) -> Result<Option<Self>, LlmError> {
        let Some(key) = config.gemini_api_key.as_deref() else {
            return Ok(None);
        };

        Self::new(
            key,
            config.gemini_model.as_str(),
            config.gemini_endpoint.as_str(),
            Duration::from_secs(config.llm_timeout_secs),
        )
        .map(Some)
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        )
    }

    async fn generate_content(&self, body: Value) -> Result<Value, LlmError> {
        log::debug!("POST {} ({})", self.url(), self.model);

        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("Model provider returned {status}");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate_json(
        &self,
        system: &str,
        prompt: &str,
        schema: Option<Value>,
    ) -> Result<Value, LlmError> {
        let mut generation_config = json!({ "responseMimeType": "application/json" });
        if let Some(schema) = schema {
            generation_config["responseSchema"] = schema;
        }

        let body = json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": [ChatTurn::new("user", prompt)],
            "generationConfig": generation_config,
        });

        let response = self.generate_content(body).await?;
        parse_json_text(&extract_text(&response)?)
    }

    async fn chat(
        &self,
        system: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String, LlmError> {
        let mut contents = history.to_vec();
        contents.push(ChatTurn::new("user", message));

        let body = json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": contents,
        });

        let response = self.generate_content(body).await?;
        extract_text(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_prefixes_the_message() {
        let msg = chat_message("explain this", Some("Understanding CIDR Notation"));
        assert!(msg.starts_with("[System: User is now viewing a tutorial titled: \"Understanding CIDR Notation\"."));
        assert!(msg.ends_with("\n\nexplain this"));
    }

    #[test]
    fn blank_context_is_ignored() {
        assert_eq!(chat_message("hi", None), "hi");
        assert_eq!(chat_message("hi", Some("  ")), "hi");
    }

    #[test]
    fn text_is_joined_across_parts() {
        let reply = json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Hello, " }, { "text": "world" }] }
            }]
        });
        assert_eq!(extract_text(&reply).unwrap(), "Hello, world");
    }

    #[test]
    fn missing_candidates_is_empty() {
        assert_eq!(
            extract_text(&json!({ "promptFeedback": {} })),
            Err(LlmError::EmptyResponse)
        );
        let blank = json!({ "candidates": [{ "content": { "parts": [{ "text": " " }] } }] });
        assert_eq!(extract_text(&blank), Err(LlmError::EmptyResponse));
    }

    #[test]
    fn fenced_json_is_accepted() {
        let value = parse_json_text("```json\n{\"title\": \"Rust\"}\n```").unwrap();
        assert_eq!(value["title"], "Rust");
        assert!(matches!(parse_json_text("not json"), Err(LlmError::Malformed(_))));
    }

    #[test]
    fn generated_bit_reads_camel_case() {
        let bit: GeneratedBit = serde_json::from_value(json!({
            "title": "Borrowing",
            "summary": "References without ownership.",
            "codeSnippet": "let r = &x;",
            "language": "rust",
            "difficulty": "Intermediate",
            "tags": ["rust"]
        }))
        .unwrap();

        assert_eq!(bit.code_snippet, "let r = &x;");
        assert_eq!(bit.difficulty, Difficulty::Intermediate);
        assert!(bit.content.is_empty());
    }

    #[test]
    fn schema_requires_every_field() {
        let schema = bit_schema();
        assert_eq!(schema["required"].as_array().unwrap().len(), 7);
        assert_eq!(schema["properties"]["difficulty"]["enum"][2], "Advanced");
    }
}
