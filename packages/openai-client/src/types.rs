//! Wire types for `/chat/completions` in `json_schema` mode.

use serde::{Deserialize, Serialize};

use crate::error::{OpenAIError, Result};

// =============================================================================
// Request
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StructuredRequest {
    pub model: String,
    pub messages: Vec<PromptMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub response_format: ResponseFormat,
}

impl StructuredRequest {
    /// Temperature starts at 0.0; raise it with [`StructuredRequest::temperature`]
    /// for generative prompts.
    pub fn new(
        model: impl Into<String>,
        system: impl Into<String>,
        user: impl Into<String>,
        schema: serde_json::Value,
    ) -> Self {
        Self {
            model: model.into(),
            messages: vec![
                PromptMessage::new("system", system),
                PromptMessage::new("user", user),
            ],
            temperature: Some(0.0),
            max_tokens: None,
            response_format: ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: JsonSchemaFormat {
                    name: "structured_response".to_string(),
                    strict: true,
                    schema,
                },
            },
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Name reported to the API for the schema (letters, digits, `_`, `-`).
    pub fn schema_name(mut self, name: impl Into<String>) -> Self {
        self.response_format.json_schema.name = name.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptMessage {
    pub role: &'static str,
    pub content: String,
}

impl PromptMessage {
    fn new(role: &'static str, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    pub json_schema: JsonSchemaFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub strict: bool,
    pub schema: serde_json::Value,
}

// =============================================================================
// Response
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    pub(crate) fn into_content(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or(OpenAIError::EmptyResponse)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    /// `null` for refusals.
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

// =============================================================================
// Text helpers
// =============================================================================

/// At most `max_bytes` bytes of `s`, cut back to a char boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Drop a surrounding markdown code fence, if the model added one.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_request_serializes_strict_schema() {
        let req = StructuredRequest::new(
            "gpt-4o",
            "system text",
            "user text",
            serde_json::json!({"type": "object"}),
        )
        .temperature(0.8)
        .max_tokens(1500)
        .schema_name("question_batch");

        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "question_batch");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user text");
        assert_eq!(body["max_tokens"], 1500);
    }

    #[test]
    fn null_content_reads_as_empty() {
        let response: CompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":null}}],"usage":null}"#,
        )
        .unwrap();
        assert_eq!(response.into_content().unwrap(), "");
    }

    #[test]
    fn missing_choices_is_empty_response() {
        let response: CompletionResponse =
            serde_json::from_str(r#"{"choices":[],"usage":null}"#).unwrap();
        assert!(matches!(response.into_content(), Err(OpenAIError::EmptyResponse)));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "Olá 世界";
        let truncated = truncate_to_char_boundary(text, 6);
        assert!(truncated.len() <= 6);
        assert!(text.starts_with(truncated));
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }
}
