//! Minimal OpenAI client for strict structured outputs.
//!
//! One call: a system + user prompt and a JSON schema go in, the raw JSON
//! text of the first choice comes out. Decoding it is left to the caller.
//!
//! ```rust,ignore
//! use openai_client::{OpenAIClient, StructuredOutput, StructuredRequest};
//!
//! let client = OpenAIClient::new(api_key).with_timeout(Duration::from_secs(60))?;
//! let request = StructuredRequest::new("gpt-4o", system, user, Reply::openai_schema())
//!     .schema_name("reply")
//!     .max_tokens(4000);
//! let json = client.structured_output(request).await?;
//! ```

pub mod error;
pub mod schema;
pub mod types;

pub use error::{OpenAIError, Result};
pub use schema::StructuredOutput;
pub use types::*;

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{debug, warn};
use types::CompletionResponse;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct OpenAIClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point at a proxy or compatible server instead of api.openai.com.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Total deadline per request. Unset means no client-side deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OpenAIError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the JSON text of the first choice. Empty when the model
    /// answered with `null` content (a refusal).
    pub async fn structured_output(&self, request: StructuredRequest) -> Result<String> {
        let start = Instant::now();

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "OpenAI request failed");
                OpenAIError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %message, "OpenAI API error");
            return Err(OpenAIError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| OpenAIError::Parse(e.to_string()))?;

        debug!(
            model = %request.model,
            schema = %request.response_format.json_schema.name,
            duration_ms = start.elapsed().as_millis(),
            prompt_tokens = completion.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens = completion.usage.as_ref().map(|u| u.completion_tokens),
            "OpenAI structured output"
        );

        completion.into_content()
    }
}
