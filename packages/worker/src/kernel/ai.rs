// AI implementation using OpenAI
//
// Infrastructure implementation of BaseAI over the openai-client package.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use openai_client::{OpenAIClient, StructuredRequest};
use tracing::warn;

use super::{BaseAI, StructuredPrompt};
use crate::config::Config;

/// OpenAI structured-output generator
#[derive(Clone)]
pub struct OpenAIGenerator {
    client: OpenAIClient,
}

impl OpenAIGenerator {
    pub fn new(client: OpenAIClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut client = OpenAIClient::new(config.openai_api_key.clone());
        if let Some(base_url) = &config.openai_base_url {
            client = client.with_base_url(base_url.clone());
        }
        if let Some(secs) = config.generation_timeout_secs {
            client = client
                .with_timeout(Duration::from_secs(secs))
                .context("Failed to configure generation client timeout")?;
        }
        Ok(Self::new(client))
    }
}

#[async_trait]
impl BaseAI for OpenAIGenerator {
    async fn generate_structured(&self, prompt: StructuredPrompt) -> Result<String> {
        let request = StructuredRequest::new(
            prompt.model,
            prompt.system_prompt,
            prompt.user_prompt,
            prompt.schema,
        )
        .schema_name(prompt.schema_name)
        .temperature(prompt.temperature)
        .max_tokens(prompt.max_tokens);

        self.client.structured_output(request).await.map_err(|e| {
            warn!(error = %e, transient = e.is_transient(), "Structured generation failed");
            anyhow::Error::new(e)
        })
    }
}
