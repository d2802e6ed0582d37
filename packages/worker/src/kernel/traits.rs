// Trait definitions for dependency injection
//
// Infrastructure seams only. What to prompt for, and what to do with the
// answer, lives in the generation domain.
//
// Naming convention: Base* for trait names (e.g., BaseAI, BaseJobStore)

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::domains::generation::models::{
    GenerationJob, JobProgress, NewNotification, NewQuestion, Partition, SourceDocument,
};

// =============================================================================
// AI Trait (Infrastructure - structured LLM output)
// =============================================================================

/// One structured-output call.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredPrompt {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    /// JSON schema the reply must conform to
    pub schema: serde_json::Value,
    pub schema_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait BaseAI: Send + Sync {
    /// Returns the raw JSON text of the reply. Parse in calling code.
    async fn generate_structured(&self, prompt: StructuredPrompt) -> Result<String>;
}

// =============================================================================
// Store Traits (Infrastructure - persistence)
// =============================================================================

#[async_trait]
pub trait BaseJobStore: Send + Sync {
    /// Oldest pending jobs of one partition, at most `limit`.
    async fn find_pending(&self, partition: Partition, limit: i64) -> Result<Vec<GenerationJob>>;

    /// Move pending → processing. `false` means the job was no longer pending.
    async fn claim(&self, job_id: Uuid) -> Result<bool>;

    async fn record_progress(&self, job_id: Uuid, progress: &JobProgress) -> Result<()>;

    /// Move processing → completed. `false` means the job was not processing.
    async fn mark_completed(&self, job_id: Uuid, progress: &JobProgress) -> Result<bool>;

    /// Move processing → failed. `false` means the job was not processing.
    async fn mark_failed(&self, job_id: Uuid, error: &str) -> Result<bool>;
}

#[async_trait]
pub trait BaseQuestionStore: Send + Sync {
    async fn insert(&self, question: &NewQuestion) -> Result<Uuid>;
}

#[async_trait]
pub trait BaseNotificationStore: Send + Sync {
    async fn insert(&self, notification: &NewNotification) -> Result<Uuid>;
}

/// Read-only lookups a job's configuration refers to.
#[async_trait]
pub trait BaseCatalog: Send + Sync {
    async fn subject_name(&self, subject_id: Uuid) -> Result<Option<String>>;

    async fn topic_name(&self, topic_id: Uuid) -> Result<Option<String>>;

    async fn source_document(&self, document_id: Uuid) -> Result<Option<SourceDocument>>;
}
