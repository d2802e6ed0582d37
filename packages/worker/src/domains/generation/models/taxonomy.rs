//! Subject and topic name lookups used to phrase prompts.

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// Name used in prompts when a subject or topic cannot be resolved.
pub const FALLBACK_NAME: &str = "General";

pub async fn find_subject_name(id: Uuid, pool: &PgPool) -> Result<Option<String>> {
    sqlx::query_scalar("SELECT name FROM context_subjects WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
}

pub async fn find_topic_name(id: Uuid, pool: &PgPool) -> Result<Option<String>> {
    sqlx::query_scalar("SELECT name FROM context_topics WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
}
