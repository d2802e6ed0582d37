use anyhow::Result;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// An uploaded document whose text grounds document-backed jobs.
#[derive(FromRow, Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub id: Uuid,
    pub file_name: String,
    pub extracted_text: Option<String>,
}

impl SourceDocument {
    /// Extracted text, if there is any non-blank content.
    pub fn content(&self) -> Option<&str> {
        self.extracted_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT id, file_name, extracted_text FROM source_documents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }
}
