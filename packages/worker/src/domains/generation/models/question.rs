use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::job::AnswerFormat;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub label: String,
    pub text: String,
    pub correct: bool,
}

/// How a question came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionOrigin {
    AiGenerated,
    AiDocument,
}

impl QuestionOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionOrigin::AiGenerated => "ai_generated",
            QuestionOrigin::AiDocument => "ai_document",
        }
    }
}

/// A question ready to be stored. Generated questions are always private.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct NewQuestion {
    #[builder(setter(into))]
    pub user_email: String,
    pub context_id: Uuid,
    #[builder(default)]
    pub subject_id: Option<Uuid>,
    #[builder(default)]
    pub topic_id: Option<Uuid>,
    #[builder(default)]
    pub source_document_id: Option<Uuid>,
    #[builder(setter(into))]
    pub statement: String,
    #[builder(default)]
    pub answer_format: AnswerFormat,
    pub options: Vec<QuestionOption>,
    #[builder(setter(into))]
    pub answer_key: String,
    #[builder(default)]
    pub explanation: Option<String>,
    pub difficulty: i16,
    #[builder(default)]
    pub exam_board: Option<String>,
    #[builder(default)]
    pub exam_year: Option<i32>,
    pub origin: QuestionOrigin,
    #[builder(setter(into))]
    pub source: String,
    #[builder(default)]
    pub tags: Vec<String>,
}

impl NewQuestion {
    pub async fn insert(&self, pool: &PgPool) -> Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO questions
                (user_email, context_id, subject_id, topic_id, source_document_id,
                 statement, answer_format, options, answer_key, explanation, difficulty,
                 exam_board, exam_year, origin, source, is_public, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, FALSE, $16)
            RETURNING id
            "#,
        )
        .bind(&self.user_email)
        .bind(self.context_id)
        .bind(self.subject_id)
        .bind(self.topic_id)
        .bind(self.source_document_id)
        .bind(&self.statement)
        .bind(self.answer_format.as_str())
        .bind(sqlx::types::Json(&self.options))
        .bind(&self.answer_key)
        .bind(&self.explanation)
        .bind(self.difficulty)
        .bind(&self.exam_board)
        .bind(self.exam_year)
        .bind(self.origin.as_str())
        .bind(&self.source)
        .bind(&self.tags)
        .fetch_one(pool)
        .await?;

        Ok(id)
    }
}

/// A stored question row.
#[derive(FromRow, Debug, Clone)]
pub struct Question {
    pub id: Uuid,
    pub user_email: String,
    pub context_id: Uuid,
    pub subject_id: Option<Uuid>,
    pub topic_id: Option<Uuid>,
    pub source_document_id: Option<Uuid>,
    pub statement: String,
    pub answer_format: String,
    #[sqlx(json)]
    pub options: Vec<QuestionOption>,
    pub answer_key: String,
    pub explanation: Option<String>,
    pub difficulty: i16,
    pub origin: String,
    pub source: String,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub async fn find_by_ids(ids: &[Uuid], pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT id, user_email, context_id, subject_id, topic_id, source_document_id,
                   statement, answer_format, options, answer_key, explanation, difficulty,
                   origin, source, is_public, tags, created_at
            FROM questions
            WHERE id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
