use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

pub const GENERATION_CATEGORY: &str = "question_generation";

/// A user-facing notice about a finished job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNotification {
    pub user_email: String,
    pub category: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub icon: Option<String>,
    pub metadata: serde_json::Value,
}

impl NewNotification {
    pub async fn insert(&self, pool: &PgPool) -> Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO user_notifications
                (user_email, category, title, message, link, icon, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&self.user_email)
        .bind(&self.category)
        .bind(&self.title)
        .bind(&self.message)
        .bind(&self.link)
        .bind(&self.icon)
        .bind(&self.metadata)
        .fetch_one(pool)
        .await?;

        Ok(id)
    }
}

#[derive(FromRow, Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_email: String,
    pub category: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub icon: Option<String>,
    pub metadata: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub async fn find_for_user(user_email: &str, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT id, user_email, category, title, message, link, icon, metadata, is_read, created_at
            FROM user_notifications
            WHERE user_email = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_email)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
