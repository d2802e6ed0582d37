//! Question generation job model.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::domains::generation::error::JobFatalError;

/// Questions requested when a job does not say (or says zero).
pub const DEFAULT_QUANTITY: u32 = 10;

/// Largest quantity a single job may ask for.
pub const MAX_QUANTITY: u32 = 500;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "question_job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Status only moves forward: pending → processing → completed | failed.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[serde(alias = "facil", alias = "fácil")]
    Easy,
    #[default]
    #[serde(alias = "medio", alias = "médio")]
    Medium,
    #[serde(alias = "dificil", alias = "difícil")]
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Stored difficulty level when the model gives no usable estimate.
    pub fn level(&self) -> i16 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnswerFormat {
    #[default]
    MultipleChoice,
    TrueFalse,
}

impl AnswerFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerFormat::MultipleChoice => "multiple_choice",
            AnswerFormat::TrueFalse => "true_false",
        }
    }
}

/// Queue partition. A job belongs to exactly one, decided by whether its
/// configuration references a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Plain,
    Document,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::Plain, Partition::Document];

    pub fn of(config: &JobConfig) -> Self {
        if config.source_document_id.is_some() {
            Partition::Document
        } else {
            Partition::Plain
        }
    }

    /// Same decision on the stored JSON, mirroring the SQL predicate in
    /// [`GenerationJob::find_pending`]. Works for configs that do not decode.
    pub fn of_raw(config: &Value) -> Self {
        let referenced = ["source_document_id", "pdf_id"]
            .iter()
            .any(|key| config.get(key).is_some_and(|v| !v.is_null()));
        if referenced {
            Partition::Document
        } else {
            Partition::Plain
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Plain => "plain",
            Partition::Document => "document",
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// What a job asks for. Stored as JSONB; unknown keys are ignored and
/// missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub context_id: Option<Uuid>,
    #[serde(alias = "total_questions")]
    pub quantity: u32,
    #[serde(alias = "pdf_id")]
    pub source_document_id: Option<Uuid>,
    pub subject_ids: Vec<Uuid>,
    pub topic_ids: Vec<Uuid>,
    pub difficulty: Difficulty,
    pub exam_board: Option<String>,
    pub exam_year: Option<i32>,
    pub extra_instructions: Option<String>,
    pub answer_format: AnswerFormat,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            context_id: None,
            quantity: DEFAULT_QUANTITY,
            source_document_id: None,
            subject_ids: Vec::new(),
            topic_ids: Vec::new(),
            difficulty: Difficulty::default(),
            exam_board: None,
            exam_year: None,
            extra_instructions: None,
            answer_format: AnswerFormat::default(),
        }
    }
}

impl JobConfig {
    /// Decode a stored config. Anything that does not fit the shape, or asks
    /// for more than [`MAX_QUANTITY`] questions, is fatal for that job only.
    pub fn from_value(value: &Value) -> Result<Self, JobFatalError> {
        let config = Self::deserialize(value)
            .map_err(|e| JobFatalError::InvalidConfig(e.to_string()))?;
        if config.quantity > MAX_QUANTITY {
            return Err(JobFatalError::InvalidConfig(format!(
                "quantity {} exceeds the maximum of {}",
                config.quantity, MAX_QUANTITY
            )));
        }
        Ok(config)
    }

    /// Number of questions the job must attempt.
    pub fn requested_count(&self) -> u32 {
        if self.quantity == 0 {
            DEFAULT_QUANTITY
        } else {
            self.quantity.min(MAX_QUANTITY)
        }
    }

    /// Topic for the chunk at `index`, rotating through the selection.
    pub fn topic_for_chunk(&self, index: u32) -> Option<Uuid> {
        if self.topic_ids.is_empty() {
            return None;
        }
        self.topic_ids
            .get(index as usize % self.topic_ids.len())
            .copied()
    }

    pub fn exam_board_or_default(&self) -> &str {
        self.exam_board
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or("Not specified")
    }

    pub fn extra_instructions(&self) -> Option<&str> {
        self.extra_instructions
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// ============================================================================
// Progress
// ============================================================================

/// `round(generated / requested × 100)`, clamped to 0..=100.
pub fn progress_percentage(generated: usize, requested: u32) -> i32 {
    if requested == 0 {
        return 0;
    }
    let pct = (generated as f64 / requested as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as i32
}

/// The three progress fields, always written together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    pub questions_generated: i32,
    pub progress_percentage: i32,
    pub question_ids: Vec<Uuid>,
}

impl JobProgress {
    pub fn from_ids(question_ids: &[Uuid], requested: u32) -> Self {
        Self {
            questions_generated: question_ids.len() as i32,
            progress_percentage: progress_percentage(question_ids.len(), requested),
            question_ids: question_ids.to_vec(),
        }
    }
}

// ============================================================================
// Job Model
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub user_email: String,
    pub status: JobStatus,
    /// Raw JSONB as the requesting application wrote it. Decoded per job with
    /// [`GenerationJob::job_config`] so one bad row cannot break a poll.
    pub config: Value,
    pub questions_generated: i32,
    pub progress_percentage: i32,
    pub question_ids: Vec<Uuid>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

const JOB_COLUMNS: &str = "id, user_email, status, config, questions_generated, \
     progress_percentage, question_ids, error_message, created_at, started_at, \
     completed_at, updated_at";

impl GenerationJob {
    /// A fresh pending job, as the requesting application creates it.
    pub fn pending(user_email: impl Into<String>, config: JobConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_email: user_email.into(),
            status: JobStatus::Pending,
            config: serde_json::to_value(&config).unwrap_or_default(),
            questions_generated: 0,
            progress_percentage: 0,
            question_ids: Vec::new(),
            error_message: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    pub fn partition(&self) -> Partition {
        Partition::of_raw(&self.config)
    }

    pub fn job_config(&self) -> Result<JobConfig, JobFatalError> {
        JobConfig::from_value(&self.config)
    }

    pub fn progress(&self) -> JobProgress {
        JobProgress {
            questions_generated: self.questions_generated,
            progress_percentage: self.progress_percentage,
            question_ids: self.question_ids.clone(),
        }
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        let sql = format!(
            r#"
            INSERT INTO question_generation_jobs
                (id, user_email, status, config, questions_generated, progress_percentage,
                 question_ids, error_message, created_at, started_at, completed_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {JOB_COLUMNS}
            "#
        );
        let job = sqlx::query_as::<_, Self>(&sql)
            .bind(self.id)
            .bind(&self.user_email)
            .bind(self.status)
            .bind(&self.config)
            .bind(self.questions_generated)
            .bind(self.progress_percentage)
            .bind(&self.question_ids)
            .bind(&self.error_message)
            .bind(self.created_at)
            .bind(self.started_at)
            .bind(self.completed_at)
            .bind(self.updated_at)
            .fetch_one(pool)
            .await?;

        Ok(job)
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM question_generation_jobs WHERE id = $1");
        sqlx::query_as::<_, Self>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Oldest pending jobs of one partition, FIFO.
    pub async fn find_pending(partition: Partition, limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let predicate = match partition {
            Partition::Plain => {
                "COALESCE(config->>'source_document_id', config->>'pdf_id') IS NULL"
            }
            Partition::Document => {
                "COALESCE(config->>'source_document_id', config->>'pdf_id') IS NOT NULL"
            }
        };
        let sql = format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM question_generation_jobs
            WHERE status = 'pending' AND {predicate}
            ORDER BY created_at ASC, id ASC
            LIMIT $1
            "#
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Conditional claim. Returns false when another pass got there first.
    pub async fn claim(id: Uuid, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE question_generation_jobs
            SET status = 'processing',
                started_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn record_progress(id: Uuid, progress: &JobProgress, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE question_generation_jobs
            SET questions_generated = $1,
                progress_percentage = $2,
                question_ids = $3,
                updated_at = NOW()
            WHERE id = $4 AND status = 'processing'
            "#,
        )
        .bind(progress.questions_generated)
        .bind(progress.progress_percentage)
        .bind(&progress.question_ids)
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn mark_completed(id: Uuid, progress: &JobProgress, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE question_generation_jobs
            SET status = 'completed',
                questions_generated = $1,
                progress_percentage = $2,
                question_ids = $3,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $4 AND status = 'processing'
            "#,
        )
        .bind(progress.questions_generated)
        .bind(progress.progress_percentage)
        .bind(&progress.question_ids)
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_failed(id: Uuid, error: &str, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE question_generation_jobs
            SET status = 'failed',
                error_message = $1,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $2 AND status = 'processing'
            "#,
        )
        .bind(error)
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_are_monotonic() {
        use JobStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Processing));
    }

    #[test]
    fn config_defaults_apply_to_empty_json() {
        let config: JobConfig = serde_json::from_value(serde_json::json!({})).unwrap();

        assert_eq!(config.quantity, DEFAULT_QUANTITY);
        assert_eq!(config.difficulty, Difficulty::Medium);
        assert_eq!(config.answer_format, AnswerFormat::MultipleChoice);
        assert_eq!(config.exam_board_or_default(), "Not specified");
        assert!(config.context_id.is_none());
    }

    #[test]
    fn config_accepts_legacy_keys() {
        let doc = Uuid::new_v4();
        let config: JobConfig = serde_json::from_value(serde_json::json!({
            "total_questions": 4,
            "pdf_id": doc,
            "unrelated": "ignored",
        }))
        .unwrap();

        assert_eq!(config.quantity, 4);
        assert_eq!(config.source_document_id, Some(doc));
        assert_eq!(Partition::of(&config), Partition::Document);
    }

    #[test]
    fn raw_partition_matches_typed_partition() {
        let doc = Uuid::new_v4();

        assert_eq!(Partition::of_raw(&serde_json::json!({})), Partition::Plain);
        assert_eq!(
            Partition::of_raw(&serde_json::json!({ "source_document_id": null })),
            Partition::Plain
        );
        assert_eq!(
            Partition::of_raw(&serde_json::json!({ "pdf_id": doc })),
            Partition::Document
        );
        // Decided even when the rest of the config is unusable
        assert_eq!(
            Partition::of_raw(&serde_json::json!({ "source_document_id": "x", "quantity": -1 })),
            Partition::Document
        );
    }

    #[test]
    fn undecodable_config_is_invalid() {
        for raw in [
            serde_json::json!({ "context_id": "c-1" }),
            serde_json::json!({ "quantity": -3 }),
            serde_json::json!({ "difficulty": "impossible" }),
            serde_json::json!("not an object"),
        ] {
            let err = JobConfig::from_value(&raw).unwrap_err();
            assert!(matches!(err, JobFatalError::InvalidConfig(_)), "{raw}");
        }
    }

    #[test]
    fn quantity_above_maximum_is_invalid() {
        let err = JobConfig::from_value(&serde_json::json!({ "quantity": MAX_QUANTITY + 1 }))
            .unwrap_err();
        assert!(err.to_string().contains("exceeds the maximum"));

        let config = JobConfig::from_value(&serde_json::json!({ "quantity": MAX_QUANTITY })).unwrap();
        assert_eq!(config.requested_count(), MAX_QUANTITY);
    }

    #[test]
    fn legacy_difficulty_names_decode() {
        let config = JobConfig::from_value(&serde_json::json!({ "difficulty": "medio" })).unwrap();
        assert_eq!(config.difficulty, Difficulty::Medium);

        let config = JobConfig::from_value(&serde_json::json!({ "difficulty": "difícil" })).unwrap();
        assert_eq!(config.difficulty, Difficulty::Hard);
    }

    #[test]
    fn zero_quantity_falls_back_to_default() {
        let config = JobConfig {
            quantity: 0,
            ..Default::default()
        };
        assert_eq!(config.requested_count(), DEFAULT_QUANTITY);
    }

    #[test]
    fn topics_rotate_per_chunk() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let config = JobConfig {
            topic_ids: vec![a, b],
            ..Default::default()
        };

        assert_eq!(config.topic_for_chunk(0), Some(a));
        assert_eq!(config.topic_for_chunk(1), Some(b));
        assert_eq!(config.topic_for_chunk(2), Some(a));
        assert_eq!(JobConfig::default().topic_for_chunk(3), None);
    }

    #[test]
    fn progress_rounds_and_clamps() {
        assert_eq!(progress_percentage(0, 10), 0);
        assert_eq!(progress_percentage(7, 10), 70);
        assert_eq!(progress_percentage(1, 3), 33);
        assert_eq!(progress_percentage(2, 3), 67);
        assert_eq!(progress_percentage(1, 8), 13);
        assert_eq!(progress_percentage(12, 10), 100);
        assert_eq!(progress_percentage(5, 0), 0);
    }

    #[test]
    fn progress_from_ids_keeps_count_and_list_in_step() {
        let ids: Vec<Uuid> = (0..7).map(|_| Uuid::new_v4()).collect();
        let progress = JobProgress::from_ids(&ids, 10);

        assert_eq!(progress.questions_generated, 7);
        assert_eq!(progress.question_ids.len(), 7);
        assert_eq!(progress.progress_percentage, 70);
    }
}
