//! Completion and failure notices for the job's owner.

use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use super::generate_batch::DocumentExcerpt;
use crate::domains::generation::error::PersistenceError;
use crate::domains::generation::models::{
    GenerationJob, JobProgress, JobStatus, NewNotification, GENERATION_CATEGORY,
};
use crate::kernel::WorkerDeps;

pub fn completion_notice(
    job: &GenerationJob,
    context_id: Uuid,
    progress: &JobProgress,
    requested: u32,
    document: Option<&DocumentExcerpt>,
) -> NewNotification {
    NewNotification {
        user_email: job.user_email.clone(),
        category: GENERATION_CATEGORY.to_string(),
        title: "Questions generated".to_string(),
        message: match document {
            Some(document) => format!(
                "{} of {} questions were generated from {}",
                progress.questions_generated, requested, document.file_name
            ),
            None => format!(
                "{} of {} questions were generated",
                progress.questions_generated, requested
            ),
        },
        link: Some(format!("/questions?context={}", context_id)),
        icon: Some("check-circle".to_string()),
        metadata: json!({
            "job_id": job.id,
            "status": JobStatus::Completed,
            "question_ids": progress.question_ids,
            "context_id": context_id,
            "document_name": document.map(|d| d.file_name.as_str()),
        }),
    }
}

pub fn failure_notice(job: &GenerationJob, error: &str) -> NewNotification {
    NewNotification {
        user_email: job.user_email.clone(),
        category: GENERATION_CATEGORY.to_string(),
        title: "Question generation failed".to_string(),
        message: format!("An error occurred: {}", error),
        link: None,
        icon: Some("alert-circle".to_string()),
        metadata: json!({
            "job_id": job.id,
            "status": JobStatus::Failed,
            "error": error,
        }),
    }
}

/// Returns whether the notice was stored. Failures are logged only.
pub async fn send_notification(notice: NewNotification, deps: &WorkerDeps) -> bool {
    match deps.notifications.insert(&notice).await {
        Ok(_) => true,
        Err(e) => {
            let err = PersistenceError::Notification(e.to_string());
            warn!(user = %notice.user_email, error = %err, "Notification not delivered");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::generation::models::JobConfig;

    #[test]
    fn completion_notice_reports_counts_and_links_context() {
        let context_id = Uuid::new_v4();
        let job = GenerationJob::pending(
            "ana@example.com",
            JobConfig {
                context_id: Some(context_id),
                ..Default::default()
            },
        );
        let ids: Vec<Uuid> = (0..7).map(|_| Uuid::new_v4()).collect();
        let progress = JobProgress::from_ids(&ids, 10);

        let notice = completion_notice(&job, context_id, &progress, 10, None);

        assert_eq!(notice.message, "7 of 10 questions were generated");
        assert_eq!(notice.link, Some(format!("/questions?context={}", context_id)));
        assert_eq!(notice.category, GENERATION_CATEGORY);
        assert_eq!(notice.metadata["status"], "completed");
        assert_eq!(notice.metadata["question_ids"].as_array().unwrap().len(), 7);
        assert!(notice.metadata["document_name"].is_null());
    }

    #[test]
    fn failure_notice_carries_the_error() {
        let job = GenerationJob::pending("ana@example.com", JobConfig::default());
        let notice = failure_notice(&job, "job configuration has no context_id");

        assert_eq!(notice.title, "Question generation failed");
        assert_eq!(
            notice.message,
            "An error occurred: job configuration has no context_id"
        );
        assert_eq!(notice.metadata["status"], "failed");
        assert_eq!(notice.link, None);
    }
}
