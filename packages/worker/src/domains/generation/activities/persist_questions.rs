use tracing::warn;
use uuid::Uuid;

use super::generate_batch::{DocumentExcerpt, QuestionDraft};
use crate::domains::generation::error::PersistenceError;
use crate::domains::generation::models::{
    GenerationJob, JobConfig, JobProgress, NewQuestion, QuestionOrigin, FALLBACK_NAME,
};
use crate::kernel::WorkerDeps;

/// Where a chunk's questions attach in the taxonomy.
#[derive(Debug, Clone)]
pub struct QuestionLinkage<'a> {
    pub context_id: Uuid,
    /// Every selected subject; the first one is stored on the question.
    pub subjects: &'a [(Uuid, String)],
    pub topic: Option<(Uuid, &'a str)>,
    pub document: Option<&'a DocumentExcerpt>,
    pub model: &'a str,
}

pub fn build_question(
    job: &GenerationJob,
    config: &JobConfig,
    linkage: &QuestionLinkage<'_>,
    draft: QuestionDraft,
) -> NewQuestion {
    let (origin, source) = match linkage.document {
        Some(document) => (
            QuestionOrigin::AiDocument,
            format!("document:{}", document.file_name),
        ),
        None => (QuestionOrigin::AiGenerated, linkage.model.to_string()),
    };

    let exam_board = config
        .exam_board
        .as_deref()
        .map(str::trim)
        .filter(|board| !board.is_empty());
    let tags: Vec<String> = linkage
        .subjects
        .iter()
        .map(|(_, name)| name.as_str())
        .filter(|name| *name != FALLBACK_NAME)
        .chain(
            linkage
                .topic
                .map(|(_, name)| name)
                .filter(|name| *name != FALLBACK_NAME),
        )
        .chain(exam_board)
        .map(str::to_string)
        .collect();

    NewQuestion::builder()
        .user_email(job.user_email.clone())
        .context_id(linkage.context_id)
        .subject_id(linkage.subjects.first().map(|(id, _)| *id))
        .topic_id(linkage.topic.map(|(id, _)| id))
        .source_document_id(linkage.document.map(|d| d.id))
        .statement(draft.statement)
        .answer_format(config.answer_format)
        .options(draft.options)
        .answer_key(draft.answer_key)
        .explanation(draft.explanation)
        .difficulty(draft.difficulty)
        .exam_board(config.exam_board.clone())
        .exam_year(config.exam_year)
        .origin(origin)
        .source(source)
        .tags(tags)
        .build()
}

/// Store questions one by one. Returns the ids of those that were stored.
pub async fn persist_chunk(job_id: Uuid, questions: Vec<NewQuestion>, deps: &WorkerDeps) -> Vec<Uuid> {
    let mut ids = Vec::with_capacity(questions.len());
    for question in questions {
        match deps.questions.insert(&question).await {
            Ok(id) => ids.push(id),
            Err(e) => {
                let err = PersistenceError::Question(e.to_string());
                warn!(job_id = %job_id, error = %err, "Dropping question");
            }
        }
    }
    ids
}

/// Best effort. A failed write is logged and the job carries on.
pub async fn record_progress(job_id: Uuid, progress: &JobProgress, deps: &WorkerDeps) {
    if let Err(e) = deps.jobs.record_progress(job_id, progress).await {
        let err = PersistenceError::Progress(e.to_string());
        warn!(job_id = %job_id, error = %err, "Progress update lost");
    }
}
