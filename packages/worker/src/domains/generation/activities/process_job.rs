//! Drive one job from claim to terminal status.
//!
//! ```text
//! claim (pending → processing)
//!   └─► decode config, resolve context, subjects, document
//!         └─► for each chunk: generate → persist → record progress
//!               └─► completed | failed (only if still processing)
//!                     └─► notify owner
//! ```

use std::collections::HashMap;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::generate_batch::{generate_batch, plan_chunks, ChunkRequest, DocumentExcerpt};
use super::notify::{completion_notice, failure_notice, send_notification};
use super::persist_questions::{build_question, persist_chunk, record_progress, QuestionLinkage};
use crate::config::GenerationSettings;
use crate::domains::generation::error::{JobFatalError, PersistenceError};
use crate::domains::generation::models::{GenerationJob, JobConfig, JobProgress, FALLBACK_NAME};
use crate::kernel::WorkerDeps;

/// How a job ended for this pass.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed { generated: usize, requested: u32 },
    Failed { error: String },
    /// No terminal status was recorded by this pass: the claim was lost, the
    /// status moved underneath us, or the outcome write itself failed.
    Skipped,
}

pub async fn process_job(job: GenerationJob, settings: &GenerationSettings, deps: &WorkerDeps) -> JobOutcome {
    match deps.jobs.claim(job.id).await {
        Ok(true) => {}
        Ok(false) => {
            info!(job_id = %job.id, "Job already claimed elsewhere, skipping");
            return JobOutcome::Skipped;
        }
        Err(e) => {
            warn!(job_id = %job.id, error = %e, "Failed to claim job, leaving it pending");
            return JobOutcome::Skipped;
        }
    }

    run_claimed_job(job, settings, deps).await
}

#[instrument(skip_all, fields(job_id = %job.id, partition = %job.partition()))]
async fn run_claimed_job(job: GenerationJob, settings: &GenerationSettings, deps: &WorkerDeps) -> JobOutcome {
    let config = match job.job_config() {
        Ok(config) => config,
        Err(fatal) => return fail_job(&job, &fatal.to_string(), deps).await,
    };
    let requested = config.requested_count();
    info!(requested, "Processing generation job");

    let generated = match generate_questions(&job, &config, requested, settings, deps).await {
        Ok(generated) => generated,
        Err(fatal) => return fail_job(&job, &fatal.to_string(), deps).await,
    };

    let count = generated.question_ids.len();
    if let Some(ratio) = settings.max_failure_ratio {
        let missing = (requested as usize).saturating_sub(count) as f64 / requested as f64;
        if missing > ratio {
            let fatal = JobFatalError::TooManyFailures {
                generated: count,
                requested,
            };
            return fail_job(&job, &fatal.to_string(), deps).await;
        }
    }

    let progress = JobProgress::from_ids(&generated.question_ids, requested);
    match deps.jobs.mark_completed(job.id, &progress).await {
        Ok(true) => {
            info!(generated = count, requested, "Job completed");
            send_notification(
                completion_notice(
                    &job,
                    generated.context_id,
                    &progress,
                    requested,
                    generated.document.as_ref(),
                ),
                deps,
            )
            .await;
            JobOutcome::Completed {
                generated: count,
                requested,
            }
        }
        Ok(false) => {
            warn!("Job left processing before completion, not notifying");
            JobOutcome::Skipped
        }
        Err(e) => {
            let err = PersistenceError::Outcome(e.to_string());
            warn!(error = %err, "Completion not recorded, failing job instead");
            fail_job(&job, &err.to_string(), deps).await
        }
    }
}

/// What the chunk loop produced.
struct GeneratedQuestions {
    context_id: Uuid,
    question_ids: Vec<Uuid>,
    document: Option<DocumentExcerpt>,
}

/// Chunk loop. Only resolution problems are fatal; chunk failures are absorbed.
async fn generate_questions(
    job: &GenerationJob,
    config: &JobConfig,
    requested: u32,
    settings: &GenerationSettings,
    deps: &WorkerDeps,
) -> Result<GeneratedQuestions, JobFatalError> {
    let context_id = config.context_id.ok_or(JobFatalError::MissingContext)?;

    let document = match config.source_document_id {
        Some(document_id) => {
            let document = deps
                .catalog
                .source_document(document_id)
                .await
                .map_err(|e| JobFatalError::Lookup(e.to_string()))?
                .ok_or(JobFatalError::DocumentNotFound(document_id))?;
            Some(DocumentExcerpt::from_document(
                &document,
                settings.max_document_chars,
            )?)
        }
        None => None,
    };

    let mut subjects: Vec<(Uuid, String)> = Vec::new();
    for &id in &config.subject_ids {
        subjects.push((id, subject_name(id, deps).await));
    }
    let subject_names = subject_prompt_names(&subjects);

    let mut topic_names: HashMap<Uuid, String> = HashMap::new();
    let mut question_ids: Vec<Uuid> = Vec::new();

    for (index, size) in plan_chunks(requested, settings.batch_size).into_iter().enumerate() {
        let index = index as u32;
        let topic_id = config.topic_for_chunk(index);
        if let Some(id) = topic_id {
            if !topic_names.contains_key(&id) {
                let name = topic_name(id, deps).await;
                topic_names.insert(id, name);
            }
        }
        let topic = topic_id.and_then(|id| topic_names.get(&id).map(|name| (id, name.as_str())));

        let request = ChunkRequest {
            index,
            size,
            config,
            subject_name: &subject_names,
            topic_name: topic.map_or(FALLBACK_NAME, |(_, name)| name),
            document: document.as_ref(),
        };

        let batch = match generate_batch(&request, settings, deps).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(chunk = index, size, error = %e, "Chunk produced no questions");
                continue;
            }
        };
        for rejected in &batch.rejected {
            warn!(chunk = index, error = %rejected, "Discarding generated item");
        }
        if batch.surplus > 0 {
            info!(chunk = index, surplus = batch.surplus, "Discarding surplus items");
        }

        let linkage = QuestionLinkage {
            context_id,
            subjects: &subjects,
            topic,
            document: document.as_ref(),
            model: &settings.model,
        };
        let questions = batch
            .drafts
            .into_iter()
            .map(|draft| build_question(job, config, &linkage, draft))
            .collect();

        let stored = persist_chunk(job.id, questions, deps).await;
        if stored.is_empty() {
            continue;
        }
        question_ids.extend(stored);

        let progress = JobProgress::from_ids(&question_ids, requested);
        record_progress(job.id, &progress, deps).await;
    }

    Ok(GeneratedQuestions {
        context_id,
        question_ids,
        document,
    })
}

/// Resolved subject names joined for the prompt, or the fallback name.
fn subject_prompt_names(subjects: &[(Uuid, String)]) -> String {
    let names: Vec<&str> = subjects
        .iter()
        .map(|(_, name)| name.as_str())
        .filter(|name| *name != FALLBACK_NAME)
        .collect();
    if names.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        names.join(", ")
    }
}

async fn fail_job(job: &GenerationJob, error: &str, deps: &WorkerDeps) -> JobOutcome {
    match deps.jobs.mark_failed(job.id, error).await {
        Ok(true) => {
            warn!(job_id = %job.id, error, "Job failed");
            send_notification(failure_notice(job, error), deps).await;
            JobOutcome::Failed {
                error: error.to_string(),
            }
        }
        Ok(false) => {
            warn!(job_id = %job.id, "Job left processing before failure was recorded");
            JobOutcome::Skipped
        }
        Err(e) => {
            let err = PersistenceError::Outcome(e.to_string());
            error!(job_id = %job.id, error = %err, "Failure not recorded, job left processing");
            JobOutcome::Skipped
        }
    }
}

async fn subject_name(id: Uuid, deps: &WorkerDeps) -> String {
    match deps.catalog.subject_name(id).await {
        Ok(Some(name)) => name,
        Ok(None) => FALLBACK_NAME.to_string(),
        Err(e) => {
            warn!(subject_id = %id, error = %e, "Subject lookup failed, using fallback name");
            FALLBACK_NAME.to_string()
        }
    }
}

async fn topic_name(id: Uuid, deps: &WorkerDeps) -> String {
    match deps.catalog.topic_name(id).await {
        Ok(Some(name)) => name,
        Ok(None) => FALLBACK_NAME.to_string(),
        Err(e) => {
            warn!(topic_id = %id, error = %e, "Topic lookup failed, using fallback name");
            FALLBACK_NAME.to_string()
        }
    }
}
