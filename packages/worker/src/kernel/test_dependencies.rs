// TestDependencies - in-memory implementations for testing
//
// Stand-ins for every store and the generation service. Each one records
// the calls it receives so tests can assert on them.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{
    BaseAI, BaseCatalog, BaseJobStore, BaseNotificationStore, BaseQuestionStore,
    GenerationRateLimiter, StructuredPrompt, WorkerDeps,
};
use crate::domains::generation::models::{
    GenerationJob, JobProgress, JobStatus, NewNotification, NewQuestion, Partition, SourceDocument,
};

// =============================================================================
// In-memory Job Store
// =============================================================================

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<Vec<GenerationJob>>,
    progress_updates: Mutex<Vec<(Uuid, JobProgress)>>,
    poll_error: Mutex<Option<String>>,
    fail_progress: AtomicBool,
    fail_completion: AtomicBool,
    fail_failure: AtomicBool,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: GenerationJob) -> Uuid {
        let id = job.id;
        self.jobs.lock().unwrap().push(job);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<GenerationJob> {
        self.jobs.lock().unwrap().iter().find(|j| j.id == id).cloned()
    }

    pub fn all(&self) -> Vec<GenerationJob> {
        self.jobs.lock().unwrap().clone()
    }

    /// Every intermediate progress write for a job, in order.
    pub fn progress_updates(&self, id: Uuid) -> Vec<JobProgress> {
        self.progress_updates
            .lock()
            .unwrap()
            .iter()
            .filter(|(job_id, _)| *job_id == id)
            .map(|(_, progress)| progress.clone())
            .collect()
    }

    /// Make every `find_pending` call fail with `message`.
    pub fn fail_polling(&self, message: &str) {
        *self.poll_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_progress_writes(&self) {
        self.fail_progress.store(true, Ordering::SeqCst);
    }

    pub fn fail_completion_writes(&self) {
        self.fail_completion.store(true, Ordering::SeqCst);
    }

    pub fn fail_failure_writes(&self) {
        self.fail_failure.store(true, Ordering::SeqCst);
    }

    fn update<F>(&self, id: Uuid, expected: JobStatus, apply: F) -> bool
    where
        F: FnOnce(&mut GenerationJob),
    {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.iter_mut().find(|j| j.id == id) {
            Some(job) if job.status == expected => {
                apply(job);
                job.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl BaseJobStore for InMemoryJobStore {
    async fn find_pending(&self, partition: Partition, limit: i64) -> Result<Vec<GenerationJob>> {
        if let Some(message) = self.poll_error.lock().unwrap().clone() {
            return Err(anyhow!(message));
        }

        let mut pending: Vec<GenerationJob> = self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.status == JobStatus::Pending && j.partition() == partition)
            .cloned()
            .collect();
        pending.sort_by_key(|j| (j.created_at, j.id));
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn claim(&self, job_id: Uuid) -> Result<bool> {
        Ok(self.update(job_id, JobStatus::Pending, |job| {
            job.status = JobStatus::Processing;
            job.started_at = Some(Utc::now());
        }))
    }

    async fn record_progress(&self, job_id: Uuid, progress: &JobProgress) -> Result<()> {
        if self.fail_progress.load(Ordering::SeqCst) {
            return Err(anyhow!("progress write rejected"));
        }

        self.progress_updates
            .lock()
            .unwrap()
            .push((job_id, progress.clone()));
        self.update(job_id, JobStatus::Processing, |job| {
            job.questions_generated = progress.questions_generated;
            job.progress_percentage = progress.progress_percentage;
            job.question_ids = progress.question_ids.clone();
        });
        Ok(())
    }

    async fn mark_completed(&self, job_id: Uuid, progress: &JobProgress) -> Result<bool> {
        if self.fail_completion.load(Ordering::SeqCst) {
            return Err(anyhow!("completion write rejected"));
        }
        Ok(self.update(job_id, JobStatus::Processing, |job| {
            job.status = JobStatus::Completed;
            job.questions_generated = progress.questions_generated;
            job.progress_percentage = progress.progress_percentage;
            job.question_ids = progress.question_ids.clone();
            job.completed_at = Some(Utc::now());
        }))
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str) -> Result<bool> {
        if self.fail_failure.load(Ordering::SeqCst) {
            return Err(anyhow!("failure write rejected"));
        }
        Ok(self.update(job_id, JobStatus::Processing, |job| {
            job.status = JobStatus::Failed;
            job.error_message = Some(error.to_string());
            job.completed_at = Some(Utc::now());
        }))
    }
}

// =============================================================================
// Mock Question Store
// =============================================================================

#[derive(Default)]
pub struct MockQuestionStore {
    inserted: Mutex<Vec<(Uuid, NewQuestion)>>,
    failing_calls: Mutex<HashSet<usize>>,
    calls: AtomicUsize,
}

impl MockQuestionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the insert with this zero-based call index.
    pub fn fail_call(&self, index: usize) {
        self.failing_calls.lock().unwrap().insert(index);
    }

    pub fn inserted(&self) -> Vec<(Uuid, NewQuestion)> {
        self.inserted.lock().unwrap().clone()
    }

    pub fn inserted_ids(&self) -> Vec<Uuid> {
        self.inserted.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }
}

#[async_trait]
impl BaseQuestionStore for MockQuestionStore {
    async fn insert(&self, question: &NewQuestion) -> Result<Uuid> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_calls.lock().unwrap().contains(&call) {
            return Err(anyhow!("insert {} rejected", call));
        }

        let id = Uuid::new_v4();
        self.inserted.lock().unwrap().push((id, question.clone()));
        Ok(id)
    }
}

// =============================================================================
// Mock Notification Store
// =============================================================================

#[derive(Default)]
pub struct MockNotificationStore {
    sent: Mutex<Vec<NewNotification>>,
    fail: AtomicBool,
}

impl MockNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<NewNotification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, user_email: &str) -> Vec<NewNotification> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_email == user_email)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BaseNotificationStore for MockNotificationStore {
    async fn insert(&self, notification: &NewNotification) -> Result<Uuid> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("notification insert rejected"));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(Uuid::new_v4())
    }
}

// =============================================================================
// In-memory Catalog
// =============================================================================

#[derive(Default)]
pub struct InMemoryCatalog {
    subjects: Mutex<HashMap<Uuid, String>>,
    topics: Mutex<HashMap<Uuid, String>>,
    documents: Mutex<HashMap<Uuid, SourceDocument>>,
    fail_document_lookups: AtomicBool,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subject(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.subjects.lock().unwrap().insert(id, name.to_string());
        id
    }

    pub fn add_topic(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.topics.lock().unwrap().insert(id, name.to_string());
        id
    }

    pub fn add_document(&self, file_name: &str, extracted_text: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        self.documents.lock().unwrap().insert(
            id,
            SourceDocument {
                id,
                file_name: file_name.to_string(),
                extracted_text: extracted_text.map(str::to_string),
            },
        );
        id
    }

    pub fn fail_document_lookups(&self) {
        self.fail_document_lookups.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BaseCatalog for InMemoryCatalog {
    async fn subject_name(&self, subject_id: Uuid) -> Result<Option<String>> {
        Ok(self.subjects.lock().unwrap().get(&subject_id).cloned())
    }

    async fn topic_name(&self, topic_id: Uuid) -> Result<Option<String>> {
        Ok(self.topics.lock().unwrap().get(&topic_id).cloned())
    }

    async fn source_document(&self, document_id: Uuid) -> Result<Option<SourceDocument>> {
        if self.fail_document_lookups.load(Ordering::SeqCst) {
            return Err(anyhow!("document lookup unavailable"));
        }
        Ok(self.documents.lock().unwrap().get(&document_id).cloned())
    }
}

// =============================================================================
// Mock AI
// =============================================================================

/// Replays queued replies in order. Fails when the queue runs dry.
#[derive(Default)]
pub struct MockAI {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    calls: Mutex<Vec<StructuredPrompt>>,
}

impl MockAI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, json: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Ok(json.into()));
    }

    /// Queue a well-formed reply holding `count` questions.
    pub fn push_questions(&self, count: usize) {
        self.push_reply(mock_question_batch(count));
    }

    pub fn push_failure(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn calls(&self) -> Vec<StructuredPrompt> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BaseAI for MockAI {
    async fn generate_structured(&self, prompt: StructuredPrompt) -> Result<String> {
        self.calls.lock().unwrap().push(prompt);

        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(json)) => Ok(json),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no mock reply queued")),
        }
    }
}

/// A reply body with `count` valid multiple-choice questions.
pub fn mock_question_batch(count: usize) -> String {
    let items: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "statement": format!("Mock question {}", i + 1),
                "options": [
                    { "label": "A", "text": "First", "correct": false },
                    { "label": "B", "text": "Second", "correct": true },
                    { "label": "C", "text": "Third", "correct": false },
                    { "label": "D", "text": "Fourth", "correct": false },
                ],
                "explanation": "B is the only correct option.",
                "difficulty": 3,
            })
        })
        .collect();

    serde_json::json!({ "items": items }).to_string()
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Every mock, plus the [`WorkerDeps`] that wires them together.
#[derive(Clone)]
pub struct TestDependencies {
    pub jobs: Arc<InMemoryJobStore>,
    pub questions: Arc<MockQuestionStore>,
    pub notifications: Arc<MockNotificationStore>,
    pub catalog: Arc<InMemoryCatalog>,
    pub ai: Arc<MockAI>,
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(InMemoryJobStore::new()),
            questions: Arc::new(MockQuestionStore::new()),
            notifications: Arc::new(MockNotificationStore::new()),
            catalog: Arc::new(InMemoryCatalog::new()),
            ai: Arc::new(MockAI::new()),
        }
    }

    pub fn deps(&self) -> WorkerDeps {
        WorkerDeps::new(
            self.jobs.clone(),
            self.questions.clone(),
            self.notifications.clone(),
            self.catalog.clone(),
            self.ai.clone(),
            GenerationRateLimiter::unlimited(),
        )
    }
}
