pub mod generate_batch;
pub mod notify;
pub mod persist_questions;
pub mod poll_jobs;
pub mod process_job;
pub mod run_pass;

pub use generate_batch::{generate_batch, ChunkRequest, DocumentExcerpt, ParsedBatch, QuestionDraft};
pub use notify::{completion_notice, failure_notice};
pub use poll_jobs::poll_pending_jobs;
pub use process_job::{process_job, JobOutcome};
pub use run_pass::{GenerationPass, PartitionSummary, PassSummary};
