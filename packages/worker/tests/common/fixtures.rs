//! Test fixtures for creating jobs and wiring passes.

use chrono::{Duration, Utc};
use uuid::Uuid;
use worker_core::domains::generation::models::{GenerationJob, JobConfig};
use worker_core::domains::generation::GenerationPass;
use worker_core::kernel::TestDependencies;
use worker_core::GenerationSettings;

pub const OWNER: &str = "owner@example.com";

/// Config for a plain job with a context and `quantity` questions.
pub fn plain_config(quantity: u32) -> JobConfig {
    JobConfig {
        context_id: Some(Uuid::new_v4()),
        quantity,
        ..Default::default()
    }
}

/// A pending job created `age_secs` seconds ago.
pub fn pending_job(config: JobConfig, age_secs: i64) -> GenerationJob {
    let mut job = GenerationJob::pending(OWNER, config);
    job.created_at = Utc::now() - Duration::seconds(age_secs);
    job.updated_at = job.created_at;
    job
}

/// Insert a pending job into the in-memory store.
pub fn enqueue(deps: &TestDependencies, config: JobConfig) -> Uuid {
    deps.jobs.insert(pending_job(config, 0))
}

pub fn per_item_settings() -> GenerationSettings {
    GenerationSettings::builder().batch_size(1).build()
}

pub fn pass(deps: &TestDependencies, settings: GenerationSettings) -> GenerationPass {
    GenerationPass::new(deps.deps(), settings).expect("valid settings")
}
