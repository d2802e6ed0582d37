//! Scheduled generation passes using tokio-cron-scheduler.
//!
//! ```text
//! Scheduler (SCHEDULE_CRON, every minute by default)
//!     │
//!     └─► GenerationPass::run()
//!             └─► plain partition → document partition
//! ```
//!
//! Ticks may overlap a manual `/run` trigger; claiming keeps that safe.

use std::sync::Arc;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::generation::GenerationPass;

/// Start the generation schedule
pub async fn start_scheduler(pass: Arc<GenerationPass>, schedule: &str) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let generation_job = Job::new_async(schedule, move |_uuid, _lock| {
        let pass = pass.clone();
        Box::pin(async move {
            let summary = pass.run().await;
            if !summary.success {
                tracing::error!(
                    error = summary.error.as_deref().unwrap_or("unknown"),
                    "Scheduled generation pass failed"
                );
            }
        })
    })?;

    scheduler.add(generation_job).await?;
    scheduler.start().await?;

    tracing::info!(schedule, "Generation scheduler started");
    Ok(scheduler)
}
