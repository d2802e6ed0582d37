use tracing::{error, info};

use crate::domains::generation::error::PassError;
use crate::domains::generation::models::{GenerationJob, Partition};
use crate::kernel::WorkerDeps;

/// Oldest pending jobs of a partition. Nothing is claimed here.
pub async fn poll_pending_jobs(
    partition: Partition,
    limit: i64,
    deps: &WorkerDeps,
) -> Result<Vec<GenerationJob>, PassError> {
    let jobs = deps
        .jobs
        .find_pending(partition, limit)
        .await
        .map_err(|e| {
            error!(partition = %partition, error = %e, "Failed to poll pending jobs");
            PassError::Claim {
                partition,
                message: e.to_string(),
            }
        })?;

    if !jobs.is_empty() {
        info!(partition = %partition, count = jobs.len(), "Found pending jobs");
    }
    Ok(jobs)
}
