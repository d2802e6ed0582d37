//! A generation pass: poll each partition and process what was found.
//!
//! Passes may overlap (scheduler tick plus a manual trigger). That is safe
//! because claiming is conditional; a job is processed by one pass only.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info};

use super::poll_jobs::poll_pending_jobs;
use super::process_job::{process_job, JobOutcome};
use crate::config::GenerationSettings;
use crate::domains::generation::error::PassError;
use crate::domains::generation::models::Partition;
use crate::kernel::WorkerDeps;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PartitionSummary {
    pub polled: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl PartitionSummary {
    fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Completed { .. } => self.completed += 1,
            JobOutcome::Failed { .. } => self.failed += 1,
            JobOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }
}

/// What a pass reports to its trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassSummary {
    pub success: bool,
    /// Jobs this pass claimed and drove to a terminal status.
    pub processed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub plain: PartitionSummary,
    pub document: PartitionSummary,
}

pub struct GenerationPass {
    deps: WorkerDeps,
    settings: GenerationSettings,
}

impl GenerationPass {
    /// Settings are checked here so a misconfigured pass never polls.
    pub fn new(deps: WorkerDeps, settings: GenerationSettings) -> Result<Self, PassError> {
        settings.validate()?;
        Ok(Self { deps, settings })
    }

    /// Run one pass. Job-level failures never fail the pass; only a
    /// polling failure does, and it stops the pass where it happened.
    pub async fn run(&self) -> PassSummary {
        let mut summary = PassSummary {
            success: true,
            processed: 0,
            error: None,
            plain: PartitionSummary::default(),
            document: PartitionSummary::default(),
        };

        for partition in Partition::ALL {
            match self.run_partition(partition).await {
                Ok(partition_summary) => match partition {
                    Partition::Plain => summary.plain = partition_summary,
                    Partition::Document => summary.document = partition_summary,
                },
                Err(e) => {
                    error!(error = %e, "Generation pass aborted");
                    summary.success = false;
                    summary.error = Some(e.to_string());
                    break;
                }
            }
        }

        summary.processed = summary.plain.processed() + summary.document.processed();
        info!(
            success = summary.success,
            processed = summary.processed,
            "Generation pass finished"
        );
        summary
    }

    async fn run_partition(&self, partition: Partition) -> Result<PartitionSummary, PassError> {
        let jobs = poll_pending_jobs(partition, self.settings.poll_limit, &self.deps).await?;

        let mut summary = PartitionSummary {
            polled: jobs.len(),
            ..Default::default()
        };

        let outcomes: Vec<JobOutcome> = stream::iter(jobs)
            .map(|job| process_job(job, &self.settings, &self.deps))
            .buffer_unordered(self.settings.max_concurrent_jobs)
            .collect()
            .await;

        for outcome in &outcomes {
            summary.record(outcome);
        }
        Ok(summary)
    }
}
