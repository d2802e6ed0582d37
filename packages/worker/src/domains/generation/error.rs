use thiserror::Error;
use uuid::Uuid;

use super::models::Partition;
use crate::config::ConfigError;

/// A single generation call (or one item of its reply) went wrong.
/// Never fails the job by itself.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    #[error("generation service call failed: {0}")]
    Service(String),

    #[error("generation service returned an empty reply")]
    EmptyReply,

    #[error("reply does not match the question schema: {0}")]
    Unparsable(String),

    #[error("reply contained no questions")]
    NoItems,

    #[error("item {index} rejected: {reason}")]
    InvalidItem { index: usize, reason: String },
}

/// Ends the job as failed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JobFatalError {
    #[error("invalid job configuration: {0}")]
    InvalidConfig(String),

    #[error("job configuration has no context_id")]
    MissingContext,

    #[error("source document {0} not found")]
    DocumentNotFound(Uuid),

    #[error("source document {0} has no extracted content")]
    EmptyDocument(Uuid),

    #[error("failed to resolve job references: {0}")]
    Lookup(String),

    #[error("only {generated} of {requested} questions were generated")]
    TooManyFailures { generated: usize, requested: u32 },
}

/// A store write failed. Logged and absorbed where it happens.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to store question: {0}")]
    Question(String),

    #[error("failed to record progress: {0}")]
    Progress(String),

    #[error("failed to record job outcome: {0}")]
    Outcome(String),

    #[error("failed to store notification: {0}")]
    Notification(String),
}

/// Aborts a whole pass.
#[derive(Debug, Error)]
pub enum PassError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to poll {partition} jobs: {message}")]
    Claim { partition: Partition, message: String },
}
