//! Question generation: turn queued jobs into stored questions.

pub mod activities;
pub mod error;
pub mod models;

pub use activities::{GenerationPass, JobOutcome, PassSummary};
pub use error::{GenerationError, JobFatalError, PassError, PersistenceError};
