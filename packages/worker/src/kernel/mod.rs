//! Kernel module - worker infrastructure and dependencies.

pub mod ai;
pub mod deps;
pub mod postgres;
pub mod rate_limit;
pub mod scheduled_tasks;
pub mod test_dependencies;
pub mod traits;

pub use ai::OpenAIGenerator;
pub use deps::WorkerDeps;
pub use postgres::PostgresStore;
pub use rate_limit::GenerationRateLimiter;
pub use test_dependencies::TestDependencies;
pub use traits::*;
