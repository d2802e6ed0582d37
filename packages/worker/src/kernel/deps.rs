//! Worker dependencies (using traits for testability)
//!
//! The central container handed to every generation activity. All external
//! services sit behind trait objects.

use std::sync::Arc;

use sqlx::PgPool;

use super::{
    BaseAI, BaseCatalog, BaseJobStore, BaseNotificationStore, BaseQuestionStore,
    GenerationRateLimiter, PostgresStore,
};

#[derive(Clone)]
pub struct WorkerDeps {
    pub jobs: Arc<dyn BaseJobStore>,
    pub questions: Arc<dyn BaseQuestionStore>,
    pub notifications: Arc<dyn BaseNotificationStore>,
    pub catalog: Arc<dyn BaseCatalog>,
    pub ai: Arc<dyn BaseAI>,
    pub rate_limiter: GenerationRateLimiter,
}

impl WorkerDeps {
    pub fn new(
        jobs: Arc<dyn BaseJobStore>,
        questions: Arc<dyn BaseQuestionStore>,
        notifications: Arc<dyn BaseNotificationStore>,
        catalog: Arc<dyn BaseCatalog>,
        ai: Arc<dyn BaseAI>,
        rate_limiter: GenerationRateLimiter,
    ) -> Self {
        Self {
            jobs,
            questions,
            notifications,
            catalog,
            ai,
            rate_limiter,
        }
    }

    /// All stores backed by one Postgres pool.
    pub fn postgres(pool: PgPool, ai: Arc<dyn BaseAI>, rate_limiter: GenerationRateLimiter) -> Self {
        let store = Arc::new(PostgresStore::new(pool));
        Self::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            ai,
            rate_limiter,
        )
    }
}
