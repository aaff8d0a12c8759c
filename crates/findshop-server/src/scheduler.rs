//! Background retention sweep.
//!
//! Shops that stop re-broadcasting are deleted after the configured
//! retention window. The sweep runs hourly, independent of request
//! traffic, and takes the pool as an injected dependency. It may race
//! an in-flight upsert for the same identity; either outcome is
//! consistent, and the next real broadcast recreates the shop.

use std::sync::Arc;

use chrono::Duration;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process; dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<findshop_core::AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_sweep_job(&scheduler, pool, config).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the hourly retention sweep (`0 0 * * * *`).
async fn register_sweep_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<findshop_core::AppConfig>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async("0 0 * * * *", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let retention = Duration::days(config.retention_days);

        Box::pin(async move {
            run_sweep(&pool, retention).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// One sweep pass. Failures are logged and never fatal; the next tick
/// retries naturally.
async fn run_sweep(pool: &PgPool, retention: Duration) {
    match findshop_db::sweep_expired_shops(pool, retention).await {
        Ok(0) => tracing::debug!("sweep: no expired shops"),
        Ok(deleted) => tracing::info!(deleted, "sweep: removed expired shops"),
        Err(e) => tracing::error!(error = %e, "sweep: failed to delete expired shops"),
    }
}
