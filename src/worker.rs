// src/worker.rs

use anyhow::Result;
use log::{error, info};
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::backfill::{BackfillEngine, BackfillRequest, BackfillResult, JobStatus};
use crate::metrics;
use crate::queue::JobQueue;

/// Consumes backfill requests one at a time and reports outcomes.
///
/// Global concurrency is exactly one: the provider imposes a strict rate
/// limit and each job already serializes its own calls, so a single worker
/// slot is both sufficient and required. Additional queued requests simply
/// wait. No automatic retry here; retry policy belongs to the job source.
pub struct JobRunner {
    queue: JobQueue,
    engine: BackfillEngine,
}

impl JobRunner {
    pub fn new(queue: JobQueue, engine: BackfillEngine) -> Self {
        Self { queue, engine }
    }

    /// Runs until the shutdown flag flips.
    ///
    /// The flag is only observed between jobs: an in-flight job always runs
    /// to completion, so a provider-side request is never left half-applied
    /// with its store write missing.
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("🚀 Backfill worker ready");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let request = match self.queue.pop_request().await {
                Ok(request) => request,
                Err(e) => {
                    error!("Job queue poll failed: {:#}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            let Some(request) = request else {
                // Pop timeout: loop back and re-check the shutdown flag
                continue;
            };

            let result = run_job(&self.engine, &request).await;
            if let Err(e) = self.queue.push_result(&result).await {
                error!("Failed to report result for job {}: {:#}", request.id, e);
            }
        }

        info!("🛑 Backfill worker stopped");
        Ok(())
    }
}

/// Executes one job and folds any failure into a reportable result.
pub async fn run_job(engine: &BackfillEngine, request: &BackfillRequest) -> BackfillResult {
    info!(
        "🔧 Processing job {}: {} on {}",
        request.id, request.token_address, request.network
    );
    let started = Instant::now();

    let result = match engine.backfill(request).await {
        Ok(result) => {
            metrics::increment_jobs_processed("completed");
            info!(
                "✅ Job {} completed: {} days processed, {} saved",
                request.id, result.days_processed, result.days_saved
            );
            result
        }
        Err(e) => {
            metrics::increment_jobs_processed("failed");
            error!("❌ Job {} failed: {}", request.id, e);
            BackfillResult::failed(request, &e)
        }
    };

    metrics::record_job_duration(started.elapsed());
    debug_assert!(result.status == JobStatus::Completed || result.error.is_some());
    result
}
