//! Assessment completion events.
//!
//! A subsystem reporting a submitted session enqueues a re-check for every candidate
//! waiting on it; a consumer task in the `serve` process drains the queue and advances
//! just those candidates.

pub mod redis_queue;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::pipeline::{PipelineOrchestrator, RunReport};
use crate::repository::{PipelineRepository, RepoError};

pub use redis_queue::RedisRecheckQueue;

const POLL_TIMEOUT: Duration = Duration::from_secs(5);
const ERROR_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Malformed queue message: {0}")]
    Codec(#[from] serde_json::Error),

    #[error(transparent)]
    Repository(#[from] RepoError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecheckRequest {
    pub candidate_id: Uuid,
    pub pipeline_id: Uuid,
    pub enqueued_at: DateTime<Utc>,
}

#[async_trait]
pub trait RecheckQueue: Send + Sync {
    async fn enqueue(&self, request: &RecheckRequest) -> Result<(), QueueError>;

    /// Waits up to `timeout` for the next request.
    async fn next(&self, timeout: Duration) -> Result<Option<RecheckRequest>, QueueError>;
}

/// Enqueues a re-check for every candidate with this email that is waiting on
/// assessment results in an active pipeline. Returns how many were enqueued.
pub async fn enqueue_rechecks(
    repo: &dyn PipelineRepository,
    queue: &dyn RecheckQueue,
    candidate_ref: &str,
) -> Result<usize, QueueError> {
    let waiting = repo.find_awaiting_results(candidate_ref).await?;
    for candidate in &waiting {
        queue
            .enqueue(&RecheckRequest {
                candidate_id: candidate.id,
                pipeline_id: candidate.pipeline_id,
                enqueued_at: Utc::now(),
            })
            .await?;
    }
    if !waiting.is_empty() {
        info!(
            "Queued re-check of {} candidate(s) for {}",
            waiting.len(),
            candidate_ref
        );
    }
    Ok(waiting.len())
}

/// Handles at most one request. `Ok(None)` when the queue stayed empty.
pub async fn process_next(
    queue: &dyn RecheckQueue,
    orchestrator: &PipelineOrchestrator,
    timeout: Duration,
) -> Result<Option<RunReport>, QueueError> {
    let Some(request) = queue.next(timeout).await? else {
        return Ok(None);
    };

    match orchestrator.recheck_candidate(request.candidate_id).await {
        Ok(report) => {
            match &report {
                RunReport::Skipped { reason, .. } => warn!(
                    "Re-check of candidate {} skipped: {}",
                    request.candidate_id, reason
                ),
                RunReport::Completed(stats) => info!(
                    "Re-checked candidate {}: {}",
                    request.candidate_id,
                    stats.summary_line()
                ),
            }
            Ok(Some(report))
        }
        Err(e) => {
            error!("Re-check of candidate {} failed: {}", request.candidate_id, e);
            Ok(None)
        }
    }
}

/// Consumer loop for the `serve` process. Runs until the task is aborted.
pub async fn run_consumer(queue: Arc<dyn RecheckQueue>, orchestrator: Arc<PipelineOrchestrator>) {
    info!("Re-check consumer started");
    loop {
        if let Err(e) = process_next(queue.as_ref(), &orchestrator, POLL_TIMEOUT).await {
            error!("Re-check queue error: {}", e);
            tokio::time::sleep(ERROR_BACKOFF).await;
        }
    }
}
