//! Single-flight guards for pipeline runs.
//!
//! `PipelineLocks` stops overlapping runs inside one process. `RunLock` extends that
//! across processes (the `process` scheduler command and `serve`) through a Postgres
//! advisory lock keyed by the pipeline id.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tracing::warn;
use uuid::Uuid;

use crate::repository::RepoError;

/// In-process single-flight guard: at most one run per pipeline at a time.
#[derive(Clone, Default)]
pub struct PipelineLocks {
    running: Arc<Mutex<HashSet<Uuid>>>,
}

impl PipelineLocks {
    /// `None` while another run holds the pipeline.
    pub fn try_acquire(&self, pipeline_id: Uuid) -> Option<PipelineGuard> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        running.insert(pipeline_id).then(|| PipelineGuard {
            locks: self.clone(),
            pipeline_id,
        })
    }
}

/// Releases the pipeline on drop.
pub struct PipelineGuard {
    locks: PipelineLocks,
    pipeline_id: Uuid,
}

impl Drop for PipelineGuard {
    fn drop(&mut self) {
        self.locks
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.pipeline_id);
    }
}

// ──────────────────────────────────────────────
// Cross-process
// ──────────────────────────────────────────────

/// Held for the length of one run.
#[async_trait]
pub trait RunLease: Send {
    async fn release(self: Box<Self>);
}

#[async_trait]
pub trait RunLock: Send + Sync {
    /// `Ok(None)` while another process is running the pipeline.
    async fn try_lock(&self, pipeline_id: Uuid) -> Result<Option<Box<dyn RunLease>>, RepoError>;
}

/// Session-level `pg_try_advisory_lock` on a dedicated pool connection.
pub struct PgRunLock {
    pool: PgPool,
}

impl PgRunLock {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Folds the 128-bit id into the single bigint key Postgres advisory locks take.
pub fn advisory_key(pipeline_id: Uuid) -> i64 {
    let (hi, lo) = pipeline_id.as_u64_pair();
    (hi ^ lo) as i64
}

#[async_trait]
impl RunLock for PgRunLock {
    async fn try_lock(&self, pipeline_id: Uuid) -> Result<Option<Box<dyn RunLease>>, RepoError> {
        let key = advisory_key(pipeline_id);
        let mut conn = self.pool.acquire().await?;
        let locked: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(&mut *conn)
            .await?;

        if !locked {
            return Ok(None);
        }
        Ok(Some(Box::new(PgLease {
            conn: Some(conn),
            key,
        })))
    }
}

struct PgLease {
    conn: Option<PoolConnection<Postgres>>,
    key: i64,
}

#[async_trait]
impl RunLease for PgLease {
    async fn release(mut self: Box<Self>) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        let unlocked = sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .fetch_one(&mut *conn)
            .await;
        if let Err(e) = unlocked {
            warn!("Failed to release advisory lock {}: {}", self.key, e);
            // Closing the session drops every advisory lock it holds.
            drop(conn.detach());
        }
    }
}

impl Drop for PgLease {
    fn drop(&mut self) {
        // Not released (early return or panic): never hand a locked session back to the pool.
        if let Some(conn) = self.conn.take() {
            drop(conn.detach());
        }
    }
}
