//! Persistence seams. The orchestrator only ever sees these traits.
//!
//! Two writers share a candidate row: the orchestrator (stage, AI outputs, sessions)
//! and human review (decision, notes). `save_candidate` never writes the review fields,
//! so neither writer can clobber the other.

pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ActionLogEntry, Decision, Pipeline, PipelineCandidate, PipelineStatus};

pub use postgres::PgRepository;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row: {0}")]
    Decode(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// A freshly extracted resume to attach to a pipeline.
#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub resume_key: String,
    pub resume_text: String,
}

#[async_trait]
pub trait PipelineRepository: Send + Sync {
    async fn list_pipelines(
        &self,
        status: Option<PipelineStatus>,
    ) -> Result<Vec<Pipeline>, RepoError>;

    async fn get_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>, RepoError>;

    async fn set_pipeline_status(&self, id: Uuid, status: PipelineStatus)
        -> Result<(), RepoError>;

    async fn list_candidates(&self, pipeline_id: Uuid)
        -> Result<Vec<PipelineCandidate>, RepoError>;

    async fn load_candidate(&self, id: Uuid) -> Result<Option<PipelineCandidate>, RepoError>;

    /// Persists the orchestrator-owned fields of a candidate.
    async fn save_candidate(&self, candidate: &PipelineCandidate) -> Result<(), RepoError>;

    /// Creates the (pipeline, candidate) entry, or replaces its resume and resets it to
    /// `uploaded` with the human decision cleared. Returns the entry and whether it was new.
    async fn upsert_resume(
        &self,
        pipeline_id: Uuid,
        upload: ResumeUpload,
    ) -> Result<(PipelineCandidate, bool), RepoError>;

    /// Review write path. `None` clears the decision.
    async fn set_human_decision(
        &self,
        candidate_id: Uuid,
        decision: Option<Decision>,
        notes: &str,
    ) -> Result<(), RepoError>;

    /// Candidates with this email parked at `assessment_sent` in an active pipeline.
    async fn find_awaiting_results(&self, email: &str)
        -> Result<Vec<PipelineCandidate>, RepoError>;
}

/// Append-only audit trail of AI calls and dispatch events.
#[async_trait]
pub trait ActionLog: Send + Sync {
    async fn append(&self, entry: ActionLogEntry) -> Result<(), RepoError>;

    /// Newest first.
    async fn for_candidate(
        &self,
        candidate_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ActionLogEntry>, RepoError>;
}
