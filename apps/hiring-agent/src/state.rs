use std::sync::Arc;

use crate::events::RecheckQueue;
use crate::pipeline::PipelineOrchestrator;
use crate::repository::{ActionLog, PipelineRepository};
use crate::resume::ResumeIntake;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn PipelineRepository>,
    pub action_log: Arc<dyn ActionLog>,
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub recheck_queue: Arc<dyn RecheckQueue>,
    pub intake: Arc<ResumeIntake>,
    /// Request body cap for multipart resume uploads.
    pub upload_limit: usize,
}
