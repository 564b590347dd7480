use std::collections::BTreeMap;

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::enqueue_rechecks;
use crate::models::{ActionLogEntry, Decision, Pipeline, PipelineCandidate, PipelineStatus, Stage};
use crate::resume::{IntakeReport, ResumeFile};
use crate::state::AppState;

use super::RunReport;

const RECENT_ACTIONS: usize = 20;
const SUBMITTED: &str = "submitted";

#[derive(Deserialize)]
pub struct StatusRequest {
    pub action: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub id: Uuid,
    pub status: PipelineStatus,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub total: usize,
    pub stages: BTreeMap<&'static str, usize>,
    pub status: PipelineStatus,
}

#[derive(Serialize)]
pub struct CandidateDetailResponse {
    pub candidate: PipelineCandidate,
    pub actions: Vec<ActionLogEntry>,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub decision: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Serialize)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub human_decision: Decision,
    pub human_notes: String,
}

#[derive(Deserialize)]
pub struct AssessmentEventRequest {
    pub candidate_ref: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct AssessmentEventResponse {
    pub queued: usize,
}

async fn load_pipeline(state: &AppState, id: Uuid) -> Result<Pipeline, AppError> {
    state
        .repo
        .get_pipeline(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Pipeline {id}")))
}

/// Loads a candidate only if it belongs to the given pipeline.
async fn load_candidate(
    state: &AppState,
    pipeline_id: Uuid,
    candidate_id: Uuid,
) -> Result<PipelineCandidate, AppError> {
    state
        .repo
        .load_candidate(candidate_id)
        .await?
        .filter(|c| c.pipeline_id == pipeline_id)
        .ok_or_else(|| AppError::NotFound(format!("Candidate {candidate_id}")))
}

/// POST /api/v1/pipelines/:id/process
/// Manual trigger. A draft pipeline is activated first.
pub async fn handle_process(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunReport>, AppError> {
    let mut pipeline = load_pipeline(&state, id).await?;
    if pipeline.status == PipelineStatus::Draft {
        state
            .repo
            .set_pipeline_status(id, PipelineStatus::Active)
            .await?;
        pipeline.status = PipelineStatus::Active;
        info!("Pipeline {} activated by manual trigger", id);
    }

    let report = state.orchestrator.process_pipeline(&pipeline).await?;
    Ok(Json(report))
}

/// POST /api/v1/pipelines/:id/status
pub async fn handle_set_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let pipeline = load_pipeline(&state, id).await?;

    let next = match (req.action.as_str(), pipeline.status) {
        ("activate", PipelineStatus::Draft | PipelineStatus::Paused | PipelineStatus::Active) => {
            PipelineStatus::Active
        }
        ("pause", PipelineStatus::Active | PipelineStatus::Paused) => PipelineStatus::Paused,
        ("activate" | "pause", current) => {
            return Err(AppError::Conflict(format!(
                "Cannot {} a {} pipeline",
                req.action, current
            )))
        }
        (other, _) => {
            return Err(AppError::Validation(format!(
                "Unknown action '{other}', expected 'activate' or 'pause'"
            )))
        }
    };

    if next != pipeline.status {
        state.repo.set_pipeline_status(id, next).await?;
        info!("Pipeline {} status {} -> {}", id, pipeline.status, next);
    }
    Ok(Json(StatusResponse { id, status: next }))
}

/// GET /api/v1/pipelines/:id/stats
pub async fn handle_stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatsResponse>, AppError> {
    let pipeline = load_pipeline(&state, id).await?;
    let candidates = state.repo.list_candidates(id).await?;

    let mut stages: BTreeMap<&'static str, usize> =
        Stage::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    for candidate in &candidates {
        *stages.entry(candidate.stage.as_str()).or_default() += 1;
    }

    Ok(Json(StatsResponse {
        total: candidates.len(),
        stages,
        status: pipeline.status,
    }))
}

/// GET /api/v1/pipelines/:id/candidates/:cid
pub async fn handle_get_candidate(
    State(state): State<AppState>,
    Path((id, candidate_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CandidateDetailResponse>, AppError> {
    let candidate = load_candidate(&state, id, candidate_id).await?;
    let actions = state
        .action_log
        .for_candidate(candidate_id, RECENT_ACTIONS)
        .await?;
    Ok(Json(CandidateDetailResponse { candidate, actions }))
}

/// POST /api/v1/pipelines/:id/candidates/:cid/review
pub async fn handle_review(
    State(state): State<AppState>,
    Path((id, candidate_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<ReviewResponse>, AppError> {
    let decision: Decision = req
        .decision
        .trim()
        .to_lowercase()
        .parse()
        .map_err(AppError::Validation)?;
    let candidate = load_candidate(&state, id, candidate_id).await?;
    if candidate.stage.is_terminal() {
        return Err(AppError::Conflict(format!(
            "Candidate {} is already {}",
            candidate_id, candidate.stage
        )));
    }

    let notes = req.notes.trim().to_string();
    state
        .repo
        .set_human_decision(candidate_id, Some(decision), &notes)
        .await?;
    info!(
        "Review recorded for candidate {}: {}",
        candidate_id,
        decision.as_str()
    );

    Ok(Json(ReviewResponse {
        id: candidate_id,
        human_decision: decision,
        human_notes: notes,
    }))
}

/// POST /api/v1/pipelines/:id/resumes
/// Multipart body; every part named `resumes` is one file.
pub async fn handle_upload_resumes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<IntakeReport>, AppError> {
    load_pipeline(&state, id).await?;

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("resumes") {
            continue;
        }
        let filename = field.file_name().unwrap_or("resume").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read {filename}: {e}")))?;
        files.push(ResumeFile { filename, bytes });
    }

    if files.is_empty() {
        return Err(AppError::Validation(
            "No files found in the 'resumes' field".to_string(),
        ));
    }

    Ok(Json(state.intake.ingest_all(id, files).await))
}

/// POST /api/v1/assessments/events
/// Only `submitted` events queue re-checks; anything else is acknowledged and ignored.
pub async fn handle_assessment_event(
    State(state): State<AppState>,
    Json(req): Json<AssessmentEventRequest>,
) -> Result<Json<AssessmentEventResponse>, AppError> {
    let candidate_ref = req.candidate_ref.trim();
    if candidate_ref.is_empty() {
        return Err(AppError::Validation("candidate_ref is required".to_string()));
    }
    if req.status != SUBMITTED {
        return Ok(Json(AssessmentEventResponse { queued: 0 }));
    }

    let queued = enqueue_rechecks(
        state.repo.as_ref(),
        state.recheck_queue.as_ref(),
        candidate_ref,
    )
    .await?;
    Ok(Json(AssessmentEventResponse { queued }))
}
