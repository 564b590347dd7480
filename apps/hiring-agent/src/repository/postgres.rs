use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::models::{
    ActionLogEntry, AssessmentSessionRecord, CandidateProfile, Decision, FinalDecision,
    JobProfile, Pipeline, PipelineCandidate, PipelineStatus, ScreeningResult,
};

use super::{ActionLog, PipelineRepository, RepoError, ResumeUpload};

const CANDIDATE_SELECT: &str = r#"
    SELECT pc.id, pc.pipeline_id, c.id AS profile_id, c.email, c.first_name, c.last_name,
           pc.resume_key, pc.resume_text, pc.stage, pc.screening, pc.final_decision,
           pc.human_decision, pc.human_notes, pc.assessment_sessions,
           pc.processed_at, pc.decided_at, pc.created_at, pc.updated_at
    FROM pipeline_candidates pc
    JOIN candidates c ON c.id = pc.candidate_id
"#;

#[derive(Debug, FromRow)]
struct PipelineRow {
    id: Uuid,
    employer_id: Uuid,
    employer_name: String,
    title: String,
    job_description: String,
    required_skills: Vec<String>,
    preferred_skills: Vec<String>,
    experience_range: String,
    seniority: String,
    assessment_types: Vec<String>,
    automation_mode: String,
    screening_threshold: i32,
    passing_score: i32,
    max_candidates: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PipelineRow> for Pipeline {
    type Error = RepoError;

    fn try_from(row: PipelineRow) -> Result<Self, Self::Error> {
        Ok(Pipeline {
            id: row.id,
            employer_id: row.employer_id,
            employer_name: row.employer_name,
            job: JobProfile {
                title: row.title,
                description: row.job_description,
                required_skills: row.required_skills,
                preferred_skills: row.preferred_skills,
                seniority: row.seniority.parse().map_err(RepoError::Decode)?,
                experience_range: row.experience_range,
            },
            assessment_types: row.assessment_types,
            automation_mode: row.automation_mode.parse().map_err(RepoError::Decode)?,
            screening_threshold: row.screening_threshold.clamp(0, 100) as u32,
            passing_score: row.passing_score.clamp(0, 100) as u32,
            max_candidates: row.max_candidates.max(0) as u32,
            status: row.status.parse().map_err(RepoError::Decode)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CandidateRow {
    id: Uuid,
    pipeline_id: Uuid,
    profile_id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    resume_key: Option<String>,
    resume_text: String,
    stage: String,
    screening: Option<Json<ScreeningResult>>,
    final_decision: Option<Json<FinalDecision>>,
    human_decision: Option<String>,
    human_notes: String,
    assessment_sessions: Json<Vec<AssessmentSessionRecord>>,
    processed_at: Option<DateTime<Utc>>,
    decided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CandidateRow> for PipelineCandidate {
    type Error = RepoError;

    fn try_from(row: CandidateRow) -> Result<Self, Self::Error> {
        let human_decision = match row.human_decision.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<Decision>().map_err(RepoError::Decode)?),
        };
        Ok(PipelineCandidate {
            id: row.id,
            pipeline_id: row.pipeline_id,
            candidate: CandidateProfile {
                id: row.profile_id,
                email: row.email,
                first_name: row.first_name,
                last_name: row.last_name,
            },
            resume_key: row.resume_key,
            resume_text: row.resume_text,
            stage: row.stage.parse().map_err(RepoError::Decode)?,
            screening: row.screening.map(|j| j.0),
            final_decision: row.final_decision.map(|j| j.0),
            human_decision,
            human_notes: row.human_notes,
            assessment_sessions: row.assessment_sessions.0,
            processed_at: row.processed_at,
            decided_at: row.decided_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ActionLogRow {
    id: Uuid,
    pipeline_id: Uuid,
    candidate_id: Option<Uuid>,
    action: String,
    input_data: Value,
    output_data: Value,
    ai_model: String,
    tokens_used: i32,
    duration_ms: i64,
    status: String,
    error_message: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActionLogRow> for ActionLogEntry {
    type Error = RepoError;

    fn try_from(row: ActionLogRow) -> Result<Self, Self::Error> {
        Ok(ActionLogEntry {
            id: row.id,
            pipeline_id: row.pipeline_id,
            candidate_id: row.candidate_id,
            action: row.action.parse().map_err(RepoError::Decode)?,
            input: row.input_data,
            output: row.output_data,
            model: row.ai_model,
            tokens_used: row.tokens_used.max(0) as u32,
            duration_ms: row.duration_ms.max(0) as u64,
            status: row.status.parse().map_err(RepoError::Decode)?,
            error_message: row.error_message,
            created_at: row.created_at,
        })
    }
}

/// sqlx-backed implementation of both persistence traits.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn convert_candidates(rows: Vec<CandidateRow>) -> Result<Vec<PipelineCandidate>, RepoError> {
        rows.into_iter().map(PipelineCandidate::try_from).collect()
    }
}

#[async_trait]
impl PipelineRepository for PgRepository {
    async fn list_pipelines(
        &self,
        status: Option<PipelineStatus>,
    ) -> Result<Vec<Pipeline>, RepoError> {
        let rows = sqlx::query_as::<_, PipelineRow>(
            r#"
            SELECT * FROM hiring_pipelines
            WHERE $1::text IS NULL OR status = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Pipeline::try_from).collect()
    }

    async fn get_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>, RepoError> {
        sqlx::query_as::<_, PipelineRow>("SELECT * FROM hiring_pipelines WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Pipeline::try_from)
            .transpose()
    }

    async fn set_pipeline_status(
        &self,
        id: Uuid,
        status: PipelineStatus,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE hiring_pipelines SET status = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound(format!("Pipeline {id}")));
        }
        info!("Pipeline {id} is now {status}");
        Ok(())
    }

    async fn list_candidates(
        &self,
        pipeline_id: Uuid,
    ) -> Result<Vec<PipelineCandidate>, RepoError> {
        let rows = sqlx::query_as::<_, CandidateRow>(&format!(
            "{CANDIDATE_SELECT} WHERE pc.pipeline_id = $1 ORDER BY pc.created_at ASC"
        ))
        .bind(pipeline_id)
        .fetch_all(&self.pool)
        .await?;

        Self::convert_candidates(rows)
    }

    async fn load_candidate(&self, id: Uuid) -> Result<Option<PipelineCandidate>, RepoError> {
        sqlx::query_as::<_, CandidateRow>(&format!("{CANDIDATE_SELECT} WHERE pc.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(PipelineCandidate::try_from)
            .transpose()
    }

    async fn save_candidate(&self, candidate: &PipelineCandidate) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE pipeline_candidates
            SET stage = $2, screening = $3, final_decision = $4, assessment_sessions = $5,
                processed_at = $6, decided_at = $7, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(candidate.id)
        .bind(candidate.stage.as_str())
        .bind(candidate.screening.as_ref().map(Json))
        .bind(candidate.final_decision.as_ref().map(Json))
        .bind(Json(&candidate.assessment_sessions))
        .bind(candidate.processed_at)
        .bind(candidate.decided_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound(format!("Candidate {}", candidate.id)));
        }
        Ok(())
    }

    async fn upsert_resume(
        &self,
        pipeline_id: Uuid,
        upload: ResumeUpload,
    ) -> Result<(PipelineCandidate, bool), RepoError> {
        let mut tx = self.pool.begin().await?;

        // Existing profiles keep their names; the no-op update makes RETURNING yield the row.
        let profile_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO candidates (id, email, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&upload.email)
        .bind(&upload.first_name)
        .bind(&upload.last_name)
        .fetch_one(&mut *tx)
        .await?;

        let (entry_id, created): (Uuid, bool) = sqlx::query_as(
            r#"
            INSERT INTO pipeline_candidates (id, pipeline_id, candidate_id, resume_key, resume_text, stage)
            VALUES ($1, $2, $3, $4, $5, 'uploaded')
            ON CONFLICT (pipeline_id, candidate_id) DO UPDATE
            SET resume_key = EXCLUDED.resume_key,
                resume_text = EXCLUDED.resume_text,
                stage = 'uploaded',
                human_decision = NULL,
                human_notes = '',
                updated_at = now()
            RETURNING id, (xmax = 0) AS created
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(pipeline_id)
        .bind(profile_id)
        .bind(&upload.resume_key)
        .bind(&upload.resume_text)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let candidate = self
            .load_candidate(entry_id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Candidate {entry_id}")))?;
        Ok((candidate, created))
    }

    async fn set_human_decision(
        &self,
        candidate_id: Uuid,
        decision: Option<Decision>,
        notes: &str,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE pipeline_candidates
            SET human_decision = $2, human_notes = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(candidate_id)
        .bind(decision.map(|d| d.as_str()))
        .bind(notes)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound(format!("Candidate {candidate_id}")));
        }
        Ok(())
    }

    async fn find_awaiting_results(
        &self,
        email: &str,
    ) -> Result<Vec<PipelineCandidate>, RepoError> {
        let rows = sqlx::query_as::<_, CandidateRow>(&format!(
            r#"{CANDIDATE_SELECT}
            JOIN hiring_pipelines p ON p.id = pc.pipeline_id
            WHERE lower(c.email) = lower($1)
              AND pc.stage = 'assessment_sent'
              AND p.status = 'active'"#
        ))
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        Self::convert_candidates(rows)
    }
}

#[async_trait]
impl ActionLog for PgRepository {
    async fn append(&self, entry: ActionLogEntry) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO agent_action_logs
                (id, pipeline_id, candidate_id, action, input_data, output_data,
                 ai_model, tokens_used, duration_ms, status, error_message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(entry.id)
        .bind(entry.pipeline_id)
        .bind(entry.candidate_id)
        .bind(entry.action.as_str())
        .bind(&entry.input)
        .bind(&entry.output)
        .bind(&entry.model)
        .bind(i32::try_from(entry.tokens_used).unwrap_or(i32::MAX))
        .bind(i64::try_from(entry.duration_ms).unwrap_or(i64::MAX))
        .bind(entry.status.as_str())
        .bind(&entry.error_message)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn for_candidate(
        &self,
        candidate_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ActionLogEntry>, RepoError> {
        let rows = sqlx::query_as::<_, ActionLogRow>(
            r#"
            SELECT * FROM agent_action_logs
            WHERE candidate_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(candidate_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ActionLogEntry::try_from).collect()
    }
}
