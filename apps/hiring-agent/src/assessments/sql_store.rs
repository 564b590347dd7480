//! Postgres session store shared by all assessment kinds.
//!
//! Each subsystem owns its own session table; they differ only in the table name and
//! in which column carries the final score.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use super::{
    AssessmentError, AssessmentKind, AssessmentLevel, AssessmentProvider, AssessmentSession,
    SessionSnapshot, SessionStatus,
};

/// Where a kind's sessions live and which column holds the score.
pub fn session_table(kind: AssessmentKind) -> (&'static str, &'static str) {
    match kind {
        AssessmentKind::Marketing => ("marketing_assessment_sessions", "overall_score"),
        AssessmentKind::Product => ("product_assessment_sessions", "overall_score"),
        AssessmentKind::Behavioral => ("behavioral_assessment_sessions", "eligibility_score"),
        AssessmentKind::UxDesign => ("ux_assessment_sessions", "overall_score"),
        AssessmentKind::Hr => ("hr_assessment_sessions", "overall_score"),
        AssessmentKind::Finance => ("finance_assessment_sessions", "overall_score"),
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: Uuid,
    status: String,
    level: Option<String>,
}

#[derive(Debug, FromRow)]
struct ScoreRow {
    status: String,
    score: Option<f64>,
}

pub struct SqlSessionStore {
    pool: PgPool,
    kind: AssessmentKind,
    table: &'static str,
    score_column: &'static str,
}

impl SqlSessionStore {
    pub fn for_kind(pool: PgPool, kind: AssessmentKind) -> Self {
        let (table, score_column) = session_table(kind);
        Self {
            pool,
            kind,
            table,
            score_column,
        }
    }

    fn to_session(
        &self,
        row: SessionRow,
        candidate_ref: &str,
        employer_id: Uuid,
    ) -> Result<AssessmentSession, AssessmentError> {
        let status = parse_status(row.id, &row.status)?;
        let level = row.level.as_deref().and_then(|l| match l {
            "junior" => Some(AssessmentLevel::Junior),
            "mid" => Some(AssessmentLevel::Mid),
            "senior" => Some(AssessmentLevel::Senior),
            _ => None,
        });
        Ok(AssessmentSession {
            id: row.id,
            kind: self.kind,
            candidate_ref: candidate_ref.to_string(),
            employer_id,
            status,
            level,
        })
    }
}

fn parse_status(id: Uuid, raw: &str) -> Result<SessionStatus, AssessmentError> {
    raw.parse()
        .map_err(|_| AssessmentError::UnknownStatus(id, raw.to_string()))
}

#[async_trait]
impl AssessmentProvider for SqlSessionStore {
    async fn create_or_get_session(
        &self,
        candidate_ref: &str,
        employer_id: Uuid,
    ) -> Result<(AssessmentSession, bool), AssessmentError> {
        // ON CONFLICT keeps creation idempotent even if two dispatches race.
        let inserted: Option<SessionRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO {} (id, candidate_ref, employer_id, status)
            VALUES ($1, $2, $3, 'draft')
            ON CONFLICT (candidate_ref, employer_id) DO NOTHING
            RETURNING id, status, level
            "#,
            self.table
        ))
        .bind(Uuid::new_v4())
        .bind(candidate_ref)
        .bind(employer_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            info!(
                "Created {} session {} for {}",
                self.kind.code(),
                row.id,
                candidate_ref
            );
            return Ok((self.to_session(row, candidate_ref, employer_id)?, true));
        }

        let existing: SessionRow = sqlx::query_as(&format!(
            "SELECT id, status, level FROM {} WHERE candidate_ref = $1 AND employer_id = $2",
            self.table
        ))
        .bind(candidate_ref)
        .bind(employer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((self.to_session(existing, candidate_ref, employer_id)?, false))
    }

    async fn configure_session(
        &self,
        session: &AssessmentSession,
        level: AssessmentLevel,
    ) -> Result<(), AssessmentError> {
        // Question generation for `level` belongs to the subsystem; it reads the level
        // when the candidate opens the session.
        sqlx::query(&format!(
            r#"
            UPDATE {}
            SET level = $2, status = 'in_progress', updated_at = now()
            WHERE id = $1 AND status = 'draft'
            "#,
            self.table
        ))
        .bind(session.id)
        .bind(level.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_status_and_score(
        &self,
        session_id: Uuid,
    ) -> Result<Option<SessionSnapshot>, AssessmentError> {
        let row: Option<ScoreRow> = sqlx::query_as(&format!(
            "SELECT status, {}::float8 AS score FROM {} WHERE id = $1",
            self.score_column, self.table
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(SessionSnapshot {
                status: parse_status(session_id, &row.status)?,
                score: row.score,
            })
        })
        .transpose()
    }
}
