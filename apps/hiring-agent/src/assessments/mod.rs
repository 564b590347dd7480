//! Assessment subsystems as seen by the hiring pipeline.
//!
//! The pipeline never knows how an assessment scores candidates. It only needs each
//! subsystem's session contract (`AssessmentProvider`) and an injected
//! `AssessmentRegistry` mapping kinds to providers.

pub mod aggregator;
pub mod dispatcher;
pub mod sql_store;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use aggregator::{AggregatedResults, ResultAggregator};
pub use dispatcher::AssessmentDispatcher;
pub use sql_store::SqlSessionStore;

#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("Assessment database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Assessment session {0} has an unknown status '{1}'")]
    UnknownStatus(Uuid, String),
}

/// The closed set of assessment types a pipeline may dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentKind {
    Marketing,
    Product,
    Behavioral,
    UxDesign,
    Hr,
    Finance,
}

impl AssessmentKind {
    pub const ALL: [AssessmentKind; 6] = [
        AssessmentKind::Marketing,
        AssessmentKind::Product,
        AssessmentKind::Behavioral,
        AssessmentKind::UxDesign,
        AssessmentKind::Hr,
        AssessmentKind::Finance,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            AssessmentKind::Marketing => "marketing",
            AssessmentKind::Product => "product",
            AssessmentKind::Behavioral => "behavioral",
            AssessmentKind::UxDesign => "ux_design",
            AssessmentKind::Hr => "hr",
            AssessmentKind::Finance => "finance",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AssessmentKind::Marketing => "Digital Marketing Assessment",
            AssessmentKind::Product => "Product Management Assessment",
            AssessmentKind::Behavioral => "Behavioral Assessment",
            AssessmentKind::UxDesign => "UX Design Assessment",
            AssessmentKind::Hr => "HR Assessment",
            AssessmentKind::Finance => "Finance Assessment",
        }
    }

    /// Candidate-facing path segment for the session start link.
    pub fn route_slug(&self) -> &'static str {
        match self {
            AssessmentKind::Marketing => "marketing",
            AssessmentKind::Product => "pm",
            AssessmentKind::Behavioral => "behavioral",
            AssessmentKind::UxDesign => "ux",
            AssessmentKind::Hr => "hr",
            AssessmentKind::Finance => "finance",
        }
    }

    /// "ux_design" → "Ux Design", as shown to the decision model.
    pub fn display_name(&self) -> String {
        self.code()
            .split('_')
            .map(|w| {
                let mut c = w.chars();
                match c.next() {
                    None => String::new(),
                    Some(f) => f.to_uppercase().to_string() + c.as_str(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromStr for AssessmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssessmentKind::ALL
            .into_iter()
            .find(|kind| kind.code() == s)
            .ok_or_else(|| format!("unknown assessment type '{s}'"))
    }
}

/// Difficulty band a question set is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentLevel {
    Junior,
    Mid,
    Senior,
}

impl AssessmentLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentLevel::Junior => "junior",
            AssessmentLevel::Mid => "mid",
            AssessmentLevel::Senior => "senior",
        }
    }
}

/// draft → in_progress (ready to start) → submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Draft,
    InProgress,
    Submitted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Draft => "draft",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Submitted => "submitted",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(SessionStatus::Draft),
            "in_progress" => Ok(SessionStatus::InProgress),
            "submitted" => Ok(SessionStatus::Submitted),
            other => Err(format!("unknown session status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentSession {
    pub id: Uuid,
    pub kind: AssessmentKind,
    pub candidate_ref: String,
    pub employer_id: Uuid,
    pub status: SessionStatus,
    pub level: Option<AssessmentLevel>,
}

/// Status and score as reported by the owning subsystem on a poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub score: Option<f64>,
}

/// Session contract every assessment subsystem exposes to the pipeline.
#[async_trait]
pub trait AssessmentProvider: Send + Sync {
    /// Idempotent on (candidate_ref, employer_id). The flag is true only when a new
    /// session row was created by this call.
    async fn create_or_get_session(
        &self,
        candidate_ref: &str,
        employer_id: Uuid,
    ) -> Result<(AssessmentSession, bool), AssessmentError>;

    /// Assigns the question level and marks the session ready to start.
    async fn configure_session(
        &self,
        session: &AssessmentSession,
        level: AssessmentLevel,
    ) -> Result<(), AssessmentError>;

    /// `None` when the session no longer exists.
    async fn get_status_and_score(
        &self,
        session_id: Uuid,
    ) -> Result<Option<SessionSnapshot>, AssessmentError>;
}

/// Injected lookup from assessment kind to the subsystem that owns it.
#[derive(Clone, Default)]
pub struct AssessmentRegistry {
    providers: HashMap<AssessmentKind, Arc<dyn AssessmentProvider>>,
}

impl AssessmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a Postgres session store for every known kind.
    pub fn postgres(pool: &sqlx::PgPool) -> Self {
        AssessmentKind::ALL
            .into_iter()
            .fold(Self::new(), |registry, kind| {
                registry.with(kind, Arc::new(SqlSessionStore::for_kind(pool.clone(), kind)))
            })
    }

    pub fn with(mut self, kind: AssessmentKind, provider: Arc<dyn AssessmentProvider>) -> Self {
        self.providers.insert(kind, provider);
        self
    }

    pub fn get(&self, kind: AssessmentKind) -> Option<&Arc<dyn AssessmentProvider>> {
        self.providers.get(&kind)
    }
}
