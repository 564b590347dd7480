use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assessments::{AssessmentKind, SessionStatus};

/// A candidate's position in the hiring state machine.
///
/// Screening is implicit: `uploaded` moves straight to `shortlisted` or
/// `rejected_at_screen` once the screener returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Uploaded,
    Shortlisted,
    RejectedAtScreen,
    AssessmentPending,
    AssessmentSent,
    AssessmentCompleted,
    DecisionMade,
    Hired,
    Rejected,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Uploaded,
        Stage::Shortlisted,
        Stage::RejectedAtScreen,
        Stage::AssessmentPending,
        Stage::AssessmentSent,
        Stage::AssessmentCompleted,
        Stage::DecisionMade,
        Stage::Hired,
        Stage::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Uploaded => "uploaded",
            Stage::Shortlisted => "shortlisted",
            Stage::RejectedAtScreen => "rejected_at_screen",
            Stage::AssessmentPending => "assessment_pending",
            Stage::AssessmentSent => "assessment_sent",
            Stage::AssessmentCompleted => "assessment_completed",
            Stage::DecisionMade => "decision_made",
            Stage::Hired => "hired",
            Stage::Rejected => "rejected",
        }
    }

    /// Terminal stages are never touched by the orchestrator again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::RejectedAtScreen | Stage::Hired | Stage::Rejected)
    }

    /// Position along the forward path. Branches that end the same step share a rank.
    pub fn rank(&self) -> u8 {
        match self {
            Stage::Uploaded => 0,
            Stage::Shortlisted | Stage::RejectedAtScreen => 1,
            Stage::AssessmentPending => 2,
            Stage::AssessmentSent => 3,
            Stage::AssessmentCompleted => 4,
            Stage::DecisionMade => 5,
            Stage::Hired | Stage::Rejected => 6,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("unknown stage '{s}'"))
    }
}

/// advance / hold / reject. Shared by human reviewers and both AI calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Advance,
    Hold,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Advance => "advance",
            Decision::Hold => "hold",
            Decision::Reject => "reject",
        }
    }

    /// Lenient parse for model output. Anything unrecognised is a hold.
    pub fn from_ai(value: &str) -> Decision {
        value.trim().to_lowercase().parse().unwrap_or(Decision::Hold)
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "advance" => Ok(Decision::Advance),
            "hold" => Ok(Decision::Hold),
            "reject" => Ok(Decision::Reject),
            other => Err(format!("unknown decision '{other}'")),
        }
    }
}

/// The person behind a pipeline entry. `email` is the external identifier
/// assessment sessions are keyed by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl CandidateProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Output of the resume screen, persisted on the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub score: u32,
    pub summary: String,
    pub skills_matched: Vec<String>,
    pub skills_missing: Vec<String>,
    pub experience_years: Option<f32>,
    pub recommendation: Decision,
}

/// Output of the final AI decision, persisted on the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDecision {
    pub score: u32,
    pub recommendation: Decision,
    pub summary: String,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
}

/// One assessment session tracked against a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSessionRecord {
    #[serde(rename = "type")]
    pub kind: AssessmentKind,
    pub session_id: Uuid,
    pub score: Option<f64>,
    pub status: SessionStatus,
    #[serde(default)]
    pub invite_sent: bool,
}

/// One candidate's progress within one pipeline. Unique per (pipeline, candidate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineCandidate {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub candidate: CandidateProfile,
    pub resume_key: Option<String>,
    pub resume_text: String,
    pub stage: Stage,
    pub screening: Option<ScreeningResult>,
    pub final_decision: Option<FinalDecision>,
    pub human_decision: Option<Decision>,
    pub human_notes: String,
    pub assessment_sessions: Vec<AssessmentSessionRecord>,
    pub processed_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineCandidate {
    pub fn ai_recommendation(&self) -> Option<Decision> {
        self.final_decision.as_ref().map(|d| d.recommendation)
    }
}
