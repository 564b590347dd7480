use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assessments::AssessmentLevel;

/// How much human approval a pipeline requires before it advances a candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationMode {
    /// Human approves every gate.
    #[default]
    Recommend,
    /// Screening and assessment dispatch are automatic; a human makes the final call.
    SemiAuto,
    /// The AI recommendation is authoritative at every gate.
    FullAuto,
}

impl AutomationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutomationMode::Recommend => "recommend",
            AutomationMode::SemiAuto => "semi_auto",
            AutomationMode::FullAuto => "full_auto",
        }
    }

    /// Whether shortlisted candidates move to assessment without a human approval.
    pub fn auto_dispatches(&self) -> bool {
        matches!(self, AutomationMode::SemiAuto | AutomationMode::FullAuto)
    }
}

impl FromStr for AutomationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recommend" => Ok(AutomationMode::Recommend),
            "semi_auto" => Ok(AutomationMode::SemiAuto),
            "full_auto" => Ok(AutomationMode::FullAuto),
            other => Err(format!("unknown automation mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Completed,
    Archived,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Draft => "draft",
            PipelineStatus::Active => "active",
            PipelineStatus::Paused => "paused",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PipelineStatus::Draft),
            "active" => Ok(PipelineStatus::Active),
            "paused" => Ok(PipelineStatus::Paused),
            "completed" => Ok(PipelineStatus::Completed),
            "archived" => Ok(PipelineStatus::Archived),
            other => Err(format!("unknown pipeline status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
    Junior,
    #[default]
    Mid,
    Senior,
    Lead,
    Executive,
}

impl Seniority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Seniority::Junior => "junior",
            Seniority::Mid => "mid",
            Seniority::Senior => "senior",
            Seniority::Lead => "lead",
            Seniority::Executive => "executive",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Seniority::Junior => "Junior",
            Seniority::Mid => "Mid-Level",
            Seniority::Senior => "Senior",
            Seniority::Lead => "Lead",
            Seniority::Executive => "Executive",
        }
    }

    /// Assessment banks only exist for three levels; everything above senior shares it.
    pub fn assessment_level(&self) -> AssessmentLevel {
        match self {
            Seniority::Junior => AssessmentLevel::Junior,
            Seniority::Mid => AssessmentLevel::Mid,
            Seniority::Senior | Seniority::Lead | Seniority::Executive => AssessmentLevel::Senior,
        }
    }
}

impl FromStr for Seniority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "junior" => Ok(Seniority::Junior),
            "mid" => Ok(Seniority::Mid),
            "senior" => Ok(Seniority::Senior),
            "lead" => Ok(Seniority::Lead),
            "executive" => Ok(Seniority::Executive),
            other => Err(format!("unknown seniority '{other}'")),
        }
    }
}

/// The requisition a pipeline screens against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobProfile {
    pub title: String,
    pub description: String,
    pub required_skills: Vec<String>,
    pub preferred_skills: Vec<String>,
    pub seniority: Seniority,
    pub experience_range: String,
}

/// One open requisition being run through automation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Uuid,
    pub employer_id: Uuid,
    pub employer_name: String,
    pub job: JobProfile,
    /// Assessment type codes as configured. Codes are validated at dispatch time.
    pub assessment_types: Vec<String>,
    pub automation_mode: AutomationMode,
    pub screening_threshold: u32, // 0 – 100
    pub passing_score: u32,       // 0 – 100
    pub max_candidates: u32,
    pub status: PipelineStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pipeline {
    pub fn is_active(&self) -> bool {
        self.status == PipelineStatus::Active
    }
}
