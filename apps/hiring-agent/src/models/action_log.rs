use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Stored error messages are capped so one runaway response cannot bloat the log.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ResumeScreen,
    AssessmentSelect,
    AssessmentSend,
    ScoreCheck,
    FinalDecision,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::ResumeScreen => "resume_screen",
            ActionKind::AssessmentSelect => "assessment_select",
            ActionKind::AssessmentSend => "assessment_send",
            ActionKind::ScoreCheck => "score_check",
            ActionKind::FinalDecision => "final_decision",
        }
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resume_screen" => Ok(ActionKind::ResumeScreen),
            "assessment_select" => Ok(ActionKind::AssessmentSelect),
            "assessment_send" => Ok(ActionKind::AssessmentSend),
            "score_check" => Ok(ActionKind::ScoreCheck),
            "final_decision" => Ok(ActionKind::FinalDecision),
            other => Err(format!("unknown action kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Error,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Success => "success",
            ActionStatus::Error => "error",
        }
    }
}

impl FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ActionStatus::Success),
            "error" => Ok(ActionStatus::Error),
            other => Err(format!("unknown action status '{other}'")),
        }
    }
}

/// One AI invocation or dispatch event. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub candidate_id: Option<Uuid>,
    pub action: ActionKind,
    pub input: Value,
    pub output: Value,
    pub model: String,
    pub tokens_used: u32,
    pub duration_ms: u64,
    pub status: ActionStatus,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
}

impl ActionLogEntry {
    pub fn success(pipeline_id: Uuid, candidate_id: Option<Uuid>, action: ActionKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline_id,
            candidate_id,
            action,
            input: Value::Object(Default::default()),
            output: Value::Object(Default::default()),
            model: String::new(),
            tokens_used: 0,
            duration_ms: 0,
            status: ActionStatus::Success,
            error_message: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn failure(
        pipeline_id: Uuid,
        candidate_id: Option<Uuid>,
        action: ActionKind,
        error: &dyn std::fmt::Display,
    ) -> Self {
        let message: String = error.to_string().chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
        Self {
            status: ActionStatus::Error,
            error_message: message,
            ..Self::success(pipeline_id, candidate_id, action)
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = output;
        self
    }

    pub fn with_usage(mut self, model: &str, tokens_used: u32, duration_ms: u64) -> Self {
        self.model = model.to_string();
        self.tokens_used = tokens_used;
        self.duration_ms = duration_ms;
        self
    }
}
