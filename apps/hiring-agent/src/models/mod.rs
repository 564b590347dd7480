pub mod action_log;
pub mod candidate;
pub mod pipeline;

pub use action_log::{ActionKind, ActionLogEntry, ActionStatus};
pub use candidate::{
    AssessmentSessionRecord, CandidateProfile, Decision, FinalDecision, PipelineCandidate,
    ScreeningResult, Stage,
};
pub use pipeline::{AutomationMode, JobProfile, Pipeline, PipelineStatus, Seniority};
