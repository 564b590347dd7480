//! The candidate transition table as a pure function.
//!
//! `plan` answers "what happens next for a candidate in this stage under this policy".
//! The orchestrator performs the step, persists, and asks again until nothing applies
//! or the stage stops moving.

use crate::models::{AutomationMode, Decision, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// uploaded → shortlisted | rejected_at_screen
    Screen,
    /// shortlisted → assessment_pending
    MarkReady,
    /// assessment_pending → assessment_sent
    Dispatch,
    /// assessment_sent → assessment_completed, or stay
    CheckResults,
    /// assessment_completed → decision_made
    Decide,
    /// decision_made → hired | rejected
    Finalize(Stage),
    /// decision_made resolved to hold: stamp `decided_at` once and stay
    Hold,
}

/// Everything the transition table reads from a candidate and its pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Gate {
    pub stage: Stage,
    pub mode: AutomationMode,
    pub human_decision: Option<Decision>,
    pub ai_recommendation: Option<Decision>,
    pub decided: bool,
}

pub fn plan(gate: Gate) -> Option<Step> {
    match gate.stage {
        Stage::Uploaded => Some(Step::Screen),
        Stage::Shortlisted => {
            let approved = gate.human_decision == Some(Decision::Advance);
            (gate.mode.auto_dispatches() || approved).then_some(Step::MarkReady)
        }
        Stage::AssessmentPending => Some(Step::Dispatch),
        Stage::AssessmentSent => Some(Step::CheckResults),
        Stage::AssessmentCompleted => Some(Step::Decide),
        Stage::DecisionMade => {
            let outcome = resolve(gate.mode, gate.human_decision, gate.ai_recommendation)?;
            match outcome {
                Decision::Advance => Some(Step::Finalize(Stage::Hired)),
                Decision::Reject => Some(Step::Finalize(Stage::Rejected)),
                Decision::Hold => (!gate.decided).then_some(Step::Hold),
            }
        }
        Stage::RejectedAtScreen | Stage::Hired | Stage::Rejected => None,
    }
}

/// Final resolution at `decision_made`. `None` means the candidate is waiting on a human.
///
/// In full_auto the AI recommendation is authoritative. Otherwise only an advance or
/// reject from a reviewer unlocks resolution, and it wins over the AI.
pub fn resolve(
    mode: AutomationMode,
    human: Option<Decision>,
    ai: Option<Decision>,
) -> Option<Decision> {
    if mode == AutomationMode::FullAuto {
        return Some(ai.unwrap_or(Decision::Hold));
    }
    match human {
        Some(decision @ (Decision::Advance | Decision::Reject)) => Some(decision),
        _ => None,
    }
}
