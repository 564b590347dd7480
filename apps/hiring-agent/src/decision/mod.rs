//! Final AI decision over screening output and assessment results.

pub mod prompts;

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::errors::PipelineError;
use crate::llm_client::LanguageModel;
use crate::models::{
    ActionKind, ActionLogEntry, Decision, FinalDecision, Pipeline, PipelineCandidate, Stage,
};
use crate::repository::ActionLog;

#[derive(Debug, Deserialize)]
struct DecisionResponse {
    score: f64,
    #[serde(default)]
    recommendation: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    concerns: Vec<String>,
}

pub struct DecisionEngine {
    llm: Arc<dyn LanguageModel>,
    action_log: Arc<dyn ActionLog>,
}

impl DecisionEngine {
    pub fn new(llm: Arc<dyn LanguageModel>, action_log: Arc<dyn ActionLog>) -> Self {
        Self { llm, action_log }
    }

    /// On success the candidate moves to `decision_made` with the AI verdict attached.
    pub async fn decide(
        &self,
        pipeline: &Pipeline,
        candidate: &mut PipelineCandidate,
    ) -> Result<FinalDecision, PipelineError> {
        let input = json!({
            "screen_score": candidate.screening.as_ref().map(|s| s.score),
            "assessment_sessions": candidate.assessment_sessions,
        });
        let prompt = prompts::build_decision_prompt(pipeline, candidate);

        let completion = match self.llm.complete(&prompt).await {
            Ok(completion) => completion,
            Err(e) => {
                let e = PipelineError::from(e);
                let entry = ActionLogEntry::failure(
                    pipeline.id,
                    Some(candidate.id),
                    ActionKind::FinalDecision,
                    &e,
                )
                .with_input(input);
                self.action_log.append(entry).await?;
                return Err(e);
            }
        };

        let raw = match serde_json::from_value::<DecisionResponse>(completion.data.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                let e = PipelineError::MalformedOutput(format!("decision response: {e}"));
                let entry = ActionLogEntry::failure(
                    pipeline.id,
                    Some(candidate.id),
                    ActionKind::FinalDecision,
                    &e,
                )
                .with_input(input)
                .with_output(completion.data)
                .with_usage(&completion.model, completion.tokens, completion.duration_ms);
                self.action_log.append(entry).await?;
                return Err(e);
            }
        };

        let decision = FinalDecision {
            score: raw.score.round().clamp(0.0, 100.0) as u32,
            recommendation: Decision::from_ai(&raw.recommendation),
            summary: raw.summary,
            strengths: raw.strengths,
            concerns: raw.concerns,
        };

        candidate.final_decision = Some(decision.clone());
        candidate.stage = Stage::DecisionMade;
        candidate.processed_at = Some(Utc::now());

        let entry = ActionLogEntry::success(pipeline.id, Some(candidate.id), ActionKind::FinalDecision)
            .with_input(input)
            .with_output(completion.data)
            .with_usage(&completion.model, completion.tokens, completion.duration_ms);
        self.action_log.append(entry).await?;

        info!(
            "Final decision for candidate {}: {} ({}/100)",
            candidate.id,
            decision.recommendation.as_str(),
            decision.score
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionStatus, AutomationMode};
    use crate::testing::{sample_candidate, sample_pipeline, MemoryActionLog, ScriptedModel};

    #[tokio::test]
    async fn test_decision_moves_candidate_to_decision_made() {
        let model = ScriptedModel::new().reply(
            "final hiring decision",
            json!({
                "score": 80,
                "recommendation": "advance",
                "summary": "Strong across the board",
                "strengths": ["communication"],
                "concerns": []
            }),
        );
        let log = Arc::new(MemoryActionLog::default());
        let engine = DecisionEngine::new(Arc::new(model), log.clone());
        let pipeline = sample_pipeline(AutomationMode::FullAuto, 60);
        let mut candidate =
            sample_candidate(&pipeline, "ada@example.com", Stage::AssessmentCompleted);

        let decision = engine.decide(&pipeline, &mut candidate).await.unwrap();

        assert_eq!(decision.score, 80);
        assert_eq!(decision.recommendation, Decision::Advance);
        assert_eq!(candidate.stage, Stage::DecisionMade);
        assert_eq!(candidate.ai_recommendation(), Some(Decision::Advance));
        assert_eq!(log.entries()[0].action, ActionKind::FinalDecision);
        assert_eq!(log.entries()[0].status, ActionStatus::Success);
    }

    #[tokio::test]
    async fn test_llm_failure_leaves_stage_and_logs_error() {
        let log = Arc::new(MemoryActionLog::default());
        let engine = DecisionEngine::new(
            Arc::new(ScriptedModel::new().fail("final hiring decision")),
            log.clone(),
        );
        let pipeline = sample_pipeline(AutomationMode::FullAuto, 60);
        let mut candidate =
            sample_candidate(&pipeline, "ada@example.com", Stage::AssessmentCompleted);

        let err = engine.decide(&pipeline, &mut candidate).await.unwrap_err();

        assert!(matches!(err, PipelineError::Llm(_)));
        assert_eq!(candidate.stage, Stage::AssessmentCompleted);
        assert!(candidate.final_decision.is_none());
        assert_eq!(log.entries()[0].status, ActionStatus::Error);
    }

    #[tokio::test]
    async fn test_reply_without_score_is_malformed() {
        let model = ScriptedModel::new().reply(
            "final hiring decision",
            json!({
                "recommendation": "advance",
                "summary": "Forgot the number"
            }),
        );
        let log = Arc::new(MemoryActionLog::default());
        let engine = DecisionEngine::new(Arc::new(model), log.clone());
        let pipeline = sample_pipeline(AutomationMode::FullAuto, 60);
        let mut candidate =
            sample_candidate(&pipeline, "ada@example.com", Stage::AssessmentCompleted);

        let err = engine.decide(&pipeline, &mut candidate).await.unwrap_err();

        assert!(matches!(err, PipelineError::MalformedOutput(_)));
        assert_eq!(candidate.stage, Stage::AssessmentCompleted);
        assert!(candidate.final_decision.is_none());
        assert!(candidate.processed_at.is_none());
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, ActionKind::FinalDecision);
        assert_eq!(entries[0].status, ActionStatus::Error);
        assert_eq!(entries[0].model, "scripted-model");
        assert_eq!(entries[0].tokens_used, 100);
        assert_eq!(entries[0].output["summary"], "Forgot the number");
    }
}
