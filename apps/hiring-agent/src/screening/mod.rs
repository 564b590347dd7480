//! Resume screening: one LLM call turns resume text into a fit score and a
//! shortlist / reject stage.

pub mod prompts;

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::errors::PipelineError;
use crate::llm_client::{Completion, LanguageModel};
use crate::models::{
    ActionKind, ActionLogEntry, Decision, Pipeline, PipelineCandidate, ScreeningResult, Stage,
};
use crate::repository::ActionLog;

/// Raw model output. Only `score` is mandatory.
#[derive(Debug, Deserialize)]
struct ScreeningResponse {
    score: f64,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    skills_matched: Vec<String>,
    #[serde(default)]
    skills_missing: Vec<String>,
    #[serde(default)]
    experience_years_estimated: Value,
    #[serde(default)]
    recommendation: String,
}

impl From<ScreeningResponse> for ScreeningResult {
    fn from(raw: ScreeningResponse) -> Self {
        ScreeningResult {
            score: raw.score.round().clamp(0.0, 100.0) as u32,
            summary: raw.summary,
            skills_matched: raw.skills_matched,
            skills_missing: raw.skills_missing,
            experience_years: raw.experience_years_estimated.as_f64().map(|y| y as f32),
            recommendation: Decision::from_ai(&raw.recommendation),
        }
    }
}

pub struct ResumeScreener {
    llm: Arc<dyn LanguageModel>,
    action_log: Arc<dyn ActionLog>,
}

impl ResumeScreener {
    pub fn new(llm: Arc<dyn LanguageModel>, action_log: Arc<dyn ActionLog>) -> Self {
        Self { llm, action_log }
    }

    /// Screens the candidate and moves it to `shortlisted` (score >= threshold) or
    /// `rejected_at_screen`. On any failure the stage is left untouched and an error
    /// entry is written to the action log.
    pub async fn screen(
        &self,
        pipeline: &Pipeline,
        candidate: &mut PipelineCandidate,
    ) -> Result<ScreeningResult, PipelineError> {
        let input = json!({
            "job_title": pipeline.job.title,
            "resume_length": candidate.resume_text.chars().count(),
            "threshold": pipeline.screening_threshold,
        });

        let outcome = self.evaluate(pipeline, candidate).await;
        let (result, completion) = match outcome {
            Ok(ok) => ok,
            Err((e, completion)) => {
                let mut entry = ActionLogEntry::failure(
                    pipeline.id,
                    Some(candidate.id),
                    ActionKind::ResumeScreen,
                    &e,
                )
                .with_input(input);
                if let Some(c) = completion {
                    entry = entry
                        .with_output(c.data)
                        .with_usage(&c.model, c.tokens, c.duration_ms);
                }
                self.action_log.append(entry).await?;
                return Err(e);
            }
        };

        candidate.stage = if result.score >= pipeline.screening_threshold {
            Stage::Shortlisted
        } else {
            Stage::RejectedAtScreen
        };
        candidate.screening = Some(result.clone());
        candidate.processed_at = Some(Utc::now());

        let entry = ActionLogEntry::success(pipeline.id, Some(candidate.id), ActionKind::ResumeScreen)
            .with_input(input)
            .with_output(completion.data)
            .with_usage(&completion.model, completion.tokens, completion.duration_ms);
        self.action_log.append(entry).await?;

        info!(
            "Screened candidate {}: score {} (threshold {}) -> {}",
            candidate.id, result.score, pipeline.screening_threshold, candidate.stage
        );
        Ok(result)
    }

    /// The failing completion, when there is one, is returned so its cost still lands in
    /// the log.
    async fn evaluate(
        &self,
        pipeline: &Pipeline,
        candidate: &PipelineCandidate,
    ) -> Result<(ScreeningResult, Completion), (PipelineError, Option<Completion>)> {
        if candidate.resume_text.trim().is_empty() {
            return Err((PipelineError::MissingResume(candidate.id), None));
        }

        let prompt = prompts::build_screening_prompt(&pipeline.job, &candidate.resume_text);
        let completion = self
            .llm
            .complete(&prompt)
            .await
            .map_err(|e| (PipelineError::from(e), None))?;

        match serde_json::from_value::<ScreeningResponse>(completion.data.clone()) {
            Ok(raw) => Ok((raw.into(), completion)),
            Err(e) => Err((
                PipelineError::MalformedOutput(format!("screening response: {e}")),
                Some(completion),
            )),
        }
    }
}
