//! Result polling across every session tracked on a candidate.
//!
//! Safe to call any number of times: the candidate only moves to
//! `assessment_completed` once every session is submitted and at least one scored.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::errors::PipelineError;
use crate::models::{
    ActionKind, ActionLogEntry, AssessmentSessionRecord, Pipeline, PipelineCandidate, Stage,
};
use crate::repository::ActionLog;

use super::{AssessmentRegistry, SessionStatus};

#[derive(Debug, Clone, Serialize)]
pub struct AggregatedResults {
    pub all_complete: bool,
    pub average_score: Option<f64>,
    pub scored_count: usize,
    pub sessions: Vec<AssessmentSessionRecord>,
}

impl AggregatedResults {
    pub fn ready_for_decision(&self) -> bool {
        self.all_complete && self.scored_count > 0
    }
}

pub struct ResultAggregator {
    registry: AssessmentRegistry,
    action_log: Arc<dyn ActionLog>,
}

impl ResultAggregator {
    pub fn new(registry: AssessmentRegistry, action_log: Arc<dyn ActionLog>) -> Self {
        Self {
            registry,
            action_log,
        }
    }

    /// Refreshes status and score of every tracked session.
    ///
    /// Sessions whose subsystem is no longer registered, or whose row has disappeared,
    /// are carried over unchanged and do not hold the candidate back.
    pub async fn check(
        &self,
        pipeline: &Pipeline,
        candidate: &mut PipelineCandidate,
    ) -> Result<AggregatedResults, PipelineError> {
        let mut all_complete = true;
        let mut total_score = 0.0_f64;
        let mut scored_count = 0_usize;
        let mut updated = Vec::with_capacity(candidate.assessment_sessions.len());

        for record in &candidate.assessment_sessions {
            let mut record = record.clone();

            let Some(provider) = self.registry.get(record.kind) else {
                warn!(
                    "No assessment subsystem for '{}' while checking candidate {}",
                    record.kind.code(),
                    candidate.id
                );
                updated.push(record);
                continue;
            };

            let Some(snapshot) = provider.get_status_and_score(record.session_id).await? else {
                warn!(
                    "Assessment session {} ({}) no longer exists",
                    record.session_id,
                    record.kind.code()
                );
                updated.push(record);
                continue;
            };

            record.status = snapshot.status;
            if let Some(score) = snapshot.score {
                record.score = Some(score);
                total_score += score;
                scored_count += 1;
            }
            if snapshot.status != SessionStatus::Submitted {
                all_complete = false;
            }
            updated.push(record);
        }

        let results = AggregatedResults {
            all_complete,
            average_score: (scored_count > 0).then(|| total_score / scored_count as f64),
            scored_count,
            sessions: updated,
        };

        candidate.assessment_sessions = results.sessions.clone();

        if results.ready_for_decision() {
            candidate.stage = Stage::AssessmentCompleted;
            let entry =
                ActionLogEntry::success(pipeline.id, Some(candidate.id), ActionKind::ScoreCheck)
                    .with_output(json!({
                        "average_score": results.average_score,
                        "scored_count": results.scored_count,
                        "sessions": results.sessions,
                    }));
            self.action_log.append(entry).await?;
        } else {
            debug!(
                "Candidate {} still waiting on assessments ({} scored)",
                candidate.id, scored_count
            );
        }

        Ok(results)
    }
}
