//! Pipeline orchestrator: walks every candidate of an active pipeline through the
//! transition table, one candidate per worker, isolating failures per candidate.
//!
//! Each step commits its own state before the next one runs, so an interrupted run
//! resumes where it stopped. Safe to re-run at any time: dispatch only invites on
//! session creation, polling is read-only until completion, and a hold is stamped once.

use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::assessments::{AssessmentDispatcher, AssessmentRegistry, ResultAggregator};
use crate::decision::DecisionEngine;
use crate::errors::PipelineError;
use crate::llm_client::LanguageModel;
use crate::models::{Pipeline, PipelineCandidate, Stage};
use crate::notifications::{NotificationKind, Notifications};
use crate::repository::{ActionLog, PipelineRepository, RepoError};
use crate::screening::ResumeScreener;

use super::locks::{PipelineLocks, RunLease, RunLock};
use super::transitions::{self, Gate, Step};
use super::{RunReport, RunStats};

pub const ALREADY_PROCESSING: &str = "already processing";

/// `None` when no cross-process lock is configured.
type Lease = Option<Box<dyn RunLease>>;

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub site_url: String,
    /// Candidates advanced concurrently within one run. Clamped to at least 1.
    pub workers: usize,
}

pub struct PipelineOrchestrator {
    repo: Arc<dyn PipelineRepository>,
    screener: ResumeScreener,
    dispatcher: AssessmentDispatcher,
    aggregator: ResultAggregator,
    decision: DecisionEngine,
    notifications: Notifications,
    locks: PipelineLocks,
    run_lock: Option<Arc<dyn RunLock>>,
    workers: usize,
}

impl PipelineOrchestrator {
    pub fn new(
        repo: Arc<dyn PipelineRepository>,
        action_log: Arc<dyn ActionLog>,
        llm: Arc<dyn LanguageModel>,
        registry: AssessmentRegistry,
        notifications: Notifications,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            screener: ResumeScreener::new(llm.clone(), action_log.clone()),
            dispatcher: AssessmentDispatcher::new(
                registry.clone(),
                notifications.clone(),
                action_log.clone(),
                settings.site_url,
            ),
            aggregator: ResultAggregator::new(registry, action_log.clone()),
            decision: DecisionEngine::new(llm, action_log),
            notifications,
            repo,
            locks: PipelineLocks::default(),
            run_lock: None,
            workers: settings.workers.max(1),
        }
    }

    /// Also take `run_lock` around every run, so separate processes never overlap.
    pub fn with_run_lock(mut self, run_lock: Arc<dyn RunLock>) -> Self {
        self.run_lock = Some(run_lock);
        self
    }

    /// One sweep over every non-terminal candidate of the pipeline.
    ///
    /// Returns `Skipped` when the pipeline is not active or another run holds it.
    /// Candidate failures are counted in `errors`; only a failure to list the
    /// candidates fails the whole run.
    pub async fn process_pipeline(&self, pipeline: &Pipeline) -> Result<RunReport, PipelineError> {
        if !pipeline.is_active() {
            return Ok(RunReport::skipped(format!(
                "Pipeline status is {}",
                pipeline.status
            )));
        }
        let Some(_guard) = self.locks.try_acquire(pipeline.id) else {
            warn!("Pipeline {} is already being processed, skipping", pipeline.id);
            return Ok(RunReport::skipped(ALREADY_PROCESSING));
        };
        let Some(lease) = self.lease(pipeline.id).await? else {
            warn!(
                "Pipeline {} is being processed by another process, skipping",
                pipeline.id
            );
            return Ok(RunReport::skipped(ALREADY_PROCESSING));
        };

        let result = self.sweep(pipeline).await;
        release(lease).await;
        result
    }

    async fn sweep(&self, pipeline: &Pipeline) -> Result<RunReport, PipelineError> {
        let candidates = self.repo.list_candidates(pipeline.id).await?;
        let pending: Vec<PipelineCandidate> = candidates
            .into_iter()
            .filter(|c| !c.stage.is_terminal())
            .collect();
        info!(
            "Processing pipeline {} ({}): {} open candidate(s), mode {}",
            pipeline.id,
            pipeline.job.title,
            pending.len(),
            pipeline.automation_mode.as_str()
        );

        let per_candidate: Vec<RunStats> = stream::iter(pending)
            .map(|candidate| self.advance_isolated(pipeline, candidate))
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut stats = RunStats::default();
        for s in &per_candidate {
            stats.merge(s);
        }

        self.emit_milestones(pipeline, &stats).await;
        info!("Pipeline {} run complete: {}", pipeline.id, stats.summary_line());
        Ok(RunReport::Completed(stats))
    }

    /// `None` while another process holds the pipeline.
    async fn lease(&self, pipeline_id: Uuid) -> Result<Option<Lease>, PipelineError> {
        let Some(lock) = &self.run_lock else {
            return Ok(Some(None));
        };
        Ok(lock.try_lock(pipeline_id).await?.map(Some))
    }

    /// Advances a single candidate, e.g. after its assessments were submitted.
    /// Runs under the same per-pipeline guard as a full sweep.
    pub async fn recheck_candidate(&self, candidate_id: Uuid) -> Result<RunReport, PipelineError> {
        let candidate = self
            .repo
            .load_candidate(candidate_id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Candidate {candidate_id}")))?;
        let pipeline = self
            .repo
            .get_pipeline(candidate.pipeline_id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Pipeline {}", candidate.pipeline_id)))?;

        if !pipeline.is_active() {
            return Ok(RunReport::skipped(format!(
                "Pipeline status is {}",
                pipeline.status
            )));
        }
        let Some(_guard) = self.locks.try_acquire(pipeline.id) else {
            return Ok(RunReport::skipped(ALREADY_PROCESSING));
        };
        let Some(lease) = self.lease(pipeline.id).await? else {
            return Ok(RunReport::skipped(ALREADY_PROCESSING));
        };

        let stats = if candidate.stage.is_terminal() {
            RunStats::default()
        } else {
            self.advance_isolated(&pipeline, candidate).await
        };
        self.emit_milestones(&pipeline, &stats).await;
        release(lease).await;
        Ok(RunReport::Completed(stats))
    }

    /// Per-candidate error boundary. Stats from steps that completed before a failure
    /// are kept.
    async fn advance_isolated(&self, pipeline: &Pipeline, candidate: PipelineCandidate) -> RunStats {
        let candidate_id = candidate.id;
        let mut stats = RunStats::default();
        if let Err(e) = self.advance(pipeline, candidate, &mut stats).await {
            error!(
                "Error processing candidate {} in pipeline {}: {}",
                candidate_id, pipeline.id, e
            );
            stats.errors += 1;
        }
        stats
    }

    async fn advance(
        &self,
        pipeline: &Pipeline,
        mut candidate: PipelineCandidate,
        stats: &mut RunStats,
    ) -> Result<(), PipelineError> {
        loop {
            let gate = Gate {
                stage: candidate.stage,
                mode: pipeline.automation_mode,
                human_decision: candidate.human_decision,
                ai_recommendation: candidate.ai_recommendation(),
                decided: candidate.decided_at.is_some(),
            };
            let Some(step) = transitions::plan(gate) else {
                return Ok(());
            };
            let before = candidate.stage;

            match step {
                Step::Screen => {
                    self.clear_stale_review(&mut candidate).await?;
                    self.screener.screen(pipeline, &mut candidate).await?;
                    stats.screened += 1;
                    match candidate.stage {
                        Stage::Shortlisted => stats.shortlisted += 1,
                        Stage::RejectedAtScreen => stats.rejected_at_screen += 1,
                        _ => {}
                    }
                }
                Step::MarkReady => candidate.stage = Stage::AssessmentPending,
                Step::Dispatch => {
                    self.dispatcher.send_all(pipeline, &mut candidate).await?;
                    stats.assessments_sent += 1;
                }
                Step::CheckResults => {
                    self.aggregator.check(pipeline, &mut candidate).await?;
                    stats.results_checked += 1;
                }
                Step::Decide => {
                    self.decision.decide(pipeline, &mut candidate).await?;
                    stats.decisions_made += 1;
                }
                Step::Finalize(to) => {
                    candidate.stage = to;
                    candidate.decided_at = Some(Utc::now());
                    stats.finalized += 1;
                }
                Step::Hold => candidate.decided_at = Some(Utc::now()),
            }

            self.repo.save_candidate(&candidate).await?;

            if candidate.stage == before {
                return Ok(());
            }
            info!(
                "Candidate {} ({}): {} -> {}",
                candidate.id, candidate.candidate.email, before, candidate.stage
            );
        }
    }

    /// A candidate back at `uploaded` starts over without the previous review.
    async fn clear_stale_review(&self, candidate: &mut PipelineCandidate) -> Result<(), PipelineError> {
        if candidate.human_decision.is_none() && candidate.human_notes.is_empty() {
            return Ok(());
        }
        self.repo.set_human_decision(candidate.id, None, "").await?;
        candidate.human_decision = None;
        candidate.human_notes.clear();
        Ok(())
    }

    async fn emit_milestones(&self, pipeline: &Pipeline, stats: &RunStats) {
        let milestones = [
            (NotificationKind::ShortlistReady, stats.shortlisted),
            (NotificationKind::AssessmentsSent, stats.assessments_sent),
            (NotificationKind::DecisionsReady, stats.decisions_made),
        ];
        for (kind, count) in milestones {
            if count == 0 {
                continue;
            }
            let Some(message) = kind.milestone_message(count, &pipeline.job.title) else {
                continue;
            };
            let payload = json!({
                "count": count,
                "message": message,
                "job_title": pipeline.job.title,
                "company_name": pipeline.employer_name,
            });
            self.notifications.send(pipeline, kind, payload).await;
        }
    }
}

async fn release(lease: Lease) {
    if let Some(lease) = lease {
        lease.release().await;
    }
}
