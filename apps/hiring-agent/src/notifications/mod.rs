//! Outbound notifications: candidate invites and per-run milestones for the employer.
//!
//! Delivery is fire-and-forget. `Notifications::send` logs and swallows every failure,
//! so a broken webhook can never fail a pipeline run.

pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::Pipeline;

pub use webhook::WebhookNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook rejected notification with status {0}")]
    Rejected(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AssessmentInvite,
    ShortlistReady,
    AssessmentsSent,
    DecisionsReady,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::AssessmentInvite => "assessment_invite",
            NotificationKind::ShortlistReady => "shortlist_ready",
            NotificationKind::AssessmentsSent => "assessments_sent",
            NotificationKind::DecisionsReady => "decisions_ready",
        }
    }

    /// Employer-facing summary line for a batch milestone. `None` for per-candidate kinds.
    pub fn milestone_message(&self, count: u32, job_title: &str) -> Option<String> {
        let noun = if count == 1 { "candidate" } else { "candidates" };
        match self {
            NotificationKind::AssessmentInvite => None,
            NotificationKind::ShortlistReady => {
                Some(format!("{count} {noun} shortlisted for {job_title}"))
            }
            NotificationKind::AssessmentsSent => {
                Some(format!("Assessments sent to {count} {noun} for {job_title}"))
            }
            NotificationKind::DecisionsReady => {
                let noun = if count == 1 { "decision" } else { "decisions" };
                Some(format!("{count} hiring {noun} ready for {job_title}"))
            }
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        pipeline: &Pipeline,
        kind: NotificationKind,
        payload: &Value,
    ) -> Result<(), NotifyError>;
}

/// Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        pipeline: &Pipeline,
        kind: NotificationKind,
        payload: &Value,
    ) -> Result<(), NotifyError> {
        info!(
            "Notification {} for pipeline {}: {}",
            kind.as_str(),
            pipeline.id,
            payload
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct Notifications {
    notifier: Arc<dyn Notifier>,
}

impl Notifications {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Returns whether the notification was delivered.
    pub async fn send(&self, pipeline: &Pipeline, kind: NotificationKind, payload: Value) -> bool {
        match self.notifier.notify(pipeline, kind, &payload).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Failed to deliver {} notification for pipeline {}: {}",
                    kind.as_str(),
                    pipeline.id,
                    e
                );
                false
            }
        }
    }
}
