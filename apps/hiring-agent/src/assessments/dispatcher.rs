//! Assessment dispatch: get-or-create one session per configured kind and invite the
//! candidate exactly once per session.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::errors::PipelineError;
use crate::models::{
    ActionKind, ActionLogEntry, AssessmentSessionRecord, Pipeline, PipelineCandidate, Stage,
};
use crate::notifications::{NotificationKind, Notifications};
use crate::repository::ActionLog;

use super::{AssessmentKind, AssessmentRegistry, AssessmentSession, SessionStatus};

pub struct AssessmentDispatcher {
    registry: AssessmentRegistry,
    notifications: Notifications,
    action_log: Arc<dyn ActionLog>,
    site_url: String,
}

impl AssessmentDispatcher {
    pub fn new(
        registry: AssessmentRegistry,
        notifications: Notifications,
        action_log: Arc<dyn ActionLog>,
        site_url: String,
    ) -> Self {
        Self {
            registry,
            notifications,
            action_log,
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    /// Dispatches every configured assessment and moves the candidate to `assessment_sent`.
    ///
    /// Unknown codes and kinds without a registered subsystem are skipped with a warning.
    /// A subsystem failure aborts the dispatch. Configured sessions are reused (and not
    /// re-invited) on the next run; a session left in draft is configured and invited then.
    pub async fn send_all(
        &self,
        pipeline: &Pipeline,
        candidate: &mut PipelineCandidate,
    ) -> Result<Vec<AssessmentSessionRecord>, PipelineError> {
        match self.dispatch(pipeline, candidate).await {
            Ok(records) => {
                let entry = ActionLogEntry::success(
                    pipeline.id,
                    Some(candidate.id),
                    ActionKind::AssessmentSend,
                )
                .with_input(json!({
                    "types": pipeline.assessment_types,
                    "candidate_email": candidate.candidate.email,
                }))
                .with_output(json!({ "sessions": records }));
                self.action_log.append(entry).await?;

                candidate.assessment_sessions = records.clone();
                candidate.stage = Stage::AssessmentSent;
                Ok(records)
            }
            Err(e) => {
                let entry = ActionLogEntry::failure(
                    pipeline.id,
                    Some(candidate.id),
                    ActionKind::AssessmentSend,
                    &e,
                )
                .with_input(json!({ "types": pipeline.assessment_types }));
                self.action_log.append(entry).await?;
                Err(e)
            }
        }
    }

    async fn dispatch(
        &self,
        pipeline: &Pipeline,
        candidate: &PipelineCandidate,
    ) -> Result<Vec<AssessmentSessionRecord>, PipelineError> {
        let level = pipeline.job.seniority.assessment_level();
        let candidate_ref = candidate.candidate.email.as_str();
        let mut records = Vec::with_capacity(pipeline.assessment_types.len());

        for code in &pipeline.assessment_types {
            let Ok(kind) = code.parse::<AssessmentKind>() else {
                warn!("Unknown assessment type '{}' in pipeline {}", code, pipeline.id);
                continue;
            };
            let Some(provider) = self.registry.get(kind) else {
                warn!(
                    "No assessment subsystem registered for '{}' (pipeline {})",
                    code, pipeline.id
                );
                continue;
            };

            let (mut session, created) = provider
                .create_or_get_session(candidate_ref, pipeline.employer_id)
                .await?;

            // A session still in draft never got configured or invited, even if an
            // earlier run created it.
            let fresh = created || session.status == SessionStatus::Draft;
            if fresh {
                provider.configure_session(&session, level).await?;
                session.status = SessionStatus::InProgress;
                session.level = Some(level);
            }

            let invite_sent = if fresh {
                self.invite(pipeline, candidate, kind, &session).await
            } else {
                previously_invited(candidate, &session)
            };

            records.push(AssessmentSessionRecord {
                kind,
                session_id: session.id,
                score: None,
                status: session.status,
                invite_sent,
            });
        }

        info!(
            "Dispatched {} assessment(s) to {} in pipeline {}",
            records.len(),
            candidate_ref,
            pipeline.id
        );
        Ok(records)
    }

    async fn invite(
        &self,
        pipeline: &Pipeline,
        candidate: &PipelineCandidate,
        kind: AssessmentKind,
        session: &AssessmentSession,
    ) -> bool {
        let first_name = match candidate.candidate.first_name.trim() {
            "" => "Candidate",
            name => name,
        };
        let start_link = format!(
            "{}/candidate/{}/{}",
            self.site_url,
            kind.route_slug(),
            session.id
        );
        let payload = json!({
            "candidate_email": candidate.candidate.email,
            "candidate_first_name": first_name,
            "company_name": pipeline.employer_name,
            "assessment": kind.label(),
            "session_id": session.id,
            "start_link": start_link,
        });
        self.notifications
            .send(pipeline, NotificationKind::AssessmentInvite, payload)
            .await
    }
}

/// A reused session keeps the invite flag from the dispatch that created it.
fn previously_invited(candidate: &PipelineCandidate, session: &AssessmentSession) -> bool {
    candidate
        .assessment_sessions
        .iter()
        .any(|r| r.session_id == session.id && r.invite_sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessments::{AssessmentKind, AssessmentRegistry};
    use crate::models::{AutomationMode, Seniority};
    use crate::testing::{
        sample_candidate, sample_pipeline, FakeAssessmentProvider, MemoryActionLog,
        RecordingNotifier,
    };

    fn dispatcher_with(
        provider: Arc<FakeAssessmentProvider>,
        kinds: &[AssessmentKind],
    ) -> (AssessmentDispatcher, Arc<RecordingNotifier>, Arc<MemoryActionLog>) {
        let registry = kinds.iter().fold(AssessmentRegistry::new(), |r, k| {
            r.with(*k, provider.clone())
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let log = Arc::new(MemoryActionLog::default());
        let dispatcher = AssessmentDispatcher::new(
            registry,
            Notifications::new(notifier.clone()),
            log.clone(),
            "https://hire.example.com/".to_string(),
        );
        (dispatcher, notifier, log)
    }

    #[tokio::test]
    async fn test_new_session_is_configured_and_invited_once() {
        let provider = Arc::new(FakeAssessmentProvider::default());
        let (dispatcher, notifier, log) =
            dispatcher_with(provider.clone(), &[AssessmentKind::Marketing]);
        let mut pipeline = sample_pipeline(AutomationMode::FullAuto, 60);
        pipeline.job.seniority = Seniority::Executive;
        pipeline.assessment_types = vec!["marketing".to_string()];
        let mut candidate = sample_candidate(&pipeline, "ada@example.com", Stage::AssessmentPending);

        let records = dispatcher.send_all(&pipeline, &mut candidate).await.unwrap();

        assert_eq!(records.len(), 1);
        assert!(records[0].invite_sent);
        assert_eq!(records[0].status, SessionStatus::InProgress);
        assert_eq!(candidate.stage, Stage::AssessmentSent);
        assert_eq!(notifier.count(NotificationKind::AssessmentInvite), 1);
        assert_eq!(
            provider.level_of(records[0].session_id),
            Some(crate::assessments::AssessmentLevel::Senior)
        );
        let invite = &notifier.sent()[0];
        assert_eq!(
            invite.payload["start_link"],
            format!("https://hire.example.com/candidate/marketing/{}", records[0].session_id)
        );
        assert_eq!(log.entries().len(), 1);
        assert_eq!(log.entries()[0].action, ActionKind::AssessmentSend);
    }

    #[tokio::test]
    async fn test_reused_session_is_not_reinvited() {
        let provider = Arc::new(FakeAssessmentProvider::default());
        let (dispatcher, notifier, _log) =
            dispatcher_with(provider.clone(), &[AssessmentKind::Behavioral]);
        let mut pipeline = sample_pipeline(AutomationMode::SemiAuto, 60);
        pipeline.assessment_types = vec!["behavioral".to_string()];
        let mut candidate = sample_candidate(&pipeline, "ada@example.com", Stage::AssessmentPending);

        let first = dispatcher.send_all(&pipeline, &mut candidate).await.unwrap();
        candidate.stage = Stage::AssessmentPending;
        let second = dispatcher.send_all(&pipeline, &mut candidate).await.unwrap();

        assert_eq!(first[0].session_id, second[0].session_id);
        assert!(second[0].invite_sent);
        assert_eq!(notifier.count(NotificationKind::AssessmentInvite), 1);
        assert_eq!(provider.session_count(), 1);
    }

    #[tokio::test]
    async fn test_configure_failure_invites_on_next_run() {
        let provider = Arc::new(FakeAssessmentProvider::configure_fails_once());
        let (dispatcher, notifier, log) =
            dispatcher_with(provider.clone(), &[AssessmentKind::Behavioral]);
        let mut pipeline = sample_pipeline(AutomationMode::FullAuto, 60);
        pipeline.assessment_types = vec!["behavioral".to_string()];
        let mut candidate = sample_candidate(&pipeline, "ada@example.com", Stage::AssessmentPending);

        assert!(dispatcher.send_all(&pipeline, &mut candidate).await.is_err());
        assert_eq!(candidate.stage, Stage::AssessmentPending);
        assert_eq!(provider.session_count(), 1);
        assert_eq!(notifier.count(NotificationKind::AssessmentInvite), 0);

        let records = dispatcher.send_all(&pipeline, &mut candidate).await.unwrap();

        assert_eq!(provider.session_count(), 1);
        assert_eq!(records[0].status, SessionStatus::InProgress);
        assert!(records[0].invite_sent);
        assert_eq!(candidate.stage, Stage::AssessmentSent);
        assert_eq!(notifier.count(NotificationKind::AssessmentInvite), 1);
        assert_eq!(log.entries().len(), 2);

        candidate.stage = Stage::AssessmentPending;
        let third = dispatcher.send_all(&pipeline, &mut candidate).await.unwrap();
        assert!(third[0].invite_sent);
        assert_eq!(notifier.count(NotificationKind::AssessmentInvite), 1);
    }

    #[tokio::test]
    async fn test_unknown_and_unregistered_kinds_are_skipped() {
        let provider = Arc::new(FakeAssessmentProvider::default());
        let (dispatcher, notifier, _log) =
            dispatcher_with(provider, &[AssessmentKind::Product]);
        let mut pipeline = sample_pipeline(AutomationMode::FullAuto, 60);
        pipeline.assessment_types = vec![
            "astrology".to_string(),
            "finance".to_string(),
            "product".to_string(),
        ];
        let mut candidate = sample_candidate(&pipeline, "ada@example.com", Stage::AssessmentPending);

        let records = dispatcher.send_all(&pipeline, &mut candidate).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, AssessmentKind::Product);
        assert_eq!(candidate.stage, Stage::AssessmentSent);
        assert_eq!(notifier.count(NotificationKind::AssessmentInvite), 1);
    }

    #[tokio::test]
    async fn test_failed_invite_does_not_fail_dispatch() {
        let provider = Arc::new(FakeAssessmentProvider::default());
        let registry = AssessmentRegistry::new().with(AssessmentKind::Hr, provider);
        let notifier = Arc::new(RecordingNotifier::failing());
        let dispatcher = AssessmentDispatcher::new(
            registry,
            Notifications::new(notifier.clone()),
            Arc::new(MemoryActionLog::default()),
            "https://hire.example.com".to_string(),
        );
        let mut pipeline = sample_pipeline(AutomationMode::FullAuto, 60);
        pipeline.assessment_types = vec!["hr".to_string()];
        let mut candidate = sample_candidate(&pipeline, "ada@example.com", Stage::AssessmentPending);

        let records = dispatcher.send_all(&pipeline, &mut candidate).await.unwrap();

        assert!(!records[0].invite_sent);
        assert_eq!(candidate.stage, Stage::AssessmentSent);
    }

    #[tokio::test]
    async fn test_subsystem_failure_is_logged_and_leaves_stage() {
        let provider = Arc::new(FakeAssessmentProvider::failing());
        let (dispatcher, _notifier, log) =
            dispatcher_with(provider, &[AssessmentKind::Finance]);
        let mut pipeline = sample_pipeline(AutomationMode::FullAuto, 60);
        pipeline.assessment_types = vec!["finance".to_string()];
        let mut candidate = sample_candidate(&pipeline, "ada@example.com", Stage::AssessmentPending);

        let result = dispatcher.send_all(&pipeline, &mut candidate).await;

        assert!(result.is_err());
        assert_eq!(candidate.stage, Stage::AssessmentPending);
        assert_eq!(log.entries()[0].status, crate::models::ActionStatus::Error);
    }
}
