//! In-memory fakes for every seam, plus fixtures. Compiled only for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::assessments::{
    AssessmentError, AssessmentKind, AssessmentLevel, AssessmentProvider, AssessmentRegistry,
    AssessmentSession, SessionSnapshot, SessionStatus,
};
use crate::events::{QueueError, RecheckQueue, RecheckRequest};
use crate::llm_client::{parse_json_payload, Completion, LanguageModel, LlmError};
use crate::models::{
    ActionLogEntry, AutomationMode, CandidateProfile, Decision, JobProfile, Pipeline,
    PipelineCandidate, PipelineStatus, Seniority, Stage,
};
use crate::notifications::{NotificationKind, Notifications, Notifier, NotifyError};
use crate::pipeline::locks::{PipelineGuard, PipelineLocks, RunLease, RunLock};
use crate::pipeline::{OrchestratorSettings, PipelineOrchestrator};
use crate::repository::{ActionLog, PipelineRepository, RepoError, ResumeUpload};
use crate::resume::{ResumeIntake, ResumeStorage, StorageError};
use crate::state::AppState;

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

pub fn sample_pipeline(mode: AutomationMode, threshold: u32) -> Pipeline {
    Pipeline {
        id: Uuid::new_v4(),
        employer_id: Uuid::new_v4(),
        employer_name: "Acme Research".to_string(),
        job: JobProfile {
            title: "Research Analyst".to_string(),
            description: "Analyse markets and brief leadership".to_string(),
            required_skills: vec!["Research".to_string(), "Excel".to_string()],
            preferred_skills: vec!["SQL".to_string()],
            seniority: Seniority::Mid,
            experience_range: "2-4 years".to_string(),
        },
        assessment_types: vec!["behavioral".to_string()],
        automation_mode: mode,
        screening_threshold: threshold,
        passing_score: 70,
        max_candidates: 50,
        status: PipelineStatus::Active,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn sample_candidate(pipeline: &Pipeline, email: &str, stage: Stage) -> PipelineCandidate {
    PipelineCandidate {
        id: Uuid::new_v4(),
        pipeline_id: pipeline.id,
        candidate: CandidateProfile {
            id: Uuid::new_v4(),
            email: email.to_string(),
            first_name: "Jane".to_string(),
            last_name: "Analyst".to_string(),
        },
        resume_key: None,
        resume_text: format!("Jane Analyst\n{email}\nFive years of market research."),
        stage,
        screening: None,
        final_decision: None,
        human_decision: None,
        human_notes: String::new(),
        assessment_sessions: Vec::new(),
        processed_at: None,
        decided_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Orchestrator over the given repository with every assessment kind backed by one fake.
pub fn orchestrator_with(repo: Arc<MemoryRepository>, model: ScriptedModel) -> PipelineOrchestrator {
    let provider = Arc::new(FakeAssessmentProvider::default());
    let registry = AssessmentKind::ALL
        .into_iter()
        .fold(AssessmentRegistry::new(), |r, k| r.with(k, provider.clone()));
    PipelineOrchestrator::new(
        repo,
        Arc::new(MemoryActionLog::default()),
        Arc::new(model),
        registry,
        Notifications::new(Arc::new(RecordingNotifier::default())),
        OrchestratorSettings {
            site_url: "https://hire.example.com".to_string(),
            workers: 2,
        },
    )
}

/// Application state wired entirely to fakes, with handles to inspect them.
pub struct TestApp {
    pub state: AppState,
    pub repo: Arc<MemoryRepository>,
    pub action_log: Arc<MemoryActionLog>,
    pub queue: Arc<MemoryRecheckQueue>,
    pub storage: Arc<MemoryResumeStorage>,
}

pub fn test_app(model: ScriptedModel) -> TestApp {
    let repo = Arc::new(MemoryRepository::default());
    let action_log = Arc::new(MemoryActionLog::default());
    let queue = Arc::new(MemoryRecheckQueue::default());
    let storage = Arc::new(MemoryResumeStorage::default());
    let orchestrator = Arc::new(orchestrator_with(repo.clone(), model));
    let state = AppState {
        repo: repo.clone(),
        action_log: action_log.clone(),
        orchestrator,
        recheck_queue: queue.clone(),
        intake: Arc::new(ResumeIntake::new(repo.clone(), storage.clone(), 1024 * 1024)),
        upload_limit: 4 * 1024 * 1024,
    };
    TestApp {
        state,
        repo,
        action_log,
        queue,
        storage,
    }
}

// ──────────────────────────────────────────────
// Repository
// ──────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryRepository {
    pipelines: Mutex<HashMap<Uuid, Pipeline>>,
    candidates: Mutex<Vec<PipelineCandidate>>,
}

impl MemoryRepository {
    pub fn insert_pipeline(&self, pipeline: Pipeline) {
        self.pipelines.lock().unwrap().insert(pipeline.id, pipeline);
    }

    pub fn insert_candidate(&self, candidate: PipelineCandidate) -> Uuid {
        let id = candidate.id;
        self.candidates.lock().unwrap().push(candidate);
        id
    }

    pub fn pipeline(&self, id: Uuid) -> Pipeline {
        self.pipelines.lock().unwrap()[&id].clone()
    }

    pub fn candidate(&self, id: Uuid) -> PipelineCandidate {
        self.candidates
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .expect("candidate exists")
    }
}

#[async_trait]
impl PipelineRepository for MemoryRepository {
    async fn list_pipelines(
        &self,
        status: Option<PipelineStatus>,
    ) -> Result<Vec<Pipeline>, RepoError> {
        Ok(self
            .pipelines
            .lock()
            .unwrap()
            .values()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect())
    }

    async fn get_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>, RepoError> {
        Ok(self.pipelines.lock().unwrap().get(&id).cloned())
    }

    async fn set_pipeline_status(
        &self,
        id: Uuid,
        status: PipelineStatus,
    ) -> Result<(), RepoError> {
        let mut pipelines = self.pipelines.lock().unwrap();
        let pipeline = pipelines
            .get_mut(&id)
            .ok_or_else(|| RepoError::NotFound(format!("Pipeline {id}")))?;
        pipeline.status = status;
        pipeline.updated_at = Utc::now();
        Ok(())
    }

    async fn list_candidates(
        &self,
        pipeline_id: Uuid,
    ) -> Result<Vec<PipelineCandidate>, RepoError> {
        Ok(self
            .candidates
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.pipeline_id == pipeline_id)
            .cloned()
            .collect())
    }

    async fn load_candidate(&self, id: Uuid) -> Result<Option<PipelineCandidate>, RepoError> {
        Ok(self
            .candidates
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn save_candidate(&self, candidate: &PipelineCandidate) -> Result<(), RepoError> {
        let mut candidates = self.candidates.lock().unwrap();
        let stored = candidates
            .iter_mut()
            .find(|c| c.id == candidate.id)
            .ok_or_else(|| RepoError::NotFound(format!("Candidate {}", candidate.id)))?;
        let human_decision = stored.human_decision;
        let human_notes = std::mem::take(&mut stored.human_notes);
        *stored = PipelineCandidate {
            human_decision,
            human_notes,
            updated_at: Utc::now(),
            ..candidate.clone()
        };
        Ok(())
    }

    async fn upsert_resume(
        &self,
        pipeline_id: Uuid,
        upload: ResumeUpload,
    ) -> Result<(PipelineCandidate, bool), RepoError> {
        let mut candidates = self.candidates.lock().unwrap();
        let email = upload.email.to_lowercase();

        if let Some(existing) = candidates
            .iter_mut()
            .find(|c| c.pipeline_id == pipeline_id && c.candidate.email.to_lowercase() == email)
        {
            existing.resume_key = Some(upload.resume_key);
            existing.resume_text = upload.resume_text;
            existing.stage = Stage::Uploaded;
            existing.human_decision = None;
            existing.human_notes.clear();
            existing.updated_at = Utc::now();
            return Ok((existing.clone(), false));
        }

        let profile = candidates
            .iter()
            .find(|c| c.candidate.email.to_lowercase() == email)
            .map(|c| c.candidate.clone())
            .unwrap_or(CandidateProfile {
                id: Uuid::new_v4(),
                email,
                first_name: upload.first_name,
                last_name: upload.last_name,
            });
        let now = Utc::now();
        let candidate = PipelineCandidate {
            id: Uuid::new_v4(),
            pipeline_id,
            candidate: profile,
            resume_key: Some(upload.resume_key),
            resume_text: upload.resume_text,
            stage: Stage::Uploaded,
            screening: None,
            final_decision: None,
            human_decision: None,
            human_notes: String::new(),
            assessment_sessions: Vec::new(),
            processed_at: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        };
        candidates.push(candidate.clone());
        Ok((candidate, true))
    }

    async fn set_human_decision(
        &self,
        candidate_id: Uuid,
        decision: Option<Decision>,
        notes: &str,
    ) -> Result<(), RepoError> {
        let mut candidates = self.candidates.lock().unwrap();
        let stored = candidates
            .iter_mut()
            .find(|c| c.id == candidate_id)
            .ok_or_else(|| RepoError::NotFound(format!("Candidate {candidate_id}")))?;
        stored.human_decision = decision;
        stored.human_notes = notes.to_string();
        Ok(())
    }

    async fn find_awaiting_results(
        &self,
        email: &str,
    ) -> Result<Vec<PipelineCandidate>, RepoError> {
        let pipelines = self.pipelines.lock().unwrap();
        let email = email.to_lowercase();
        Ok(self
            .candidates
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.candidate.email.to_lowercase() == email)
            .filter(|c| c.stage == Stage::AssessmentSent)
            .filter(|c| pipelines.get(&c.pipeline_id).is_some_and(Pipeline::is_active))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryActionLog {
    entries: Mutex<Vec<ActionLogEntry>>,
}

impl MemoryActionLog {
    pub fn entries(&self) -> Vec<ActionLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionLog for MemoryActionLog {
    async fn append(&self, entry: ActionLogEntry) -> Result<(), RepoError> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    async fn for_candidate(
        &self,
        candidate_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ActionLogEntry>, RepoError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|e| e.candidate_id == Some(candidate_id))
            .take(limit)
            .cloned()
            .collect())
    }
}

// ──────────────────────────────────────────────
// Assessments
// ──────────────────────────────────────────────

struct FakeSession {
    candidate_ref: String,
    employer_id: Uuid,
    snapshot: SessionSnapshot,
    level: Option<AssessmentLevel>,
}

/// One subsystem's sessions, keyed like the real tables on (candidate_ref, employer).
#[derive(Default)]
pub struct FakeAssessmentProvider {
    sessions: Mutex<HashMap<Uuid, FakeSession>>,
    failing: bool,
    configure_fails: AtomicBool,
}

impl FakeAssessmentProvider {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    /// The first `configure_session` errors after the session was already created.
    pub fn configure_fails_once() -> Self {
        Self {
            configure_fails: AtomicBool::new(true),
            ..Default::default()
        }
    }

    /// Adds a session not tied to any candidate, as if created elsewhere.
    pub fn seed(&self, snapshot: SessionSnapshot) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.lock().unwrap().insert(
            id,
            FakeSession {
                candidate_ref: String::new(),
                employer_id: Uuid::nil(),
                snapshot,
                level: None,
            },
        );
        id
    }

    pub fn set_snapshot(&self, session_id: Uuid, snapshot: SessionSnapshot) {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(&session_id) {
            session.snapshot = snapshot;
        }
    }

    pub fn level_of(&self, session_id: Uuid) -> Option<AssessmentLevel> {
        self.sessions
            .lock()
            .unwrap()
            .get(&session_id)
            .and_then(|s| s.level)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), AssessmentError> {
        if self.failing {
            Err(AssessmentError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AssessmentProvider for FakeAssessmentProvider {
    async fn create_or_get_session(
        &self,
        candidate_ref: &str,
        employer_id: Uuid,
    ) -> Result<(AssessmentSession, bool), AssessmentError> {
        self.check()?;
        let mut sessions = self.sessions.lock().unwrap();
        let existing = sessions
            .iter()
            .find(|(_, s)| s.candidate_ref == candidate_ref && s.employer_id == employer_id)
            .map(|(id, s)| (*id, s.snapshot.status, s.level));

        let (id, status, level, created) = match existing {
            Some((id, status, level)) => (id, status, level, false),
            None => {
                let id = Uuid::new_v4();
                sessions.insert(
                    id,
                    FakeSession {
                        candidate_ref: candidate_ref.to_string(),
                        employer_id,
                        snapshot: SessionSnapshot {
                            status: SessionStatus::Draft,
                            score: None,
                        },
                        level: None,
                    },
                );
                (id, SessionStatus::Draft, None, true)
            }
        };

        Ok((
            AssessmentSession {
                id,
                kind: AssessmentKind::Behavioral,
                candidate_ref: candidate_ref.to_string(),
                employer_id,
                status,
                level,
            },
            created,
        ))
    }

    async fn configure_session(
        &self,
        session: &AssessmentSession,
        level: AssessmentLevel,
    ) -> Result<(), AssessmentError> {
        self.check()?;
        if self.configure_fails.swap(false, Ordering::SeqCst) {
            return Err(AssessmentError::Database(sqlx::Error::PoolTimedOut));
        }
        if let Some(stored) = self.sessions.lock().unwrap().get_mut(&session.id) {
            stored.level = Some(level);
            if stored.snapshot.status == SessionStatus::Draft {
                stored.snapshot.status = SessionStatus::InProgress;
            }
        }
        Ok(())
    }

    async fn get_status_and_score(
        &self,
        session_id: Uuid,
    ) -> Result<Option<SessionSnapshot>, AssessmentError> {
        self.check()?;
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(&session_id)
            .map(|s| s.snapshot))
    }
}

// ──────────────────────────────────────────────
// LLM
// ──────────────────────────────────────────────

enum Script {
    Reply(Value),
    Fail,
    Prose,
}

/// Answers by the first rule whose needle appears in the prompt.
#[derive(Default)]
pub struct ScriptedModel {
    rules: Vec<(String, Script)>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, needle: &str, data: Value) -> Self {
        self.rules.push((needle.to_string(), Script::Reply(data)));
        self
    }

    /// Simulates a transport or API failure.
    pub fn fail(mut self, needle: &str) -> Self {
        self.rules.push((needle.to_string(), Script::Fail));
        self
    }

    /// Simulates a model that answers in prose instead of JSON.
    pub fn prose(mut self, needle: &str) -> Self {
        self.rules.push((needle.to_string(), Script::Prose));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<Completion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, script)| script);

        let data = match script {
            Some(Script::Reply(data)) => data.clone(),
            Some(Script::Prose) => parse_json_payload("I think this candidate is great!")?,
            Some(Script::Fail) | None => {
                return Err(LlmError::Api {
                    status: 529,
                    message: "overloaded".to_string(),
                })
            }
        };
        Ok(Completion {
            data,
            model: "scripted-model".to_string(),
            tokens: 100,
            duration_ms: 5,
        })
    }
}

// ──────────────────────────────────────────────
// Notifications, queue, storage
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SentNotification {
    pub kind: NotificationKind,
    pub pipeline_id: Uuid,
    pub payload: Value,
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.sent.lock().unwrap().iter().filter(|n| n.kind == kind).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        pipeline: &Pipeline,
        kind: NotificationKind,
        payload: &Value,
    ) -> Result<(), NotifyError> {
        if self.failing {
            return Err(NotifyError::Rejected(503));
        }
        self.sent.lock().unwrap().push(SentNotification {
            kind,
            pipeline_id: pipeline.id,
            payload: payload.clone(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRecheckQueue {
    items: Mutex<VecDeque<RecheckRequest>>,
}

impl MemoryRecheckQueue {
    pub fn pending(&self) -> Vec<RecheckRequest> {
        self.items.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl RecheckQueue for MemoryRecheckQueue {
    async fn enqueue(&self, request: &RecheckRequest) -> Result<(), QueueError> {
        self.items.lock().unwrap().push_back(request.clone());
        Ok(())
    }

    async fn next(&self, _timeout: Duration) -> Result<Option<RecheckRequest>, QueueError> {
        Ok(self.items.lock().unwrap().pop_front())
    }
}

#[derive(Default)]
pub struct MemoryResumeStorage {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryResumeStorage {
    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl ResumeStorage for MemoryResumeStorage {
    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> Result<(), StorageError> {
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Run lock
// ──────────────────────────────────────────────

/// A `PipelineLocks` shared between orchestrators stands in for the advisory lock
/// another process would hold.
#[async_trait]
impl RunLock for PipelineLocks {
    async fn try_lock(&self, pipeline_id: Uuid) -> Result<Option<Box<dyn RunLease>>, RepoError> {
        Ok(self
            .try_acquire(pipeline_id)
            .map(|guard| Box::new(guard) as Box<dyn RunLease>))
    }
}

#[async_trait]
impl RunLease for PipelineGuard {
    async fn release(self: Box<Self>) {}
}
