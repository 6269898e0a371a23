//! services/api/src/engine/mod.rs
//!
//! The session engine: creates sessions, starts their lifecycle workers, records
//! interviewer feedback and cancels sessions. All persistence goes through the
//! `DatabaseService` port.

pub mod lifecycle;
pub mod registry;

use chrono::{DateTime, Local, NaiveDate, SecondsFormat, Utc};
use interview_core::domain::{
    Candidate, InterviewerEntry, Session, SessionMetadata, SessionStatus, UserClaims,
    DEFAULT_DURATION, DEFAULT_INTERVIEW_TYPE, DEFAULT_TIMEZONE,
};
use interview_core::ports::{DatabaseService, PortError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

pub use registry::SessionRegistry;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Port(#[from] PortError),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Client-supplied fields for a new session. Anything left `None` takes the
/// default; the id, status and link are always assigned by the engine.
#[derive(Debug, Clone, Default)]
pub struct SessionDraft {
    pub candidate: Candidate,
    pub interviewers: Vec<InterviewerEntry>,
    pub interview_time: Option<String>,
    pub duration: Option<i64>,
    pub interview_type: Option<String>,
    pub interview_date: Option<String>,
    pub timezone: Option<String>,
}

/// One interviewer's submission for a session.
#[derive(Debug, Clone, Default)]
pub struct FeedbackInput {
    pub feedback: String,
    pub notes: String,
    pub rating: u8,
}

pub struct SessionEngine {
    db: Arc<dyn DatabaseService>,
    registry: SessionRegistry,
    base_url: String,
    duration_unit: Duration,
}

impl SessionEngine {
    /// `base_url` prefixes every session link; `duration_unit` is the wall-clock
    /// length of one unit of `metadata.duration`.
    pub fn new(db: Arc<dyn DatabaseService>, base_url: impl Into<String>, duration_unit: Duration) -> Self {
        Self {
            db,
            registry: SessionRegistry::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            duration_unit,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    fn run_time(&self, duration: i64) -> Duration {
        let units = u32::try_from(duration.max(0)).unwrap_or(u32::MAX);
        self.duration_unit.saturating_mul(units)
    }

    /// Builds, persists and starts a new session.
    #[instrument(skip_all, fields(created_by = %caller.user_id))]
    pub async fn create_session(&self, draft: SessionDraft, caller: &UserClaims) -> EngineResult<Session> {
        let duration = draft.duration.unwrap_or(DEFAULT_DURATION);
        if duration <= 0 {
            return Err(EngineError::InvalidInput("duration must be a positive number".to_string()));
        }
        if let Some(time) = &draft.interview_time {
            DateTime::parse_from_rfc3339(time).map_err(|_| {
                EngineError::InvalidInput(format!("interview_time '{}' is not an RFC3339 timestamp", time))
            })?;
        }
        if let Some(date) = &draft.interview_date {
            NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                EngineError::InvalidInput(format!("interview_date '{}' is not YYYY-MM-DD", date))
            })?;
        }

        let id = Uuid::new_v4().to_string();
        let now = Local::now();
        let mut candidate = draft.candidate;
        if candidate.id.is_empty() {
            candidate.id = Uuid::new_v4().to_string();
        }

        let session = Session {
            candidate,
            metadata: SessionMetadata {
                interview_time: draft
                    .interview_time
                    .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Secs, true)),
                duration,
                interview_type: non_empty_or(draft.interview_type, DEFAULT_INTERVIEW_TYPE),
                status: SessionStatus::Created,
                link: format!("{}/api/session/{}", self.base_url, id),
                date: draft
                    .interview_date
                    .unwrap_or_else(|| now.format("%Y-%m-%d").to_string()),
                timezone: non_empty_or(draft.timezone, DEFAULT_TIMEZONE),
            },
            rating: interview_core::average_rating(&draft.interviewers),
            interviewers: draft.interviewers,
            created_by: Some(caller.user_id.clone()),
            feedback: String::new(),
            notes: String::new(),
            created_at: Utc::now(),
            id,
        };

        self.db.insert_session(&session).await?;
        self.registry
            .spawn_worker(self.db.clone(), &session.id, self.run_time(duration))
            .await;

        info!(session_id = %session.id, duration, "Session created");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str) -> EngineResult<Session> {
        require_id(session_id)?;
        Ok(self.db.get_session(session_id).await?)
    }

    /// Records the caller's feedback. Sessions that already reached a terminal
    /// state are rejected.
    #[instrument(skip_all, fields(session_id = %session_id, interviewer = %caller.user_id))]
    pub async fn add_feedback(
        &self,
        session_id: &str,
        caller: &UserClaims,
        input: FeedbackInput,
    ) -> EngineResult<()> {
        require_id(session_id)?;
        let session = self.db.get_session(session_id).await?;
        if session.metadata.status.is_terminal() {
            return Err(PortError::Conflict(format!(
                "Session {} is already {}",
                session_id, session.metadata.status
            ))
            .into());
        }

        let entry = InterviewerEntry {
            id: caller.user_id.clone(),
            name: caller.name.clone(),
            email: caller.email.clone(),
            rating: input.rating,
            feedback: input.feedback,
            notes: input.notes,
        };
        self.db.save_feedback(session_id, &entry).await?;
        info!(rating = entry.rating, "Feedback saved");
        Ok(())
    }

    /// Cancels a running session and returns the terminal status it ended in.
    /// The worker may have completed first, in which case that status wins.
    #[instrument(skip(self))]
    pub async fn cancel_session(&self, session_id: &str) -> EngineResult<SessionStatus> {
        require_id(session_id)?;
        if self.registry.cancel(session_id).await.is_none() {
            let session = self.db.get_session(session_id).await?;
            return Err(PortError::Conflict(format!(
                "Session {} is not running (status {})",
                session_id, session.metadata.status
            ))
            .into());
        }

        let status = self.db.get_session(session_id).await?.metadata.status;
        info!(status = %status, "Session cancel finished");
        Ok(status)
    }

    /// Restarts workers for sessions left in the `created` state by a previous
    /// run. Each timer gets whatever remains of its original window.
    pub async fn resume_active_sessions(&self) -> EngineResult<usize> {
        let sessions = self.db.list_active_sessions().await?;
        let now = Utc::now();
        for session in &sessions {
            let elapsed = (now - session.created_at).to_std().unwrap_or_default();
            let remaining = self.run_time(session.metadata.duration).saturating_sub(elapsed);
            self.registry
                .spawn_worker(self.db.clone(), &session.id, remaining)
                .await;
        }
        info!(count = sessions.len(), "Resumed active sessions");
        Ok(sessions.len())
    }

    /// Stops all workers without touching their persisted status.
    pub async fn shutdown(&self) {
        self.registry.abort_all().await;
    }
}

fn require_id(session_id: &str) -> EngineResult<()> {
    if session_id.trim().is_empty() {
        return Err(EngineError::InvalidInput("Session ID is required".to_string()));
    }
    Ok(())
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{DbAdapter, Store};
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    const UNIT: Duration = Duration::from_millis(20);

    struct Harness {
        _dir: TempDir,
        store: Arc<Store>,
        db: Arc<dyn DatabaseService>,
        engine: SessionEngine,
    }

    impl Harness {
        async fn new(unit: Duration) -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let store = Arc::new(Store::open(dir.path().join("engine.db")).await.expect("open"));
            let db: Arc<dyn DatabaseService> = Arc::new(DbAdapter::new(store.clone()));
            let engine = SessionEngine::new(db.clone(), "http://localhost:8080/", unit);
            Self {
                _dir: dir,
                store,
                db,
                engine,
            }
        }

        async fn close(self) {
            self.engine.shutdown().await;
            self.store.shutdown().await;
        }
    }

    fn caller(role: &str) -> UserClaims {
        let now = Utc::now();
        UserClaims {
            user_id: "caller-1".to_string(),
            email: "caller@example.com".to_string(),
            name: "Caller".to_string(),
            role: role.to_string(),
            issuer: "interview-system".to_string(),
            issued_at: now,
            not_before: now,
            expires_at: now + ChronoDuration::hours(24),
        }
    }

    fn draft(duration: Option<i64>) -> SessionDraft {
        SessionDraft {
            candidate: Candidate {
                id: String::new(),
                name: "A".to_string(),
                email: "a@x".to_string(),
            },
            duration,
            ..Default::default()
        }
    }

    async fn wait_for_status(db: &Arc<dyn DatabaseService>, id: &str, status: SessionStatus) -> bool {
        for _ in 0..100 {
            if db.get_session(id).await.unwrap().metadata.status == status {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn create_applies_defaults_and_starts_worker() {
        let h = Harness::new(Duration::from_secs(60)).await;
        let session = h
            .engine
            .create_session(draft(None), &caller("interviewer"))
            .await
            .unwrap();

        assert_eq!(session.metadata.duration, 180);
        assert_eq!(session.metadata.status, SessionStatus::Created);
        assert_eq!(session.metadata.interview_type, "technical");
        assert_eq!(session.metadata.timezone, "UTC");
        assert_eq!(
            session.metadata.link,
            format!("http://localhost:8080/api/session/{}", session.id)
        );
        assert!(NaiveDate::parse_from_str(&session.metadata.date, "%Y-%m-%d").is_ok());
        assert!(DateTime::parse_from_rfc3339(&session.metadata.interview_time).is_ok());
        assert!(!session.candidate.id.is_empty());
        assert!(h.engine.registry().is_active(&session.id).await);

        let loaded = h.engine.get_session(&session.id).await.unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.metadata.status, SessionStatus::Created);
        h.close().await;
    }

    #[tokio::test]
    async fn overrides_are_merged() {
        let h = Harness::new(Duration::from_secs(60)).await;
        let mut d = draft(Some(45));
        d.interview_type = Some("behavioral".to_string());
        d.timezone = Some("Europe/Paris".to_string());
        d.interview_date = Some("2030-02-03".to_string());
        d.interview_time = Some("2030-02-03T10:00:00+01:00".to_string());
        let session = h.engine.create_session(d, &caller("interviewer")).await.unwrap();

        let loaded = h.engine.get_session(&session.id).await.unwrap();
        assert_eq!(loaded.metadata.duration, 45);
        assert_eq!(loaded.metadata.interview_type, "behavioral");
        assert_eq!(loaded.metadata.timezone, "Europe/Paris");
        assert_eq!(loaded.metadata.date, "2030-02-03");
        assert_eq!(loaded.metadata.interview_time, "2030-02-03T10:00:00+01:00");
        h.close().await;
    }

    #[tokio::test]
    async fn invalid_drafts_are_rejected() {
        let h = Harness::new(UNIT).await;
        for d in [
            draft(Some(0)),
            draft(Some(-5)),
            SessionDraft {
                interview_time: Some("tomorrow".to_string()),
                ..Default::default()
            },
            SessionDraft {
                interview_date: Some("03/02/2030".to_string()),
                ..Default::default()
            },
        ] {
            let result = h.engine.create_session(d, &caller("interviewer")).await;
            assert!(matches!(result, Err(EngineError::InvalidInput(_))));
        }
        assert_eq!(h.engine.registry().active_count().await, 0);
        h.close().await;
    }

    #[tokio::test]
    async fn timer_completes_session_once() {
        let h = Harness::new(UNIT).await;
        let session = h
            .engine
            .create_session(draft(Some(1)), &caller("interviewer"))
            .await
            .unwrap();

        assert!(wait_for_status(&h.db, &session.id, SessionStatus::Completed).await);
        for _ in 0..50 {
            if !h.engine.registry().is_active(&session.id).await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!h.engine.registry().is_active(&session.id).await);

        // Terminal: cancel cannot move it and feedback is refused.
        assert!(matches!(
            h.engine.cancel_session(&session.id).await,
            Err(EngineError::Port(PortError::Conflict(_)))
        ));
        let result = h
            .engine
            .add_feedback(&session.id, &caller("interviewer"), FeedbackInput::default())
            .await;
        assert!(matches!(result, Err(EngineError::Port(PortError::Conflict(_)))));
        assert_eq!(
            h.engine.get_session(&session.id).await.unwrap().metadata.status,
            SessionStatus::Completed
        );
        h.close().await;
    }

    #[tokio::test]
    async fn cancel_moves_session_to_canceled() {
        let h = Harness::new(Duration::from_secs(60)).await;
        let session = h
            .engine
            .create_session(draft(None), &caller("interviewer"))
            .await
            .unwrap();

        let status = h.engine.cancel_session(&session.id).await.unwrap();
        assert_eq!(status, SessionStatus::Canceled);
        assert!(!h.engine.registry().is_active(&session.id).await);
        assert_eq!(
            h.engine.get_session(&session.id).await.unwrap().metadata.status,
            SessionStatus::Canceled
        );

        assert!(matches!(
            h.engine.cancel_session(&session.id).await,
            Err(EngineError::Port(PortError::Conflict(_)))
        ));
        h.close().await;
    }

    #[tokio::test]
    async fn cancel_racing_the_timer_ends_in_exactly_one_state() {
        let h = Harness::new(UNIT).await;
        for _ in 0..10 {
            let session = h
                .engine
                .create_session(draft(Some(1)), &caller("interviewer"))
                .await
                .unwrap();
            // Let the timer get close to firing before cancelling.
            tokio::time::sleep(UNIT).await;

            let persisted = match h.engine.cancel_session(&session.id).await {
                Ok(returned) => {
                    assert!(returned.is_terminal(), "{returned}");
                    let persisted = h.engine.get_session(&session.id).await.unwrap().metadata.status;
                    assert_eq!(returned, persisted);
                    persisted
                }
                // The worker finished and released itself before the cancel arrived.
                Err(EngineError::Port(PortError::Conflict(_))) => {
                    h.engine.get_session(&session.id).await.unwrap().metadata.status
                }
                Err(e) => panic!("unexpected cancel error: {e:?}"),
            };
            assert!(
                matches!(persisted, SessionStatus::Completed | SessionStatus::Canceled),
                "{persisted}"
            );

            // Neither terminal state can be overwritten afterwards.
            for next in [SessionStatus::Completed, SessionStatus::Canceled] {
                assert!(!h.db.transition_status(&session.id, next).await.unwrap());
            }
            assert_eq!(
                h.engine.get_session(&session.id).await.unwrap().metadata.status,
                persisted
            );
            assert!(!h.engine.registry().is_active(&session.id).await);
        }
        h.close().await;
    }

    #[tokio::test]
    async fn cancel_unknown_session_is_not_found() {
        let h = Harness::new(UNIT).await;
        assert!(matches!(
            h.engine.cancel_session("missing").await,
            Err(EngineError::Port(PortError::NotFound(_)))
        ));
        assert!(matches!(
            h.engine.cancel_session("  ").await,
            Err(EngineError::InvalidInput(_))
        ));
        h.close().await;
    }

    #[tokio::test]
    async fn feedback_is_recorded_per_interviewer() {
        let h = Harness::new(Duration::from_secs(60)).await;
        let session = h
            .engine
            .create_session(draft(None), &caller("interviewer"))
            .await
            .unwrap();

        h.engine
            .add_feedback(
                &session.id,
                &caller("interviewer"),
                FeedbackInput {
                    feedback: "good".to_string(),
                    notes: "n".to_string(),
                    rating: 4,
                },
            )
            .await
            .unwrap();

        let loaded = h.engine.get_session(&session.id).await.unwrap();
        assert_eq!(loaded.interviewers.len(), 1);
        assert_eq!(loaded.interviewers[0].id, "caller-1");
        assert_eq!(loaded.interviewers[0].name, "Caller");
        assert_eq!(loaded.aggregate_rating(), 4);
        assert_eq!(loaded.to_view("interviewer").rating, Some(4));
        assert_eq!(loaded.to_view("candidate").rating, None);
        h.close().await;
    }

    #[tokio::test]
    async fn feedback_for_unknown_session_is_not_found() {
        let h = Harness::new(UNIT).await;
        let result = h
            .engine
            .add_feedback("abc", &caller("interviewer"), FeedbackInput::default())
            .await;
        assert!(matches!(result, Err(EngineError::Port(PortError::NotFound(_)))));
        h.close().await;
    }

    #[tokio::test]
    async fn resume_restarts_remaining_timers() {
        let h = Harness::new(UNIT).await;
        // A session whose window has already elapsed, as if left over by a crash.
        let mut stale = h
            .engine
            .create_session(draft(Some(1_000)), &caller("interviewer"))
            .await
            .unwrap();
        h.engine.shutdown().await;
        assert_eq!(h.engine.registry().active_count().await, 0);

        stale.id = "stale".to_string();
        stale.created_at = Utc::now() - ChronoDuration::hours(1);
        h.db.insert_session(&stale).await.unwrap();

        let resumed = h.engine.resume_active_sessions().await.unwrap();
        assert_eq!(resumed, 2);
        assert!(wait_for_status(&h.db, "stale", SessionStatus::Completed).await);
        h.close().await;
    }
}
