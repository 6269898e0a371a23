//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. Every mutation goes through
//! the store's single-owner funnel; single-row reads use the direct read path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interview_core::domain::{
    Candidate, InterviewerEntry, Session, SessionMetadata, SessionStatus, User,
};
use interview_core::ports::{DatabaseService, PortError, PortResult};
use std::sync::Arc;

use crate::adapters::store::{SqlValue, Statement, Store, StoreError, StoreRow};

const SESSION_COLUMNS: &str = "id, candidate_id, candidate_name, candidate_email, candidate_rating, \
     metadata_interview_time, metadata_duration, metadata_interview_type, metadata_status, \
     metadata_link, metadata_date, metadata_timezone, created_by, feedback, notes, created_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    store: Arc<Store>,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    async fn load_interviewers(&self, session_id: &str) -> PortResult<Vec<InterviewerEntry>> {
        let outcome = self
            .store
            .query(
                "SELECT interviewer_id, interviewer_name, interviewer_email, rating, feedback, notes \
                 FROM session_feedback WHERE session_id = ? ORDER BY rowid ASC",
                vec![session_id.into()],
            )
            .await
            .map_err(unexpected)?;

        outcome
            .rows
            .iter()
            .map(|row| InterviewerRecord::from_row(row).map(InterviewerRecord::to_domain))
            .collect::<Result<_, _>>()
            .map_err(unexpected)
    }
}

fn unexpected(e: StoreError) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

struct UserRecord {
    id: String,
    email: String,
    name: String,
    role: String,
    password_hash: String,
}
impl UserRecord {
    fn from_row(row: &StoreRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.text("id")?,
            email: row.text("email")?,
            name: row.text("name")?,
            role: row.text("role")?,
            password_hash: row.text("password_hash")?,
        })
    }

    fn to_domain(self) -> User {
        User {
            id: self.id,
            email: self.email,
            name: self.name,
            role: self.role,
            password_hash: self.password_hash,
        }
    }
}

struct SessionRecord {
    id: String,
    candidate_id: String,
    candidate_name: String,
    candidate_email: String,
    candidate_rating: i64,
    interview_time: String,
    duration: i64,
    interview_type: String,
    status: String,
    link: String,
    date: String,
    timezone: String,
    created_by: Option<String>,
    feedback: String,
    notes: String,
    created_at: Option<String>,
}
impl SessionRecord {
    fn from_row(row: &StoreRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.text("id")?,
            candidate_id: row.text("candidate_id")?,
            candidate_name: row.text("candidate_name")?,
            candidate_email: row.text("candidate_email")?,
            candidate_rating: row.integer("candidate_rating")?,
            interview_time: row.text("metadata_interview_time")?,
            duration: row.integer("metadata_duration")?,
            interview_type: row.text("metadata_interview_type")?,
            status: row.text("metadata_status")?,
            link: row.text("metadata_link")?,
            date: row.text("metadata_date")?,
            timezone: row.text("metadata_timezone")?,
            created_by: row.opt_text("created_by")?,
            feedback: row.text("feedback")?,
            notes: row.text("notes")?,
            created_at: row.opt_text("created_at")?,
        })
    }

    fn to_domain(self) -> PortResult<Session> {
        let status = self
            .status
            .parse::<SessionStatus>()
            .map_err(|e| PortError::Unexpected(format!("session {}: {}", self.id, e)))?;
        // Rows written before `created_at` existed fall back to the interview time.
        let created_at = self
            .created_at
            .as_deref()
            .or(Some(self.interview_time.as_str()))
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(Session {
            candidate: Candidate {
                id: self.candidate_id,
                name: self.candidate_name,
                email: self.candidate_email,
            },
            interviewers: Vec::new(),
            metadata: SessionMetadata {
                interview_time: self.interview_time,
                duration: self.duration,
                interview_type: self.interview_type,
                status,
                link: self.link,
                date: self.date,
                timezone: self.timezone,
            },
            created_by: self.created_by,
            rating: u8::try_from(self.candidate_rating).unwrap_or(u8::MAX),
            feedback: self.feedback,
            notes: self.notes,
            created_at,
            id: self.id,
        })
    }
}

struct InterviewerRecord {
    interviewer_id: String,
    interviewer_name: String,
    interviewer_email: String,
    rating: i64,
    feedback: String,
    notes: String,
}
impl InterviewerRecord {
    fn from_row(row: &StoreRow) -> Result<Self, StoreError> {
        Ok(Self {
            interviewer_id: row.text("interviewer_id")?,
            interviewer_name: row.text("interviewer_name")?,
            interviewer_email: row.text("interviewer_email")?,
            rating: row.integer("rating")?,
            feedback: row.text("feedback")?,
            notes: row.text("notes")?,
        })
    }

    fn to_domain(self) -> InterviewerEntry {
        InterviewerEntry {
            id: self.interviewer_id,
            name: self.interviewer_name,
            email: self.interviewer_email,
            rating: u8::try_from(self.rating).unwrap_or(u8::MAX),
            feedback: self.feedback,
            notes: self.notes,
        }
    }
}

fn upsert_feedback(session_id: &str, entry: &InterviewerEntry) -> Statement {
    Statement::new(
        "INSERT INTO session_feedback \
             (session_id, interviewer_id, interviewer_name, interviewer_email, rating, feedback, notes) \
         VALUES (?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (session_id, interviewer_id) DO UPDATE SET \
             interviewer_name = excluded.interviewer_name, \
             interviewer_email = excluded.interviewer_email, \
             rating = excluded.rating, \
             feedback = excluded.feedback, \
             notes = excluded.notes",
        vec![
            session_id.into(),
            entry.id.as_str().into(),
            entry.name.as_str().into(),
            entry.email.as_str().into(),
            entry.rating.into(),
            entry.feedback.as_str().into(),
            entry.notes.as_str().into(),
        ],
    )
}

/// Like [`upsert_feedback`], but writes nothing unless the session exists and
/// is still `created`.
fn upsert_open_feedback(session_id: &str, entry: &InterviewerEntry) -> Statement {
    Statement::new(
        "INSERT INTO session_feedback \
             (session_id, interviewer_id, interviewer_name, interviewer_email, rating, feedback, notes) \
         SELECT ?, ?, ?, ?, ?, ?, ? \
         WHERE EXISTS (SELECT 1 FROM sessions WHERE id = ? AND metadata_status = ?) \
         ON CONFLICT (session_id, interviewer_id) DO UPDATE SET \
             interviewer_name = excluded.interviewer_name, \
             interviewer_email = excluded.interviewer_email, \
             rating = excluded.rating, \
             feedback = excluded.feedback, \
             notes = excluded.notes",
        vec![
            session_id.into(),
            entry.id.as_str().into(),
            entry.name.as_str().into(),
            entry.email.as_str().into(),
            entry.rating.into(),
            entry.feedback.as_str().into(),
            entry.notes.as_str().into(),
            session_id.into(),
            SessionStatus::Created.as_str().into(),
        ],
    )
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, user: &User) -> PortResult<()> {
        self.store
            .query(
                "INSERT INTO users (id, email, name, role, password_hash) VALUES (?, ?, ?, ?, ?)",
                vec![
                    user.id.as_str().into(),
                    user.email.as_str().into(),
                    user.name.as_str().into(),
                    user.role.as_str().into(),
                    user.password_hash.as_str().into(),
                ],
            )
            .await
            .map_err(|e| match e {
                StoreError::Sqlx(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    PortError::Conflict(format!("User with email {} already exists", user.email))
                }
                other => unexpected(other),
            })?;
        Ok(())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<User> {
        let row = self
            .store
            .query_row(
                "SELECT id, email, name, role, password_hash FROM users WHERE email = ?",
                vec![email.into()],
            )
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))?;

        Ok(UserRecord::from_row(&row).map_err(unexpected)?.to_domain())
    }

    async fn insert_session(&self, session: &Session) -> PortResult<()> {
        let mut statements = vec![Statement::new(
            "INSERT INTO sessions ( \
                 id, candidate_id, candidate_name, candidate_email, candidate_rating, \
                 metadata_interview_time, metadata_duration, metadata_interview_type, \
                 metadata_status, metadata_link, metadata_date, metadata_timezone, \
                 created_by, feedback, notes, created_at \
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, (SELECT id FROM users WHERE id = ?), ?, ?, ?)",
            vec![
                session.id.as_str().into(),
                session.candidate.id.as_str().into(),
                session.candidate.name.as_str().into(),
                session.candidate.email.as_str().into(),
                session.rating.into(),
                session.metadata.interview_time.as_str().into(),
                session.metadata.duration.into(),
                session.metadata.interview_type.as_str().into(),
                session.metadata.status.as_str().into(),
                session.metadata.link.as_str().into(),
                session.metadata.date.as_str().into(),
                session.metadata.timezone.as_str().into(),
                SqlValue::from(session.created_by.clone()),
                session.feedback.as_str().into(),
                session.notes.as_str().into(),
                session.created_at.to_rfc3339().into(),
            ],
        )];
        statements.extend(
            session
                .interviewers
                .iter()
                .map(|entry| upsert_feedback(&session.id, entry)),
        );

        self.store.batch(statements).await.map_err(unexpected)?;
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> PortResult<Session> {
        let row = self
            .store
            .query_row(
                &format!("SELECT {} FROM sessions WHERE id = ?", SESSION_COLUMNS),
                vec![session_id.into()],
            )
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;

        let mut session = SessionRecord::from_row(&row).map_err(unexpected)?.to_domain()?;
        session.interviewers = self.load_interviewers(session_id).await?;
        Ok(session)
    }

    async fn list_active_sessions(&self) -> PortResult<Vec<Session>> {
        let outcome = self
            .store
            .query(
                &format!(
                    "SELECT {} FROM sessions WHERE metadata_status = ? ORDER BY created_at ASC",
                    SESSION_COLUMNS
                ),
                vec![SessionStatus::Created.as_str().into()],
            )
            .await
            .map_err(unexpected)?;

        outcome
            .rows
            .iter()
            .map(|row| SessionRecord::from_row(row).map_err(unexpected)?.to_domain())
            .collect()
    }

    async fn transition_status(&self, session_id: &str, status: SessionStatus) -> PortResult<bool> {
        let outcome = self
            .store
            .query(
                "UPDATE sessions SET metadata_status = ? WHERE id = ? AND metadata_status = ?",
                vec![
                    status.as_str().into(),
                    session_id.into(),
                    SessionStatus::Created.as_str().into(),
                ],
            )
            .await
            .map_err(unexpected)?;
        Ok(outcome.rows_affected == 1)
    }

    async fn save_feedback(&self, session_id: &str, entry: &InterviewerEntry) -> PortResult<()> {
        let refresh_row = Statement::new(
            "UPDATE sessions SET \
                 feedback = ?, \
                 notes = ?, \
                 candidate_rating = ( \
                     SELECT COALESCE(SUM(rating) / COUNT(*), 0) \
                     FROM session_feedback WHERE session_id = ? \
                 ) \
             WHERE id = ? AND metadata_status = ?",
            vec![
                entry.feedback.as_str().into(),
                entry.notes.as_str().into(),
                session_id.into(),
                session_id.into(),
                SessionStatus::Created.as_str().into(),
            ],
        );

        // Both statements only touch a session still in `created`, and the batch
        // is ordered against `transition_status` by the store funnel.
        let outcome = self
            .store
            .batch(vec![upsert_open_feedback(session_id, entry), refresh_row])
            .await
            .map_err(unexpected)?;
        if outcome.rows_affected > 0 {
            return Ok(());
        }

        let status = self
            .store
            .query_row(
                "SELECT metadata_status FROM sessions WHERE id = ?",
                vec![session_id.into()],
            )
            .await
            .map_err(unexpected)?;
        match status {
            None => Err(PortError::NotFound(format!("Session {} not found", session_id))),
            Some(row) => Err(PortError::Conflict(format!(
                "Session {} is already {}",
                session_id,
                row.text("metadata_status").map_err(unexpected)?
            ))),
        }
    }
}
