//! crates/interview_core/src/domain.rs
//!
//! Defines the pure, core data structures for the interview session service.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// The role that may record feedback and see sensitive session fields.
pub const INTERVIEWER_ROLE: &str = "interviewer";

/// Default interview length, in duration units (minutes in production).
pub const DEFAULT_DURATION: i64 = 180;
pub const DEFAULT_INTERVIEW_TYPE: &str = "technical";
pub const DEFAULT_TIMEZONE: &str = "UTC";

// Represents a user - created out of band, never mutated by the service.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub password_hash: String,
}

/// The person being interviewed. Lives only inside a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// One interviewer's feedback on a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterviewerEntry {
    pub id: String,
    pub name: String,
    pub email: String,
    pub rating: u8,
    pub feedback: String,
    pub notes: String,
}

/// Lifecycle status of a session.
///
/// `Created` is the only non-terminal state; both terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Created,
    Completed,
    Canceled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Created => "created",
            SessionStatus::Completed => "completed",
            SessionStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Created)
    }

    /// Whether moving from `self` to `next` is allowed by the state machine.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Created, SessionStatus::Completed)
                | (SessionStatus::Created, SessionStatus::Canceled)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored status string is not one of the known states.
#[derive(Debug, thiserror::Error)]
#[error("unknown session status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for SessionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(SessionStatus::Created),
            "completed" => Ok(SessionStatus::Completed),
            "canceled" => Ok(SessionStatus::Canceled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Scheduling and status information for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    /// RFC3339 timestamp.
    pub interview_time: String,
    /// Length in duration units; always positive.
    pub duration: i64,
    pub interview_type: String,
    pub status: SessionStatus,
    pub link: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub timezone: String,
}

/// The root entity: a scheduled interview.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub candidate: Candidate,
    pub interviewers: Vec<InterviewerEntry>,
    pub metadata: SessionMetadata,
    pub created_by: Option<String>,
    /// Aggregate rating as persisted on the session row.
    pub rating: u8,
    /// Latest feedback and notes as persisted on the session row.
    pub feedback: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// An interviewer entry as exposed in a [`SessionView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewerFeedback {
    pub id: String,
    pub feedback: String,
}

/// A projection of a session shaped for a particular caller role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub id: String,
    pub metadata: SessionMetadata,
    /// Present only for interviewers.
    pub interviewers: Option<Vec<InterviewerFeedback>>,
    pub notes: Option<String>,
    pub rating: Option<u8>,
}

/// Floor of the mean rating, or 0 for an empty list.
pub fn average_rating(interviewers: &[InterviewerEntry]) -> u8 {
    if interviewers.is_empty() {
        return 0;
    }
    let total: u32 = interviewers.iter().map(|i| u32::from(i.rating)).sum();
    // The mean of u8 values always fits in a u8.
    (total / interviewers.len() as u32) as u8
}

impl Session {
    /// The aggregate rating: the mean over loaded interviewer entries, falling
    /// back to the persisted value when no entries are loaded.
    pub fn aggregate_rating(&self) -> u8 {
        if self.interviewers.is_empty() {
            self.rating
        } else {
            average_rating(&self.interviewers)
        }
    }

    /// Projects the session for a caller with the given role.
    ///
    /// Feedback, notes and rating are only exposed to interviewers.
    pub fn to_view(&self, role: &str) -> SessionView {
        let mut view = SessionView {
            id: self.id.clone(),
            metadata: self.metadata.clone(),
            interviewers: None,
            notes: None,
            rating: None,
        };

        if role == INTERVIEWER_ROLE {
            view.interviewers = Some(
                self.interviewers
                    .iter()
                    .map(|entry| InterviewerFeedback {
                        id: entry.id.clone(),
                        feedback: entry.feedback.clone(),
                    })
                    .collect(),
            );
            view.notes = Some(self.notes.clone());
            view.rating = Some(self.aggregate_rating());
        }

        view
    }
}

/// Identity and temporal claims carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserClaims {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub issuer: String,
    pub issued_at: DateTime<Utc>,
    pub not_before: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
