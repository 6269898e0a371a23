//! crates/interview_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete store and token implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{InterviewerEntry, Session, SessionStatus, User, UserClaims};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all persistence port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Failures of token issuance and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("token secret is not configured")]
    Config,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token is not signed with HS256")]
    BadAlgorithm,
    #[error("token expired")]
    Expired,
    #[error("token is not yet valid")]
    NotYetValid,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn create_user(&self, user: &User) -> PortResult<()>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<User>;

    // --- Session Management ---
    /// Persists a new session together with any interviewer entries it carries.
    async fn insert_session(&self, session: &Session) -> PortResult<()>;

    async fn get_session(&self, session_id: &str) -> PortResult<Session>;

    /// Sessions still in the `created` state.
    async fn list_active_sessions(&self) -> PortResult<Vec<Session>>;

    /// Moves a `created` session to `status`. Returns `false` when the session
    /// was not in the `created` state (or does not exist).
    async fn transition_status(&self, session_id: &str, status: SessionStatus) -> PortResult<bool>;

    /// Upserts one interviewer's feedback and refreshes the session's
    /// aggregate rating and latest feedback/notes.
    async fn save_feedback(&self, session_id: &str, entry: &InterviewerEntry) -> PortResult<()>;
}

/// Issues and validates signed bearer tokens.
pub trait TokenService: Send + Sync {
    fn issue(&self, user_id: &str, email: &str, name: &str, role: &str) -> Result<String, AuthError>;

    /// Like [`TokenService::issue`], with the validity window anchored at `now`.
    fn issue_at(
        &self,
        user_id: &str,
        email: &str,
        name: &str,
        role: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError>;

    fn validate(&self, token: &str) -> Result<UserClaims, AuthError>;

    /// Re-issues a valid token with the same identity and a fresh window.
    fn refresh(&self, token: &str) -> Result<String, AuthError> {
        let claims = self.validate(token)?;
        self.issue(&claims.user_id, &claims.email, &claims.name, &claims.role)
    }
}
