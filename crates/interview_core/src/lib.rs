pub mod domain;
pub mod ports;

pub use domain::{
    average_rating, Candidate, InterviewerEntry, InterviewerFeedback, Session, SessionMetadata,
    SessionStatus, SessionView, User, UserClaims, INTERVIEWER_ROLE,
};
pub use ports::{AuthError, DatabaseService, PortError, PortResult, TokenService};
