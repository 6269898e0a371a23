//! services/api/src/web/dto.rs
//!
//! JSON request and response payloads and their conversions to and from the
//! core domain types.

use interview_core::domain::{
    Candidate, InterviewerEntry, InterviewerFeedback, Session, SessionMetadata, SessionView,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::engine::{FeedbackInput, SessionDraft};

//=========================================================================================
// Auth Payloads
//=========================================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DevLoginQuery {
    /// Role to embed in the issued token.
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
    pub role: String,
}

//=========================================================================================
// Session Payloads
//=========================================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CandidateDto {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct InterviewerDto {
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    pub rating: u8,
    pub feedback: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

/// An interviewer entry in a role-filtered view: only who wrote what.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InterviewerFeedbackDto {
    pub id: String,
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MetadataDto {
    pub interview_time: String,
    pub duration: i64,
    pub interview_type: String,
    pub interview_status: String,
    pub interview_link: String,
    pub interview_date: String,
    pub interview_time_zone: String,
}

/// The body of `POST /api/create-session`. Every field is optional. A
/// client-sent `id`, `interview_status` or `interview_link` is dropped.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateSessionRequest {
    pub candidate: CandidateDto,
    pub interviewer: Vec<InterviewerDto>,
    pub metadata: MetadataOverrides,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct MetadataOverrides {
    pub interview_time: Option<String>,
    pub duration: Option<i64>,
    pub interview_type: Option<String>,
    pub interview_date: Option<String>,
    pub interview_time_zone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionDto {
    pub id: String,
    pub candidate: CandidateDto,
    pub interviewer: Vec<InterviewerDto>,
    pub metadata: MetadataDto,
}

/// A session as seen by a particular role.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionViewDto {
    pub id: String,
    pub metadata: MetadataDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interviewer: Option<Vec<InterviewerFeedbackDto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct FeedbackRequest {
    pub feedback: String,
    pub interview_notes: String,
    pub rating: u8,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CancelResponse {
    pub id: String,
    pub status: String,
}

//=========================================================================================
// Conversions
//=========================================================================================

impl From<CandidateDto> for Candidate {
    fn from(dto: CandidateDto) -> Self {
        Candidate {
            id: dto.id,
            name: dto.name,
            email: dto.email,
        }
    }
}

impl From<&Candidate> for CandidateDto {
    fn from(candidate: &Candidate) -> Self {
        CandidateDto {
            id: candidate.id.clone(),
            name: candidate.name.clone(),
            email: candidate.email.clone(),
        }
    }
}

impl From<InterviewerDto> for InterviewerEntry {
    fn from(dto: InterviewerDto) -> Self {
        InterviewerEntry {
            id: dto.id,
            name: dto.name,
            email: dto.email,
            rating: dto.rating,
            feedback: dto.feedback,
            notes: dto.notes,
        }
    }
}

impl From<&InterviewerEntry> for InterviewerDto {
    fn from(entry: &InterviewerEntry) -> Self {
        InterviewerDto {
            id: entry.id.clone(),
            name: entry.name.clone(),
            email: entry.email.clone(),
            rating: entry.rating,
            feedback: entry.feedback.clone(),
            notes: entry.notes.clone(),
        }
    }
}

impl From<InterviewerFeedback> for InterviewerFeedbackDto {
    fn from(entry: InterviewerFeedback) -> Self {
        InterviewerFeedbackDto {
            id: entry.id,
            feedback: entry.feedback,
        }
    }
}

impl From<&SessionMetadata> for MetadataDto {
    fn from(metadata: &SessionMetadata) -> Self {
        MetadataDto {
            interview_time: metadata.interview_time.clone(),
            duration: metadata.duration,
            interview_type: metadata.interview_type.clone(),
            interview_status: metadata.status.to_string(),
            interview_link: metadata.link.clone(),
            interview_date: metadata.date.clone(),
            interview_time_zone: metadata.timezone.clone(),
        }
    }
}

impl From<&Session> for SessionDto {
    fn from(session: &Session) -> Self {
        SessionDto {
            id: session.id.clone(),
            candidate: (&session.candidate).into(),
            interviewer: session.interviewers.iter().map(Into::into).collect(),
            metadata: (&session.metadata).into(),
        }
    }
}

impl From<SessionView> for SessionViewDto {
    fn from(view: SessionView) -> Self {
        SessionViewDto {
            metadata: (&view.metadata).into(),
            interviewer: view
                .interviewers
                .map(|entries| entries.into_iter().map(Into::into).collect()),
            notes: view.notes,
            rating: view.rating,
            id: view.id,
        }
    }
}

impl From<CreateSessionRequest> for SessionDraft {
    fn from(req: CreateSessionRequest) -> Self {
        let metadata = req.metadata;
        SessionDraft {
            candidate: req.candidate.into(),
            interviewers: req.interviewer.into_iter().map(Into::into).collect(),
            interview_time: metadata.interview_time,
            duration: metadata.duration,
            interview_type: metadata.interview_type,
            interview_date: metadata.interview_date,
            timezone: metadata.interview_time_zone,
        }
    }
}

impl From<FeedbackRequest> for FeedbackInput {
    fn from(req: FeedbackRequest) -> Self {
        FeedbackInput {
            feedback: req.feedback,
            notes: req.interview_notes,
            rating: req.rating,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_body_fills_defaults() {
        let req: CreateSessionRequest =
            serde_json::from_str(r#"{"candidate":{"name":"A","email":"a@x"}}"#).unwrap();
        let draft: SessionDraft = req.into();
        assert_eq!(draft.candidate.name, "A");
        assert_eq!(draft.candidate.email, "a@x");
        assert!(draft.candidate.id.is_empty());
        assert!(draft.interviewers.is_empty());
        assert_eq!(draft.duration, None);
    }

    #[test]
    fn metadata_overrides_are_read() {
        let req: CreateSessionRequest = serde_json::from_str(
            r#"{"id":"ignored","metadata":{"duration":30,"interview_time_zone":"Asia/Tokyo","interview_status":"completed"}}"#,
        )
        .unwrap();
        let draft: SessionDraft = req.into();
        assert_eq!(draft.duration, Some(30));
        assert_eq!(draft.timezone.as_deref(), Some("Asia/Tokyo"));
    }

    #[test]
    fn rating_outside_u8_is_rejected() {
        let result: Result<FeedbackRequest, _> =
            serde_json::from_str(r#"{"feedback":"f","interview_notes":"n","rating":256}"#);
        assert!(result.is_err());
    }

    #[test]
    fn view_omits_absent_fields() {
        let view = SessionViewDto {
            id: "s".into(),
            metadata: MetadataDto {
                interview_time: "t".into(),
                duration: 1,
                interview_type: "technical".into(),
                interview_status: "created".into(),
                interview_link: "l".into(),
                interview_date: "d".into(),
                interview_time_zone: "UTC".into(),
            },
            interviewer: None,
            notes: None,
            rating: None,
        };
        let json = serde_json::to_value(&view).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert!(object.contains_key("metadata"));
    }

    #[test]
    fn interviewer_view_entries_carry_only_id_and_feedback() {
        use chrono::Utc;
        use interview_core::domain::SessionStatus;

        let session = Session {
            id: "s".into(),
            candidate: Candidate::default(),
            interviewers: vec![InterviewerEntry {
                id: "i-1".into(),
                name: "Ivy".into(),
                email: "ivy@example.com".into(),
                rating: 5,
                feedback: "sharp".into(),
                notes: "private".into(),
            }],
            metadata: SessionMetadata {
                interview_time: "t".into(),
                duration: 1,
                interview_type: "technical".into(),
                status: SessionStatus::Created,
                link: "l".into(),
                date: "d".into(),
                timezone: "UTC".into(),
            },
            created_by: None,
            rating: 0,
            feedback: String::new(),
            notes: String::new(),
            created_at: Utc::now(),
        };

        let view = SessionViewDto::from(session.to_view("interviewer"));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(
            json["interviewer"],
            serde_json::json!([{ "id": "i-1", "feedback": "sharp" }])
        );
        assert_eq!(json["rating"], 5);
    }
}
