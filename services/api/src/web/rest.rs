//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the session endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::dto::{
    CancelResponse, CandidateDto, CreateSessionRequest, FeedbackRequest, InterviewerDto,
    InterviewerFeedbackDto, LoginRequest, MessageResponse, MetadataDto, MetadataOverrides,
    SessionDto, SessionViewDto, TokenResponse,
};
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use interview_core::domain::UserClaims;
use interview_core::ports::PortError;
use std::sync::Arc;
use tracing::error;
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        hello_handler,
        crate::web::auth::dev_login_handler,
        crate::web::auth::login_handler,
        crate::web::auth::refresh_token_handler,
        create_session_handler,
        get_session_handler,
        add_feedback_handler,
        cancel_session_handler,
    ),
    components(
        schemas(
            TokenResponse,
            LoginRequest,
            CreateSessionRequest,
            MetadataOverrides,
            CandidateDto,
            InterviewerDto,
            InterviewerFeedbackDto,
            MetadataDto,
            SessionDto,
            SessionViewDto,
            FeedbackRequest,
            MessageResponse,
            CancelResponse,
        )
    ),
    tags(
        (name = "Interview Sessions API", description = "Scheduling, feedback and lifecycle of interview sessions."),
        (name = "Auth", description = "Bearer token issuance.")
    )
)]
pub struct ApiDoc;

fn invalid_body(rejection: JsonRejection) -> ApiError {
    error!("Rejected request body: {}", rejection.body_text());
    ApiError::BadRequest("Invalid request body".to_string())
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness greeting.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service is up", body = String)),
    tag = "Interview Sessions API"
)]
pub async fn hello_handler() -> Json<&'static str> {
    Json("Hello, world!")
}

/// Create a new session and start its lifecycle timer.
///
/// Every body field is optional. The id, status and link are always assigned
/// by the server.
#[utoipa::path(
    post,
    path = "/api/create-session",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created successfully", body = SessionDto),
        (status = 400, description = "Invalid request body"),
        (status = 401, description = "Missing or invalid token"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Interview Sessions API"
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    body: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(invalid_body)?;

    let session = app_state
        .engine
        .create_session(req.into(), &claims)
        .await
        .map_err(|e| {
            error!("Failed to create session: {:?}", e);
            ApiError::from(e)
        })?;

    Ok((StatusCode::CREATED, Json(SessionDto::from(&session))))
}

/// Fetch a session, projected for the caller's role.
#[utoipa::path(
    get,
    path = "/api/session/{id}",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "The session", body = SessionViewDto),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Session not found")
    ),
    tag = "Interview Sessions API"
)]
pub async fn get_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = app_state
        .engine
        .get_session(&session_id)
        .await
        .map_err(|e| ApiError::from(e).for_session(&session_id))?;

    Ok(Json(SessionViewDto::from(session.to_view(&claims.role))))
}

/// Record the calling interviewer's feedback for a session.
#[utoipa::path(
    post,
    path = "/api/interviewer/session/{id}/feedback",
    params(("id" = String, Path, description = "Session id")),
    request_body = FeedbackRequest,
    responses(
        (status = 200, description = "Feedback saved", body = MessageResponse),
        (status = 400, description = "Invalid request body"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is not an interviewer"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session already ended"),
        (status = 500, description = "Failed to save feedback")
    ),
    tag = "Interview Sessions API"
)]
pub async fn add_feedback_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Path(session_id): Path<String>,
    body: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(invalid_body)?;

    app_state
        .engine
        .add_feedback(&session_id, &claims, req.into())
        .await
        .map_err(|e| match ApiError::from(e).for_session(&session_id) {
            ApiError::Port(PortError::Unexpected(message)) => {
                error!("Failed to save feedback: {}", message);
                ApiError::Internal("Failed to save feedback".to_string())
            }
            other => other,
        })?;

    Ok(Json(MessageResponse {
        message: "Feedback saved successfully".to_string(),
    }))
}

/// Cancel a running session.
#[utoipa::path(
    post,
    path = "/api/interviewer/session/{id}/cancel",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session ended", body = CancelResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is not an interviewer"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session is not running")
    ),
    tag = "Interview Sessions API"
)]
pub async fn cancel_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let status = app_state
        .engine
        .cancel_session(&session_id)
        .await
        .map_err(|e| ApiError::from(e).for_session(&session_id))?;

    Ok(Json(CancelResponse {
        id: session_id,
        status: status.to_string(),
    }))
}
