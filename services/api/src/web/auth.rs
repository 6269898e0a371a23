//! services/api/src/web/auth.rs
//!
//! Token endpoints: development login, password login and token refresh.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use interview_core::ports::PortError;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::dto::{DevLoginQuery, LoginRequest, TokenResponse};
use crate::web::state::AppState;

const DEV_EMAIL: &str = "dev@example.com";
const DEV_NAME: &str = "Dev User";

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /dev-login - Issue a token for a throwaway identity with the given role
#[utoipa::path(
    get,
    path = "/dev-login",
    params(DevLoginQuery),
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Role is missing")
    ),
    tag = "Auth"
)]
pub async fn dev_login_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DevLoginQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if query.role.is_empty() {
        return Err(ApiError::BadRequest("Role is required".to_string()));
    }

    let user_id = Uuid::new_v4().to_string();
    let token = state.tokens.issue(&user_id, DEV_EMAIL, DEV_NAME, &query.role)?;
    info!(user_id = %user_id, role = %query.role, "Issued development token");

    Ok(Json(TokenResponse {
        token,
        role: query.role,
    }))
}

/// POST /auth/login - Exchange email and password for a token
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Invalid request body"),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::BadRequest("Invalid request body".to_string()))?;

    // 1. Get user by email
    let user = match state.db.get_user_by_email(&req.email).await {
        Ok(user) => user,
        Err(PortError::NotFound(_)) => {
            warn!(email = %req.email, "Login for unknown email");
            return Ok(invalid_credentials());
        }
        Err(e) => return Err(e.into()),
    };

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user.password_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Stored password hash is unreadable".to_string())
    })?;
    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        warn!(user_id = %user.id, "Login with wrong password");
        return Ok(invalid_credentials());
    }

    // 3. Issue the token
    let token = state.tokens.issue(&user.id, &user.email, &user.name, &user.role)?;
    info!(user_id = %user.id, "User logged in");

    Ok(Json(TokenResponse {
        token,
        role: user.role,
    })
    .into_response())
}

fn invalid_credentials() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Invalid email or password" })),
    )
        .into_response()
}

/// POST /api/refresh-token - Trade a valid token for one with a fresh window
#[utoipa::path(
    post,
    path = "/api/refresh-token",
    responses(
        (status = 200, description = "Token refreshed", body = TokenResponse),
        (status = 401, description = "Token missing or invalid")
    ),
    tag = "Auth"
)]
pub async fn refresh_token_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v))
        .ok_or(ApiError::Unauthorized)?;

    let fresh = state.tokens.refresh(token)?;
    let claims = state.tokens.validate(&fresh)?;

    Ok(Json(TokenResponse {
        token: fresh,
        role: claims.role,
    }))
}
