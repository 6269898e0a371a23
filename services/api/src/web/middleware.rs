//! services/api/src/web/middleware.rs
//!
//! The request gate: bearer-token authentication and role checks for
//! protected routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use interview_core::domain::UserClaims;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::error::ApiError;
use crate::web::state::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// Middleware that validates the bearer token and attaches its claims.
///
/// On success the `UserClaims` are inserted into the request extensions for
/// handlers and later gates to read. A missing header yields 401 with a JSON
/// error; any validation failure yields a bare 401.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    // 1. Extract the authorization header
    let Some(raw) = req.headers().get(header::AUTHORIZATION) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "No authorization token provided" })),
        )
            .into_response();
    };
    let Ok(value) = raw.to_str() else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    // 2. Strip the scheme, if present
    let token = value.strip_prefix(BEARER_PREFIX).unwrap_or(value);

    // 3. Validate and attach the claims
    match state.tokens.validate(token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            warn!(error = %e, path = %req.uri().path(), "Rejected bearer token");
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

/// The set of roles a gated route admits.
#[derive(Debug, Clone)]
pub struct RoleGate {
    roles: Arc<[String]>,
}

impl RoleGate {
    pub fn permits(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Builds the state for [`enforce_role`].
pub fn require_role<I, S>(roles: I) -> RoleGate
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    RoleGate {
        roles: roles.into_iter().map(Into::into).collect(),
    }
}

/// Middleware that admits the request only when the authenticated role is in
/// the gate's set. Must run after [`authenticate`].
pub async fn enforce_role(
    State(gate): State<RoleGate>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = req
        .extensions()
        .get::<UserClaims>()
        .ok_or(ApiError::Unauthorized)?;

    if !gate.permits(&claims.role) {
        warn!(user_id = %claims.user_id, role = %claims.role, "Role not permitted");
        return Err(ApiError::Forbidden);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_comparison_is_exact() {
        let gate = require_role(["interviewer"]);
        assert!(gate.permits("interviewer"));
        assert!(!gate.permits("Interviewer"));
        assert!(!gate.permits("interviewer "));
        assert!(!gate.permits("candidate"));
    }

    #[test]
    fn any_listed_role_is_admitted() {
        let gate = require_role(vec!["interviewer".to_string(), "admin".to_string()]);
        assert!(gate.permits("admin"));
        assert!(!require_role(Vec::<String>::new()).permits("interviewer"));
    }
}
