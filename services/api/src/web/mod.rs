pub mod auth;
pub mod dto;
pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use interview_core::domain::INTERVIEWER_ROLE;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ConfigError;
use crate::error::ApiError;
use middleware::{authenticate, enforce_role, require_role};
use rest::ApiDoc;
use state::AppState;

pub use auth::{dev_login_handler, login_handler, refresh_token_handler};
pub use rest::{
    add_feedback_handler, cancel_session_handler, create_session_handler, get_session_handler,
    hello_handler,
};

/// Assembles the complete application: public routes, bearer-gated routes,
/// interviewer-only routes, CORS and the Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = HeaderValue::from_str(&app_state.config.cors_origin).map_err(|e| {
        ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(hello_handler))
        .route("/dev-login", get(dev_login_handler))
        .route("/auth/login", post(login_handler));

    // Interviewer routes (role checked after authentication)
    let interviewer_routes = Router::new()
        .route(
            "/api/interviewer/session/{id}/feedback",
            post(add_feedback_handler),
        )
        .route(
            "/api/interviewer/session/{id}/cancel",
            post(cancel_session_handler),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            require_role([INTERVIEWER_ROLE]),
            enforce_role,
        ));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/create-session", post(create_session_handler))
        .route("/api/session/{id}", get(get_session_handler))
        .route("/api/refresh-token", post(refresh_token_handler))
        .merge(interviewer_routes)
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            authenticate,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
