//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod audit;
mod definitions;
mod policies;
mod proposals;
mod requests;
mod sections;

use crate::config::Settings;
use crate::error::AppError;
use crate::state::{AppState, SharedState};
use crate::workflow::Role;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderName, Method},
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;
use uuid::Uuid;

/// Header carrying the caller's opaque identity
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    let cors = build_cors_layer(settings);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    Router::new()
        .route("/health", get(health_check))

        // Sections
        .route("/api/sections", get(sections::list_sections).post(sections::create_section))
        .route("/api/sections/{id}", get(sections::get_section))
        .route("/api/sections/{id}/number", put(sections::change_section_number))
        .route("/api/sections/{id}/policies", get(sections::list_section_policies))

        // Policies
        .route("/api/policies", post(policies::publish_policy))
        .route("/api/policies/{id}", get(policies::get_policy))
        .route("/api/policies/by-number/{number}", get(policies::get_policy_by_number))
        .route("/api/policies/{id}/proposals", get(policies::pending_proposals))
        .route("/api/policies/{id}/referrers", get(policies::list_referrers))
        .route("/api/policies/{id}/steps/{step_id}", delete(policies::remove_step))
        .route("/api/related/{id}", get(policies::resolve_related))
        .route("/api/archive", get(policies::list_archived))
        .route("/api/archive/{id}", get(policies::get_archived))

        // Definitions
        .route(
            "/api/definitions",
            get(definitions::list_definitions).post(definitions::create_definition),
        )

        // Proposals
        .route("/api/proposals", get(proposals::list_proposals).post(proposals::submit_proposal))
        .route("/api/proposals/{id}", get(proposals::get_proposal))
        .route("/api/proposals/{id}/diff", get(proposals::diff_proposal))
        .route("/api/proposals/{id}/notes", post(proposals::add_note))
        .route("/api/proposals/{id}/approve", post(proposals::approve_proposal))
        .route("/api/proposals/{id}/reject", post(proposals::reject_proposal))
        .route("/api/proposals/{id}/request-revision", post(proposals::request_revision))
        .route("/api/proposals/{id}/resubmit", post(proposals::resubmit_proposal))

        // Questions
        .route(
            "/api/policies/by-number/{number}/requests",
            post(requests::file_question),
        )
        .route("/api/requests", get(requests::list_questions))
        .route("/api/requests/resolve", post(requests::resolve_questions))
        .route("/api/requests/{id}", get(requests::get_question))

        // Audit
        .route("/api/audit", get(audit::get_audit_log))

        .layer(middleware)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();
    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS];
    let headers = [
        header::CONTENT_TYPE,
        header::ACCEPT,
        HeaderName::from_static(ACTOR_HEADER),
    ];

    let layer = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    };
    layer
        .allow_methods(methods)
        .allow_headers(headers)
        .max_age(Duration::from_secs(3600))
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// =============================================================================
// CALLER IDENTITY
// =============================================================================

/// Caller identity taken from the `X-Actor-Id` header.
/// Authentication happens upstream; this only parses the id.
#[derive(Debug, Clone, Copy)]
pub struct ActorId(pub Uuid);

impl<S> FromRequestParts<S> for ActorId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::BadRequest("Missing X-Actor-Id header".to_string()))?;
        Uuid::parse_str(raw.trim())
            .map(ActorId)
            .map_err(|_| AppError::BadRequest("X-Actor-Id must be a UUID".to_string()))
    }
}

/// Structure edits outside the proposal workflow are admin-only
async fn require_admin(state: &AppState, actor: ActorId) -> Result<(), AppError> {
    let actor = state.identity.actor(actor.0).await?;
    if actor.role != Role::Admin {
        return Err(AppError::Forbidden(format!(
            "Requires admin role, you have {}",
            actor.role
        )));
    }
    Ok(())
}
