//! HTTP API: the system-hook receiver plus status and audit endpoints.
//!
//! ## Endpoints
//!
//! - `POST /systemhooks` - receive a GitLab system hook and enforce it
//! - `GET /health` - liveness and version
//! - `GET /info` - configured rules and the last complete scan
//! - `GET /audit` - most recent audit entries, oldest first; filters:
//!   `limit`, `type`, `since`, `projectId`, `groupId`, `rule`
//! - `GET /audit/{id}` - one retained audit entry

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use enforcer_audit::{
    AuditEntry, AuditError, AuditEventType, AuditLog, AuditQuery, AuditQueryBuilder,
};
use enforcer_core::{Enforcer, EnforcerStatus, EventOutcome, ExecutionContext, SystemEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Header naming the hook event type.
pub const EVENT_HEADER: &str = "X-Gitlab-Event";

/// Header carrying the shared hook secret.
pub const TOKEN_HEADER: &str = "X-Gitlab-Token";

/// Entries returned by `/audit` when no limit is given.
pub const DEFAULT_AUDIT_LIMIT: usize = 50;

/// Shared state for handlers.
#[derive(Clone)]
pub struct AppState {
    /// Dispatcher invoked for every accepted hook.
    pub enforcer: Arc<Enforcer>,
    /// Audit trail served by `/audit`.
    pub audit: Arc<AuditLog>,
    /// Expected `X-Gitlab-Token` value.
    pub hook_token: Arc<str>,
}

/// API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or wrong hook secret.
    #[error("invalid system hook token")]
    Unauthorized,
    /// Malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Audit lookup failed.
    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Audit(AuditError::NotFound(_)) => StatusCode::NOT_FOUND,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Health check body.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok`.
    pub status: String,
    /// Crate version.
    pub version: String,
}

/// Status body for `/info`.
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    /// Rules and last complete scan.
    #[serde(flatten)]
    pub status: EnforcerStatus,
    /// Audit entries recorded since start, including evicted ones.
    pub audit_recorded: u64,
    /// Audit entries currently retained.
    pub audit_retained: usize,
}

/// Query parameters for `/audit`.
#[derive(Debug, Default, Deserialize)]
pub struct AuditParams {
    /// Maximum entries to return, most recent kept.
    pub limit: Option<usize>,
    /// Only this event type, e.g. `GROUP_UPDATED`.
    #[serde(rename = "type")]
    pub event_type: Option<AuditEventType>,
    /// Only entries recorded at or after this RFC 3339 instant.
    pub since: Option<DateTime<Utc>>,
    /// Only entries about this project.
    #[serde(rename = "projectId")]
    pub project_id: Option<u64>,
    /// Only entries about this group.
    #[serde(rename = "groupId")]
    pub group_id: Option<u64>,
    /// Only entries written by this rule, e.g. `Enforce Push Rules`.
    pub rule: Option<String>,
}

impl AuditParams {
    fn to_query(&self) -> AuditQuery {
        let mut builder =
            AuditQueryBuilder::new().limit(self.limit.unwrap_or(DEFAULT_AUDIT_LIMIT));
        if let Some(event_type) = self.event_type {
            builder = builder.event_types(vec![event_type]);
        }
        if let Some(since) = self.since {
            builder = builder.since(since);
        }
        if let Some(id) = self.project_id {
            builder = builder.data("projectId", id);
        }
        if let Some(id) = self.group_id {
            builder = builder.data("groupId", id);
        }
        if let Some(ref rule) = self.rule {
            builder = builder.data("rule", rule.as_str());
        }
        builder.build()
    }
}

/// Creates the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/systemhooks", post(system_hook))
        .route("/health", get(health_check))
        .route("/info", get(info))
        .route("/audit", get(audit))
        .route("/audit/{id}", get(audit_entry))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Receive a system hook.
///
/// The rules run before the response is sent, so GitLab sees the hook as
/// delivered only once enforcement has finished.
async fn system_hook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<EventOutcome>, ApiError> {
    let token = headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    if token != &*state.hook_token {
        tracing::warn!("Rejected system hook with invalid token");
        return Err(ApiError::Unauthorized);
    }

    let hook = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest(format!("missing {EVENT_HEADER} header")))?;

    let event: SystemEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid system hook payload: {e}")))?;

    if event.is_other() {
        tracing::debug!(hook, "Ignoring system hook");
        return Ok(Json(EventOutcome::default()));
    }

    tracing::info!(
        hook,
        event = ?event.event_name,
        id = event.id,
        path = %event.path_with_namespace,
        "System hook received"
    );
    let outcome = state
        .enforcer
        .enforce_event(ExecutionContext::Hook, &event)
        .await;
    Ok(Json(outcome))
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        status: state.enforcer.status(),
        audit_recorded: state.audit.total_recorded(),
        audit_retained: state.audit.len(),
    })
}

async fn audit(
    State(state): State<AppState>,
    Query(params): Query<AuditParams>,
) -> Json<Vec<AuditEntry>> {
    Json(state.audit.query(&params.to_query()))
}

async fn audit_entry(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<AuditEntry>, ApiError> {
    Ok(Json(state.audit.get(id)?))
}
