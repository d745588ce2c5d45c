// src/handlers/audit.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    common::{diagnostics::DiagnosticsSnapshot, error::ApiError},
    config::AppState,
    handlers::{api_error, require_admin},
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::audit::{AuditLogEntry, AuditQuery},
};

// GET /api/auditoria?limit=50
#[utoipa::path(
    get,
    path = "/api/auditoria",
    tag = "Auditoria",
    params(AuditQuery),
    responses(
        (status = 200, description = "Últimos registros de auditoria da organização", body = Vec<AuditLogEntry>),
        (status = 403, description = "Exclusivo de ADMIN")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_audit_log(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(query): Query<AuditQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&app_state, &caller)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    let rows = app_state
        .audit_repo
        .recent(&caller, query.limit)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(rows)))
}

// GET /api/diagnostics
#[utoipa::path(
    get,
    path = "/api/diagnostics",
    tag = "Auditoria",
    responses(
        (status = 200, description = "Erros e eventos recentes do processo", body = DiagnosticsSnapshot),
        (status = 403, description = "Exclusivo de ADMIN")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_diagnostics(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&app_state, &caller)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(app_state.diagnostics.snapshot())))
}
