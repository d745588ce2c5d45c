// src/handlers/profiles.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    handlers::api_error,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::profile::{Profile, ReassignOrganizationPayload},
};

// GET /api/profiles
#[utoipa::path(
    get,
    path = "/api/profiles",
    tag = "Perfis",
    responses(
        (status = 200, description = "Perfis da organização", body = Vec<Profile>),
        (status = 403, description = "Exclusivo de ADMIN")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_profiles(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let profiles = app_state
        .profile_service
        .list(&caller)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(profiles)))
}

// PUT /api/profiles/{id}/organization
#[utoipa::path(
    put,
    path = "/api/profiles/{id}/organization",
    tag = "Perfis",
    params(("id" = Uuid, Path, description = "ID do perfil")),
    request_body = ReassignOrganizationPayload,
    responses(
        (status = 200, description = "Organização do perfil trocada", body = Profile),
        (status = 403, description = "Exclusivo de ADMIN"),
        (status = 404, description = "Perfil não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn reassign_organization(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReassignOrganizationPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = app_state
        .profile_service
        .reassign_organization(&caller, id, payload.organization_id)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(profile)))
}
