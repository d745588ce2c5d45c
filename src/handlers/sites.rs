// src/handlers/sites.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    handlers::{api_error, ListParams},
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::site::{CreateSitePayload, Site, UpdateSitePayload},
};

// GET /api/obras
#[utoipa::path(
    get,
    path = "/api/obras",
    tag = "Obras",
    params(ListParams),
    responses(
        (status = 200, description = "Obras visíveis ao chamador", body = Vec<Site>),
        (status = 401, description = "Não autenticado")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_sites(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let sites = app_state
        .site_service
        .list(&caller, params.include_deleted)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(sites)))
}

// POST /api/obras
#[utoipa::path(
    post,
    path = "/api/obras",
    tag = "Obras",
    request_body = CreateSitePayload,
    responses(
        (status = 201, description = "Obra criada", body = Site),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_site(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(payload): Json<CreateSitePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let site = app_state
        .site_service
        .create(&caller, payload)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::CREATED, Json(site)))
}

// PUT /api/obras/{id}
#[utoipa::path(
    put,
    path = "/api/obras/{id}",
    tag = "Obras",
    params(("id" = Uuid, Path, description = "ID da obra")),
    request_body = UpdateSitePayload,
    responses(
        (status = 200, description = "Obra atualizada", body = Site),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_site(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSitePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let site = app_state
        .site_service
        .update(&caller, id, payload)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(site)))
}

// DELETE /api/obras/{id}
#[utoipa::path(
    delete,
    path = "/api/obras/{id}",
    tag = "Obras",
    params(("id" = Uuid, Path, description = "ID da obra")),
    responses(
        (status = 200, description = "Obra inativada", body = Site),
        (status = 409, description = "Possui vínculos ativos ou medições")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_site(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let site = app_state
        .site_service
        .soft_delete(&caller, id)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(site)))
}
