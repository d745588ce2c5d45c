// src/handlers/measurements.rs

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
    handlers::api_error,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::measurement::{
        CreateMeasurementPayload, Measurement, MeasurementFilters, MeasurementPermission,
        PermissionCheckPayload, UpdateMeasurementPayload,
    },
};

// GET /api/medicoes
#[utoipa::path(
    get,
    path = "/api/medicoes",
    tag = "Medições",
    params(MeasurementFilters),
    responses(
        (status = 200, description = "Medições visíveis ao chamador", body = Vec<Measurement>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_measurements(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(filters): Query<MeasurementFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let items = app_state
        .measurement_service
        .list(&caller, &filters)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(items)))
}

// POST /api/medicoes
#[utoipa::path(
    post,
    path = "/api/medicoes",
    tag = "Medições",
    request_body = CreateMeasurementPayload,
    responses(
        (status = 201, description = "Medição registrada", body = Measurement),
        (status = 400, description = "Dados inválidos"),
        (status = 403, description = "Usuário sem vínculo ATIVO com o equipamento")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_measurement(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(payload): Json<CreateMeasurementPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let created = app_state
        .measurement_service
        .create(&caller, payload)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::CREATED, Json(created)))
}

// PUT /api/medicoes/{id}
#[utoipa::path(
    put,
    path = "/api/medicoes/{id}",
    tag = "Medições",
    params(("id" = Uuid, Path, description = "ID da medição")),
    request_body = UpdateMeasurementPayload,
    responses(
        (status = 200, description = "Medição atualizada", body = Measurement),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_measurement(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMeasurementPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = app_state
        .measurement_service
        .update(&caller, id, payload)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(updated)))
}

// DELETE /api/medicoes/{id}
#[utoipa::path(
    delete,
    path = "/api/medicoes/{id}",
    tag = "Medições",
    params(("id" = Uuid, Path, description = "ID da medição")),
    responses(
        (status = 204, description = "Medição removida"),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_measurement(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .measurement_service
        .soft_delete(&caller, id)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok(StatusCode::NO_CONTENT)
}

// POST /api/medicoes/permissao
#[utoipa::path(
    post,
    path = "/api/medicoes/permissao",
    tag = "Medições",
    request_body = PermissionCheckPayload,
    responses(
        (status = 200, description = "Se o usuário pode registrar medição no equipamento", body = MeasurementPermission)
    ),
    security(("api_jwt" = []))
)]
pub async fn check_permission(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(payload): Json<PermissionCheckPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let permission = app_state
        .measurement_service
        .can_create_measurement(&caller, payload.equipamento_id, payload.user_id)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(permission)))
}
