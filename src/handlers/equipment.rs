// src/handlers/equipment.rs

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
    models::equipment::{CreateEquipmentPayload, Dependencies, Equipment, UpdateEquipmentPayload},
};

// GET /api/equipamentos
#[utoipa::path(
    get,
    path = "/api/equipamentos",
    tag = "Equipamentos",
    params(ListParams),
    responses(
        (status = 200, description = "Equipamentos visíveis ao chamador", body = Vec<Equipment>),
        (status = 401, description = "Não autenticado"),
        (status = 403, description = "Usuário sem organização")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_equipment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let items = app_state
        .equipment_service
        .list(&caller, params.include_deleted)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(items)))
}

// POST /api/equipamentos
#[utoipa::path(
    post,
    path = "/api/equipamentos",
    tag = "Equipamentos",
    request_body = CreateEquipmentPayload,
    responses(
        (status = 201, description = "Equipamento criado", body = Equipment),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "Código já em uso na organização")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_equipment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(payload): Json<CreateEquipmentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let created = app_state
        .equipment_service
        .create(&caller, payload)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::CREATED, Json(created)))
}

// PUT /api/equipamentos/{id}
#[utoipa::path(
    put,
    path = "/api/equipamentos/{id}",
    tag = "Equipamentos",
    params(("id" = Uuid, Path, description = "ID do equipamento")),
    request_body = UpdateEquipmentPayload,
    responses(
        (status = 200, description = "Equipamento atualizado", body = Equipment),
        (status = 404, description = "Não encontrado"),
        (status = 409, description = "Código já em uso na organização")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_equipment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEquipmentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = app_state
        .equipment_service
        .update(&caller, id, payload)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(updated)))
}

// DELETE /api/equipamentos/{id}
#[utoipa::path(
    delete,
    path = "/api/equipamentos/{id}",
    tag = "Equipamentos",
    params(("id" = Uuid, Path, description = "ID do equipamento")),
    responses(
        (status = 200, description = "Equipamento inativado", body = Equipment),
        (status = 409, description = "Possui vínculos ativos ou medições")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_equipment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let inactivated = app_state
        .equipment_service
        .soft_delete(&caller, id)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(inactivated)))
}

// GET /api/equipamentos/{id}/dependencies
#[utoipa::path(
    get,
    path = "/api/equipamentos/{id}/dependencies",
    tag = "Equipamentos",
    params(("id" = Uuid, Path, description = "ID do equipamento")),
    responses(
        (status = 200, description = "Se há vínculos ativos ou medições", body = Dependencies)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_dependencies(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deps = app_state
        .equipment_service
        .dependencies(&caller, id)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(deps)))
}
