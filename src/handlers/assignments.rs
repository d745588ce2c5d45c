// src/handlers/assignments.rs

use axum::{
    body::Bytes,
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
    models::assignment::{
        Assignment, AssignmentFilters, AssignmentView, CreateAssignmentPayload, DocumentUploadQuery,
        DocumentUrl, EndAssignmentPayload, UpdateAssignmentPayload,
    },
};

// GET /api/vinculos
#[utoipa::path(
    get,
    path = "/api/vinculos",
    tag = "Vínculos",
    params(AssignmentFilters),
    responses(
        (status = 200, description = "Vínculos com equipamento, obra e dias com o usuário", body = Vec<AssignmentView>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_assignments(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(filters): Query<AssignmentFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let views = app_state
        .assignment_service
        .list(&caller, &filters)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(views)))
}

// POST /api/vinculos
#[utoipa::path(
    post,
    path = "/api/vinculos",
    tag = "Vínculos",
    request_body = CreateAssignmentPayload,
    responses(
        (status = 201, description = "Vínculo criado", body = Assignment),
        (status = 409, description = "Equipamento já possui vínculo ATIVO")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_assignment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(payload): Json<CreateAssignmentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let created = app_state
        .assignment_service
        .create(&caller, payload)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::CREATED, Json(created)))
}

// PUT /api/vinculos/{id}
#[utoipa::path(
    put,
    path = "/api/vinculos/{id}",
    tag = "Vínculos",
    params(("id" = Uuid, Path, description = "ID do vínculo")),
    request_body = UpdateAssignmentPayload,
    responses(
        (status = 200, description = "Vínculo atualizado", body = Assignment),
        (status = 409, description = "Conflito de vínculo ATIVO ou vínculo encerrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_assignment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAssignmentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = app_state
        .assignment_service
        .update(&caller, id, payload)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(updated)))
}

// DELETE /api/vinculos/{id}
#[utoipa::path(
    delete,
    path = "/api/vinculos/{id}",
    tag = "Vínculos",
    params(("id" = Uuid, Path, description = "ID do vínculo")),
    responses(
        (status = 204, description = "Vínculo removido"),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_assignment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .assignment_service
        .soft_delete(&caller, id)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok(StatusCode::NO_CONTENT)
}

// POST /api/vinculos/{id}/encerrar
#[utoipa::path(
    post,
    path = "/api/vinculos/{id}/encerrar",
    tag = "Vínculos",
    params(("id" = Uuid, Path, description = "ID do vínculo")),
    request_body = EndAssignmentPayload,
    responses(
        (status = 200, description = "Vínculo encerrado", body = Assignment),
        (status = 409, description = "Vínculo já encerrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn end_assignment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<EndAssignmentPayload>>,
) -> Result<impl IntoResponse, ApiError> {
    let reason = payload.and_then(|Json(p)| p.reason);
    let ended = app_state
        .assignment_service
        .end(&caller, id, reason)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(ended)))
}

// PUT /api/vinculos/{id}/termo?nome=arquivo.pdf
#[utoipa::path(
    put,
    path = "/api/vinculos/{id}/termo",
    tag = "Vínculos",
    params(("id" = Uuid, Path, description = "ID do vínculo"), DocumentUploadQuery),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Termo anexado ao vínculo", body = Assignment),
        (status = 400, description = "Arquivo vazio ou sem nome")
    ),
    security(("api_jwt" = []))
)]
pub async fn upload_document(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Query(query): Query<DocumentUploadQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let updated = app_state
        .assignment_service
        .upload_document(&caller, id, &query.nome, &body)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(updated)))
}

// GET /api/vinculos/{id}/termo
#[utoipa::path(
    get,
    path = "/api/vinculos/{id}/termo",
    tag = "Vínculos",
    params(("id" = Uuid, Path, description = "ID do vínculo")),
    responses(
        (status = 200, description = "URL do termo (assinada quando possível)", body = DocumentUrl),
        (status = 404, description = "Vínculo sem termo")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_document_url(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let url = app_state
        .assignment_service
        .document_url(&caller, id)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(url)))
}
