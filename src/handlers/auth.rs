// src/handlers/auth.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    common::error::ApiError,
    config::AppState,
    handlers::api_error,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::{auth::LogoutResponse, profile::MeResponse},
};

// GET /api/me
#[utoipa::path(
    get,
    path = "/api/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Perfil (criado no primeiro acesso) e organização resolvida", body = MeResponse),
        (status = 401, description = "Não autenticado"),
        (status = 403, description = "Usuário sem organização")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_me(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let me = app_state
        .profile_service
        .me(&caller)
        .await
        .map_err(|e| api_error(&app_state, &locale, &caller, e))?;

    Ok((StatusCode::OK, Json(me)))
}

// POST /api/auth/logout
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Contexto da sessão descartado", body = LogoutResponse),
        (status = 401, description = "Não autenticado")
    ),
    security(("api_jwt" = []))
)]
pub async fn logout(
    State(app_state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> impl IntoResponse {
    app_state.profile_service.sign_out(&caller).await;
    Json(LogoutResponse { ok: true })
}
