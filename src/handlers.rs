// src/handlers.rs

pub mod assignments;
pub mod audit;
pub mod auth;
pub mod dashboard;
pub mod equipment;
pub mod measurements;
pub mod profiles;
pub mod sites;

use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::auth::Caller,
};

/// Filtro comum das listagens de cadastro.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ListParams {
    /// Inclui registros inativados (só ADMIN)
    #[serde(default)]
    pub include_deleted: bool,
}

// O detalhe técnico só vai para quem já foi resolvido como ADMIN.
pub(crate) fn api_error(app_state: &AppState, locale: &Locale, caller: &Caller, err: AppError) -> ApiError {
    let is_admin = app_state
        .resolver
        .cached(caller.id())
        .is_some_and(|tenant| tenant.is_admin());
    err.to_api_error(locale, is_admin)
}

pub(crate) async fn require_admin(app_state: &AppState, caller: &Caller) -> Result<(), AppError> {
    let tenant = app_state.resolver.resolve(Some(&caller.identity)).await?;
    if !tenant.is_admin() {
        return Err(AppError::Forbidden("operação exclusiva de ADMIN".into()));
    }
    Ok(())
}
