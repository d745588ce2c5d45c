use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    db::query::{BackendError, CONNECTION_EXCEPTION, SCHEMA_CACHE_MISS, UNDEFINED_COLUMN},
    middleware::i18n::Locale,
};

// Nosso tipo de erro. É `Clone` porque o resultado da resolução de organização
// é compartilhado entre todas as chamadas concorrentes.
#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Usuário não autenticado")]
    Unauthenticated,

    #[error("Usuário sem organização")]
    MissingOrganization,

    #[error("Incompatibilidade de schema: {0}")]
    SchemaMismatch(BackendError),

    #[error("{entity} {id} possui vínculos ou medições")]
    Integrity { entity: &'static str, id: Uuid },

    #[error("Já existe vínculo ATIVO para o equipamento {equipment_id}")]
    DuplicateActiveAssignment { equipment_id: Uuid },

    #[error("Já existe equipamento com o código {code}")]
    DuplicateCode { code: String },

    #[error("Usuário {user_id} não vinculado ao equipamento {equipment_id}")]
    UnauthorizedMeasurement { equipment_id: Uuid, user_id: Uuid },

    #[error("Tempo limite de {after_ms}ms excedido em {context}")]
    Timeout { context: String, after_ms: u64 },

    #[error("Falha de rede: {0}")]
    Network(String),

    #[error("Acesso negado: {0}")]
    Forbidden(String),

    #[error("{entity} {id} não encontrado")]
    NotFound { entity: &'static str, id: String },

    #[error("Estado inválido: {0}")]
    InvalidState(String),

    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Dados inválidos: {0}")]
    InvalidInput(String),

    // Variante genérica para qualquer erro do backend que não se encaixa acima
    #[error("Erro do backend: {0}")]
    Backend(BackendError),

    #[error("Configuração inválida: {0}")]
    Config(String),
}

/// Classe do erro, usada no diagnóstico, na auditoria e na mensagem técnica para ADMIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    SchemaMismatch,
    Timeout,
    Network,
    Conflict,
    NotFound,
    Validation,
    Generic,
}

impl AppError {
    /// Classifica o erro cru do backend uma única vez, na fronteira da consulta guardada.
    pub fn from_backend(err: BackendError) -> Self {
        let code = err.code.as_deref().unwrap_or_default();
        let message = err.message.to_lowercase();

        if err.status == Some(401) {
            return AppError::Unauthenticated;
        }
        if err.status == Some(403) || code == "42501" {
            return AppError::Forbidden(err.message);
        }
        if code == UNDEFINED_COLUMN || code == SCHEMA_CACHE_MISS {
            return AppError::SchemaMismatch(err);
        }
        if err.status == Some(408) || message.contains("timeout") || message.contains("tempo limite") {
            return AppError::Timeout { context: "backend".into(), after_ms: 0 };
        }
        if code.starts_with("08") || code == CONNECTION_EXCEPTION || message.contains("failed to fetch") {
            return AppError::Network(err.message);
        }
        AppError::Backend(err)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Unauthenticated => ErrorKind::Unauthenticated,
            AppError::MissingOrganization
            | AppError::Forbidden(_)
            | AppError::UnauthorizedMeasurement { .. } => ErrorKind::Forbidden,
            AppError::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            AppError::Timeout { .. } => ErrorKind::Timeout,
            AppError::Network(_) => ErrorKind::Network,
            AppError::Integrity { .. }
            | AppError::DuplicateActiveAssignment { .. }
            | AppError::DuplicateCode { .. }
            | AppError::InvalidState(_) => ErrorKind::Conflict,
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::ValidationError(_) | AppError::InvalidInput(_) => ErrorKind::Validation,
            AppError::Backend(_) | AppError::Config(_) => ErrorKind::Generic,
        }
    }

    /// Código do backend, quando o erro veio de lá.
    pub fn code(&self) -> Option<&str> {
        match self {
            AppError::SchemaMismatch(e) | AppError::Backend(e) => e.code.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::MissingOrganization
            | AppError::Forbidden(_)
            | AppError::UnauthorizedMeasurement { .. } => StatusCode::FORBIDDEN,
            AppError::Integrity { .. }
            | AppError::DuplicateActiveAssignment { .. }
            | AppError::DuplicateCode { .. }
            | AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::SchemaMismatch(_) | AppError::Backend(_) | AppError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Mensagem para o usuário final, em pt ou en.
    pub fn user_message(&self, locale: &Locale) -> String {
        let pt = locale.is_portuguese();
        let text = match self {
            AppError::Unauthenticated => if pt { "Sessão expirada. Faça login novamente." } else { "Session expired. Please sign in again." },
            AppError::MissingOrganization => if pt {
                "Seu usuário não está vinculado a uma organização. Fale com o administrador."
            } else {
                "Your user is not linked to an organization. Contact the administrator."
            },
            AppError::Forbidden(_) => if pt { "Acesso negado para esta operação." } else { "Access denied for this operation." },
            AppError::SchemaMismatch(_) => if pt {
                "Incompatibilidade de schema detectada. Contate o administrador."
            } else {
                "Schema mismatch detected. Contact the administrator."
            },
            AppError::Integrity { .. } => if pt {
                "Bloqueado: o registro possui vínculos ou medições."
            } else {
                "Blocked: the record has assignments or measurements."
            },
            AppError::DuplicateActiveAssignment { .. } => if pt {
                "Já existe vínculo ATIVO para este equipamento."
            } else {
                "This equipment already has an ACTIVE assignment."
            },
            AppError::DuplicateCode { .. } => if pt {
                "Já existe um equipamento com este código."
            } else {
                "An equipment with this code already exists."
            },
            AppError::UnauthorizedMeasurement { .. } => if pt {
                "Usuário não vinculado ao equipamento para registrar medição."
            } else {
                "User is not linked to this equipment."
            },
            AppError::Timeout { .. } => if pt { "A requisição demorou demais. Tente novamente." } else { "The request took too long. Try again." },
            AppError::Network(_) => if pt {
                "Falha de rede. Verifique a conexão e tente novamente."
            } else {
                "Network failure. Check the connection and try again."
            },
            AppError::NotFound { .. } => if pt { "Registro não encontrado." } else { "Record not found." },
            AppError::InvalidState(msg) | AppError::InvalidInput(msg) => return msg.clone(),
            AppError::ValidationError(_) => if pt { "Um ou mais campos são inválidos." } else { "One or more fields are invalid." },
            AppError::Backend(_) | AppError::Config(_) => if pt { "Ocorreu um erro inesperado." } else { "An unexpected error occurred." },
        };
        text.to_string()
    }

    /// Monta a resposta HTTP. O detalhe técnico (classe/código) só aparece para ADMIN.
    pub fn to_api_error(&self, locale: &Locale, is_admin: bool) -> ApiError {
        let mut error = self.user_message(locale);
        if is_admin {
            match self.code() {
                Some(code) => error.push_str(&format!(" ({:?}/{})", self.kind(), code)),
                None => error.push_str(&format!(" ({:?})", self.kind())),
            }
        }

        let details = match self {
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<Value> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| Value::String(m.to_string())))
                        .collect();
                    details.insert(field.to_string(), Value::Array(messages));
                }
                Some(Value::Object(details))
            }
            other if is_admin => Some(json!({ "message": other.to_string() })),
            _ => None,
        };

        if self.status().is_server_error() {
            tracing::error!(kind = ?self.kind(), "Erro Interno do Servidor: {}", self);
        }

        ApiError { status: self.status(), error, details }
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::from_backend(err)
    }
}

// Resposta de erro da API
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => Json(json!({ "error": self.error, "details": details })),
            None => Json(json!({ "error": self.error })),
        };
        (self.status, body).into_response()
    }
}

// Erros sem contexto de idioma (middlewares) usam o padrão em inglês, sem detalhe técnico.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default(), false).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(code: Option<&str>, status: Option<u16>, message: &str) -> BackendError {
        BackendError::new(code, status, message)
    }

    #[test]
    fn classifies_backend_errors_once() {
        assert!(matches!(
            AppError::from_backend(backend(Some("42703"), Some(400), "column x does not exist")),
            AppError::SchemaMismatch(_)
        ));
        assert!(matches!(AppError::from_backend(backend(None, Some(401), "jwt expired")), AppError::Unauthenticated));
        assert!(matches!(AppError::from_backend(backend(None, Some(403), "denied")), AppError::Forbidden(_)));
        assert!(matches!(AppError::from_backend(BackendError::network("reset by peer")), AppError::Network(_)));
        assert!(matches!(
            AppError::from_backend(backend(None, None, "statement timeout")),
            AppError::Timeout { .. }
        ));
        assert!(matches!(AppError::from_backend(backend(Some("23503"), None, "fk")), AppError::Backend(_)));
    }

    #[test]
    fn technical_detail_only_for_admin() {
        let err = AppError::Backend(backend(Some("XX000"), None, "boom"));
        let locale = Locale("pt".into());

        let user_view = err.to_api_error(&locale, false);
        assert_eq!(user_view.error, "Ocorreu um erro inesperado.");
        assert!(user_view.details.is_none());

        let admin_view = err.to_api_error(&locale, true);
        assert_eq!(admin_view.error, "Ocorreu um erro inesperado. (Generic/XX000)");
        assert!(admin_view.details.is_some());
    }

    #[test]
    fn guard_refusals_map_to_conflict_and_forbidden() {
        let id = Uuid::new_v4();
        assert_eq!(AppError::Integrity { entity: "equipamentos", id }.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::DuplicateActiveAssignment { equipment_id: id }.status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::UnauthorizedMeasurement { equipment_id: id, user_id: id }.status(),
            StatusCode::FORBIDDEN
        );
    }
}
