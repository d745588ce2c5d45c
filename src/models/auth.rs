// src/models/auth.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Identidade autenticada, como o serviço de auth hospedado a entrega (claims do JWT)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,           // Subject (ID do usuário)
    pub exp: usize,          // Expiration time
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
}

// Metadados da requisição carimbados na auditoria e no diagnóstico
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub correlation_id: String,
    pub route: String,
}

/// Quem está chamando: a identidade mais o contexto da requisição.
#[derive(Debug, Clone)]
pub struct Caller {
    pub identity: Identity,
    pub request: RequestContext,
}

impl Caller {
    pub fn id(&self) -> Uuid {
        self.identity.id
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogoutResponse {
    pub ok: bool,
}
